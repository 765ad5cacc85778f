//! The draw session: one execution of a test function.
//!
//! A session records every choice the test makes, together with the span
//! structure around those choices. When the test returns, the session is
//! concluded exactly once into a [`SessionResult`].

use std::time::{Duration, Instant};

use crate::choice::{
    self, BooleanConstraints, BytesConstraints, CharIntervals, ChoiceNode, ChoiceValue,
    Constraints, FloatConstraints, IntegerConstraints, SortKey, StringConstraints,
};
use crate::error::{DrawOutcome, InvalidReason, StopTest};
use crate::origin::{InterestingOrigin, PanicRecord};
use crate::provider::{draw_with, PrimitiveProvider};
use crate::span::{SpanRecorder, Spans};

/// Label of the span that wraps a whole session.
pub const TOP_LABEL: u64 = 0;

/// Final status of a trial, ordered from least to most useful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Overrun,
    Invalid,
    Valid,
    Interesting,
}

/// What a test function returned, or how it stopped.
pub type TrialOutcome = Result<Result<DrawOutcome, StopTest>, PanicRecord>;

/// Records the choices of one trial.
pub struct DrawSession<'a> {
    provider: &'a mut dyn PrimitiveProvider,
    nodes: Vec<ChoiceNode>,
    spans: SpanRecorder,
    max_choices: usize,
    started: Instant,
    deadline: Option<Duration>,
    stopped: Option<StopTest>,
    notes: Vec<String>,
    events: Vec<String>,
}

impl<'a> DrawSession<'a> {
    pub fn new(provider: &'a mut dyn PrimitiveProvider, max_choices: usize) -> Self {
        let mut spans = SpanRecorder::default();
        spans.start(TOP_LABEL, 0);
        DrawSession {
            provider,
            nodes: Vec::new(),
            spans,
            max_choices,
            started: Instant::now(),
            deadline: None,
            stopped: None,
            notes: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Number of choices drawn so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[ChoiceNode] {
        &self.nodes
    }

    fn draw(&mut self, constraints: Constraints, forced: Option<ChoiceValue>) -> Result<ChoiceValue, StopTest> {
        if self.stopped.is_some() {
            return Err(StopTest::Frozen);
        }
        if let Some(limit) = self.deadline {
            if self.started.elapsed() > limit {
                return Err(self.stop(StopTest::DeadlineExceeded));
            }
        }
        if self.nodes.len() >= self.max_choices {
            return Err(self.stop(StopTest::Overrun));
        }

        let (value, was_forced) = match forced {
            Some(value) => {
                if !constraints.permits(&value) {
                    return Err(self.stop(StopTest::BadForcedValue));
                }
                self.provider.skip_forced();
                (value, true)
            }
            None => match draw_with(&mut *self.provider, &constraints) {
                Ok(value) => (value, false),
                Err(_) => return Err(self.stop(StopTest::Overrun)),
            },
        };
        self.nodes.push(ChoiceNode {
            value: value.clone(),
            constraints,
            was_forced,
        });
        Ok(value)
    }

    fn stop(&mut self, reason: StopTest) -> StopTest {
        self.stopped.get_or_insert(reason);
        reason
    }

    pub fn draw_boolean(&mut self, p: f64, forced: Option<bool>) -> Result<bool, StopTest> {
        let constraints = Constraints::Boolean(BooleanConstraints::new(p));
        match self.draw(constraints, forced.map(ChoiceValue::Boolean))? {
            ChoiceValue::Boolean(v) => Ok(v),
            _ => Err(self.stop(StopTest::Overrun)),
        }
    }

    pub fn draw_integer(
        &mut self,
        constraints: IntegerConstraints,
        forced: Option<i128>,
    ) -> Result<i128, StopTest> {
        match self.draw(Constraints::Integer(constraints), forced.map(ChoiceValue::Integer))? {
            ChoiceValue::Integer(v) => Ok(v),
            _ => Err(self.stop(StopTest::Overrun)),
        }
    }

    pub fn draw_float(&mut self, constraints: FloatConstraints, forced: Option<f64>) -> Result<f64, StopTest> {
        match self.draw(Constraints::Float(constraints), forced.map(ChoiceValue::Float))? {
            ChoiceValue::Float(v) => Ok(v),
            _ => Err(self.stop(StopTest::Overrun)),
        }
    }

    pub fn draw_string(
        &mut self,
        alphabet: CharIntervals,
        min_size: usize,
        max_size: usize,
        forced: Option<String>,
    ) -> Result<String, StopTest> {
        let constraints = Constraints::String(StringConstraints::new(alphabet, min_size, max_size));
        match self.draw(constraints, forced.map(ChoiceValue::String))? {
            ChoiceValue::String(v) => Ok(v),
            _ => Err(self.stop(StopTest::Overrun)),
        }
    }

    pub fn draw_bytes(
        &mut self,
        min_size: usize,
        max_size: usize,
        forced: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, StopTest> {
        let constraints = Constraints::Bytes(BytesConstraints::new(min_size, max_size));
        match self.draw(constraints, forced.map(ChoiceValue::Bytes))? {
            ChoiceValue::Bytes(v) => Ok(v),
            _ => Err(self.stop(StopTest::Overrun)),
        }
    }

    pub fn start_span(&mut self, label: u64) {
        self.spans.start(label, self.nodes.len());
        self.provider.span_start(label);
    }

    /// Close the innermost span. The top-level span is never closed here.
    pub fn stop_span(&mut self, discard: bool) {
        if self.spans.depth() > 1 {
            self.spans.stop(self.nodes.len(), discard);
            self.provider.span_end(discard);
        }
    }

    /// Reject the current data unless `condition` holds.
    pub fn assume(&mut self, condition: bool) -> Result<(), StopTest> {
        if condition {
            Ok(())
        } else {
            Err(self.stop(StopTest::Rejected))
        }
    }

    /// Attach a line of text to the result, shown when reporting a failure.
    pub fn note(&mut self, text: impl Into<String>) {
        self.notes.push(text.into());
    }

    /// Count an observation for the run's statistics.
    pub fn event(&mut self, label: impl Into<String>) {
        self.events.push(label.into());
    }

    /// Conclude the session. Consumes it, so a session concludes once.
    pub fn conclude(self, outcome: TrialOutcome) -> SessionResult {
        let misaligned_at = self.provider.misaligned_at();
        let elapsed = self.started.elapsed();
        let len = self.nodes.len();

        let (mut status, mut origin, mut payload, mut invalid_reason) = match outcome {
            Ok(Ok(DrawOutcome::Continue)) => (Status::Valid, None, None, None),
            Ok(Ok(DrawOutcome::Reject)) => (Status::Invalid, None, None, Some(InvalidReason::Rejected)),
            Ok(Ok(DrawOutcome::Interesting { origin, payload })) => {
                (Status::Interesting, Some(origin), Some(payload), None)
            }
            Ok(Err(stop)) => stop_status(self.stopped.unwrap_or(stop)),
            Err(panic) => (Status::Interesting, Some(panic.origin()), Some(panic.message), None),
        };

        if let Some(limit) = self.deadline {
            if elapsed > limit && status != Status::Interesting && status != Status::Overrun {
                status = Status::Invalid;
                origin = None;
                payload = None;
                invalid_reason = Some(InvalidReason::DeadlineExceeded);
            }
        }

        SessionResult {
            status,
            nodes: self.nodes,
            spans: self.spans.finish(len),
            origin,
            payload,
            invalid_reason,
            misaligned_at,
            notes: self.notes,
            events: self.events,
            duration: elapsed,
        }
    }
}

fn stop_status(
    stop: StopTest,
) -> (Status, Option<InterestingOrigin>, Option<String>, Option<InvalidReason>) {
    match stop {
        StopTest::Overrun | StopTest::Frozen => (Status::Overrun, None, None, None),
        StopTest::Rejected => (Status::Invalid, None, None, Some(InvalidReason::Rejected)),
        StopTest::DeadlineExceeded => (Status::Invalid, None, None, Some(InvalidReason::DeadlineExceeded)),
        StopTest::BadForcedValue => (Status::Invalid, None, None, Some(InvalidReason::BadForcedValue)),
    }
}

/// The immutable record of a concluded session.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub status: Status,
    pub nodes: Vec<ChoiceNode>,
    pub spans: Spans,
    pub origin: Option<InterestingOrigin>,
    pub payload: Option<String>,
    pub invalid_reason: Option<InvalidReason>,
    pub misaligned_at: Option<usize>,
    pub notes: Vec<String>,
    pub events: Vec<String>,
    pub duration: Duration,
}

impl SessionResult {
    /// A result predicted without running the test.
    pub fn simulated(status: Status, nodes: Vec<ChoiceNode>, origin: Option<InterestingOrigin>) -> Self {
        SessionResult {
            status,
            nodes,
            spans: Spans::default(),
            origin,
            payload: None,
            invalid_reason: None,
            misaligned_at: None,
            notes: Vec::new(),
            events: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn choices(&self) -> Vec<ChoiceValue> {
        choice::values(&self.nodes)
    }

    pub fn sort_key(&self) -> SortKey {
        choice::sort_key(&self.nodes)
    }

    /// Interesting with exactly this origin.
    pub fn reproduces(&self, origin: &InterestingOrigin) -> bool {
        self.status == Status::Interesting && self.origin.as_ref() == Some(origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{RandomProvider, ReplayProvider};

    #[test]
    fn test_session_records_choices_and_spans() {
        let mut provider = RandomProvider::new(1);
        let mut session = DrawSession::new(&mut provider, 100);
        session.start_span(9);
        let x = session.draw_integer(IntegerConstraints::bounded(0, 10), None).unwrap();
        let b = session.draw_boolean(0.5, Some(true)).unwrap();
        session.stop_span(false);
        let result = session.conclude(Ok(Ok(DrawOutcome::Continue)));

        assert_eq!(result.status, Status::Valid);
        assert_eq!(result.choices(), vec![ChoiceValue::Integer(x), ChoiceValue::Boolean(b)]);
        assert!(result.nodes[1].was_forced);
        assert_eq!(result.spans.len(), 2);
        assert_eq!(result.spans.get(1).map(|s| (s.label, s.start, s.end)), Some((9, 0, 2)));
    }

    #[test]
    fn test_exhausted_replay_is_overrun_and_freezes() {
        let prefix = vec![ChoiceValue::Integer(2)];
        let mut provider = ReplayProvider::new(&prefix);
        let mut session = DrawSession::new(&mut provider, 100);
        assert_eq!(session.draw_integer(IntegerConstraints::unbounded(), None), Ok(2));
        assert_eq!(
            session.draw_integer(IntegerConstraints::unbounded(), None),
            Err(StopTest::Overrun)
        );
        assert_eq!(session.draw_boolean(0.5, None), Err(StopTest::Frozen));
        let result = session.conclude(Ok(Err(StopTest::Frozen)));
        assert_eq!(result.status, Status::Overrun);
    }

    #[test]
    fn test_max_choices_overruns() {
        let mut provider = RandomProvider::new(1);
        let mut session = DrawSession::new(&mut provider, 2);
        assert!(session.draw_boolean(0.5, None).is_ok());
        assert!(session.draw_boolean(0.5, None).is_ok());
        assert_eq!(session.draw_boolean(0.5, None), Err(StopTest::Overrun));
    }

    #[test]
    fn test_forced_draws_consume_replayed_positions() {
        let prefix = vec![ChoiceValue::Integer(7), ChoiceValue::Integer(8)];
        let mut provider = ReplayProvider::new(&prefix);
        let mut session = DrawSession::new(&mut provider, 100);
        assert_eq!(session.draw_integer(IntegerConstraints::unbounded(), Some(1)), Ok(1));
        assert_eq!(session.draw_integer(IntegerConstraints::unbounded(), None), Ok(8));
    }

    #[test]
    fn test_out_of_range_forced_value_invalidates_the_trial() {
        let mut provider = RandomProvider::new(1);
        let mut session = DrawSession::new(&mut provider, 10);
        let drawn = session.draw_integer(IntegerConstraints::bounded(0, 10), Some(11));
        assert_eq!(drawn, Err(StopTest::BadForcedValue));
        assert!(session.is_empty());
        let result = session.conclude(Ok(drawn.map(|_| DrawOutcome::Continue)));
        assert_eq!(result.status, Status::Invalid);
        assert_eq!(result.invalid_reason, Some(InvalidReason::BadForcedValue));
    }

    #[test]
    fn test_panic_concludes_interesting() {
        let mut provider = RandomProvider::new(1);
        let session = DrawSession::new(&mut provider, 10);
        let panic = PanicRecord {
            location: "src/x.rs:1:2".to_string(),
            message: "boom".to_string(),
        };
        let result = session.conclude(Err(panic.clone()));
        assert!(result.reproduces(&panic.origin()));
        assert_eq!(result.payload.as_deref(), Some("boom"));
    }

    #[test]
    fn test_assume_rejects() {
        let mut provider = RandomProvider::new(1);
        let mut session = DrawSession::new(&mut provider, 10);
        let outcome = session.assume(false).map(|_| DrawOutcome::Continue);
        let result = session.conclude(Ok(outcome));
        assert_eq!(result.status, Status::Invalid);
        assert_eq!(result.invalid_reason, Some(InvalidReason::Rejected));
    }
}
