//! The engine loop: replay, generate, shrink.
//!
//! A [`Runner`] owns the test function for one property and drives it
//! through the configured phases. Every execution goes through
//! [`Runner::execute`], which records the result in the data tree, keeps
//! the best example for each distinct origin, and keeps the database in
//! step with those examples.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::blob::{decode_failure, encode_failure};
use crate::choice::{
    self, BooleanConstraints, BytesConstraints, ChoiceValue, FloatConstraints, IntegerConstraints,
    StringConstraints,
};
use crate::codec::{choices_from_bytes, choices_to_bytes};
use crate::config::{Config, Phase};
use crate::database::{secondary_key, ExampleDatabase};
use crate::datatree::DataTree;
use crate::error::{
    ConjectureError, DrawOutcome, FailedToNormalize, InvalidReason, ProviderExhausted, Result, StopTest,
};
use crate::origin::{catch_panic, InterestingOrigin};
use crate::provider::{PrimitiveProvider, ProviderLifetime, ReplayProvider};
use crate::report::{Failure, Report, RunStats};
use crate::session::{DrawSession, SessionResult, Status};
use crate::shrinker::{ShrinkConfig, Shrinker};

/// Fresh trials before mutation is considered.
const MUTATION_WARMUP: usize = 10;

/// Valid results kept as raw material for mutation.
const MUTATION_POOL: usize = 64;

/// Extra calls allowed after the first bug while looking for others.
const MULTI_BUG_GRACE: usize = 1000;

/// Answers every draw with the simplest permitted value.
struct SimplestProvider;

impl PrimitiveProvider for SimplestProvider {
    fn draw_boolean(&mut self, constraints: &BooleanConstraints) -> std::result::Result<bool, ProviderExhausted> {
        Ok(constraints.simplest())
    }

    fn draw_integer(&mut self, constraints: &IntegerConstraints) -> std::result::Result<i128, ProviderExhausted> {
        Ok(constraints.simplest())
    }

    fn draw_float(&mut self, constraints: &FloatConstraints) -> std::result::Result<f64, ProviderExhausted> {
        Ok(constraints.simplest())
    }

    fn draw_string(&mut self, constraints: &StringConstraints) -> std::result::Result<String, ProviderExhausted> {
        Ok(constraints.simplest())
    }

    fn draw_bytes(&mut self, constraints: &BytesConstraints) -> std::result::Result<Vec<u8>, ProviderExhausted> {
        Ok(constraints.simplest())
    }
}

fn run_trial<T>(
    test: &mut T,
    provider: &mut dyn PrimitiveProvider,
    max_choices: usize,
    deadline: Option<Duration>,
) -> SessionResult
where
    T: FnMut(&mut DrawSession<'_>) -> std::result::Result<DrawOutcome, StopTest>,
{
    let mut session = DrawSession::new(provider, max_choices).with_deadline(deadline);
    let outcome = catch_panic(|| test(&mut session));
    session.conclude(outcome)
}

fn discard(db: &dyn ExampleDatabase, key: &[u8], value: &[u8]) {
    if let Err(e) = db.delete(key, value) {
        warn!(error = %e, "could not delete stale example");
    }
}

/// Drives one test function through explicit replay, database reuse,
/// generation and shrinking.
pub struct Runner<T> {
    test: T,
    config: Config,
    key: Option<Vec<u8>>,
    tree: DataTree,
    interesting: BTreeMap<InterestingOrigin, SessionResult>,
    discovered: Vec<InterestingOrigin>,
    diagnostics: BTreeMap<InterestingOrigin, Vec<FailedToNormalize>>,
    stats: RunStats,
    rng: StdRng,
    persistent: Option<Box<dyn PrimitiveProvider>>,
    pool: Vec<SessionResult>,
    first_bug_at: Option<usize>,
    last_bug_at: Option<usize>,
    phase: Phase,
}

impl<T> Runner<T>
where
    T: FnMut(&mut DrawSession<'_>) -> std::result::Result<DrawOutcome, StopTest>,
{
    pub fn new(test: T, config: Config) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let probe = config.provider.build(rng.gen());
        let persistent = (probe.lifetime() == ProviderLifetime::TestFunction).then_some(probe);
        debug!(seed, provider = config.provider.name(), "runner created");
        Runner {
            test,
            key: config.database_key(),
            config,
            tree: DataTree::new(),
            interesting: BTreeMap::new(),
            discovered: Vec::new(),
            diagnostics: BTreeMap::new(),
            stats: RunStats::default(),
            rng,
            persistent,
            pool: Vec::new(),
            first_bug_at: None,
            last_bug_at: None,
            phase: Phase::Explicit,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn tree(&self) -> &DataTree {
        &self.tree
    }

    /// Best known example for every origin seen so far.
    pub fn interesting(&self) -> &BTreeMap<InterestingOrigin, SessionResult> {
        &self.interesting
    }

    fn database(&self) -> Option<(&dyn ExampleDatabase, &[u8])> {
        match (&self.config.database, &self.key) {
            (Some(db), Some(key)) => Some((db.as_ref(), key.as_slice())),
            _ => None,
        }
    }

    fn trial_deadline(&self) -> Option<Duration> {
        self.config.deadline.map(|d| match self.phase {
            Phase::Shrink => d.mul_f64(1.25),
            _ => d,
        })
    }

    /// Run `prefix`. With `extend`, draws past the prefix come from the
    /// configured provider, otherwise they overrun.
    pub fn execute(&mut self, prefix: &[ChoiceValue], extend: bool) -> SessionResult {
        let deadline = self.trial_deadline();
        let max_choices = self.config.size_limit;
        let result = if extend {
            let seed = self.rng.gen();
            let mut fresh: Box<dyn PrimitiveProvider>;
            let fallback: &mut dyn PrimitiveProvider = match self.persistent.as_mut() {
                Some(provider) => provider.as_mut(),
                None => {
                    fresh = self.config.provider.build(seed);
                    fresh.as_mut()
                }
            };
            let mut provider = ReplayProvider::with_fallback(prefix, fallback);
            run_trial(&mut self.test, &mut provider, max_choices, deadline)
        } else {
            let mut provider = ReplayProvider::new(prefix);
            run_trial(&mut self.test, &mut provider, max_choices, deadline)
        };
        self.record(&result);
        result
    }

    fn execute_simplest(&mut self) -> SessionResult {
        let deadline = self.trial_deadline();
        let result = run_trial(&mut self.test, &mut SimplestProvider, self.config.size_limit, deadline);
        self.record(&result);
        result
    }

    /// Replay `choices`, answering from the data tree when it already knows
    /// the outcome is not interesting.
    fn cached_execute(&mut self, choices: &[ChoiceValue]) -> SessionResult {
        if let Some(simulation) = self.tree.simulate(choices) {
            if simulation.conclusion.status != Status::Interesting {
                return SessionResult::simulated(simulation.conclusion.status, simulation.nodes, None);
            }
        }
        if self.phase == Phase::Shrink {
            self.stats.shrink_calls += 1;
        }
        self.execute(choices, false)
    }

    fn record(&mut self, result: &SessionResult) {
        self.stats.calls += 1;
        match result.status {
            Status::Valid => self.stats.valid += 1,
            Status::Invalid => {
                self.stats.invalid += 1;
                if result.invalid_reason == Some(InvalidReason::DeadlineExceeded) {
                    self.stats.timed_out += 1;
                    warn!(duration = ?result.duration, "trial exceeded its deadline");
                }
                if result.invalid_reason == Some(InvalidReason::BadForcedValue) {
                    warn!("a forced value violated its constraints; trial marked invalid");
                }
            }
            Status::Overrun => self.stats.overrun += 1,
            Status::Interesting => {}
        }
        for event in &result.events {
            self.stats.record_event(event);
        }
        self.tree.record(result);

        if result.status == Status::Valid && self.pool.len() < MUTATION_POOL && result.spans.len() > 2 {
            self.pool.push(result.clone());
        }
        if let (Status::Interesting, Some(origin)) = (result.status, &result.origin) {
            self.record_interesting(origin.clone(), result);
        }
    }

    fn record_interesting(&mut self, origin: InterestingOrigin, result: &SessionResult) {
        if !self.config.report_multiple_bugs && self.discovered.first().map_or(false, |first| *first != origin) {
            trace!(origin = %origin, "ignoring further bug");
            return;
        }
        let previous = match self.interesting.get(&origin) {
            Some(existing) if choice::compare_nodes(&result.nodes, &existing.nodes) != Ordering::Less => return,
            Some(existing) => Some(existing.choices()),
            None => {
                info!(origin = %origin, calls = self.stats.calls, "found a new interesting origin");
                self.discovered.push(origin.clone());
                self.first_bug_at.get_or_insert(self.stats.calls);
                None
            }
        };
        self.last_bug_at = Some(self.stats.calls);

        if let Some((db, key)) = self.database() {
            let value = choices_to_bytes(&result.choices());
            if let Err(e) = db.save(key, &value) {
                warn!(error = %e, "could not save example");
            }
            if let Some(previous) = previous {
                let old = choices_to_bytes(&previous);
                if old != value {
                    if let Err(e) = db.move_value(key, &secondary_key(key), &old) {
                        warn!(error = %e, "could not move superseded example");
                    }
                }
            }
        }
        self.interesting.insert(origin, result.clone());
    }

    fn stop_on_first_bug(&self) -> bool {
        !self.config.report_multiple_bugs && !self.interesting.is_empty()
    }

    /// Run every enabled phase and report.
    pub fn run(&mut self) -> Result<Report> {
        if self.config.runs(Phase::Explicit) {
            self.timed(Phase::Explicit, Self::explicit_phase)?;
        }
        if self.config.runs(Phase::Reuse) && !self.stop_on_first_bug() {
            self.timed(Phase::Reuse, Self::reuse_phase)?;
        }
        if self.config.runs(Phase::Generate) && !self.stop_on_first_bug() {
            self.timed(Phase::Generate, Self::generate_phase)?;
        }
        let tests_run = self.stats.calls;

        if self.interesting.is_empty() {
            if self.stats.valid == 0 && self.stats.invalid + self.stats.overrun > 0 {
                return Err(ConjectureError::Unsatisfiable {
                    valid: self.stats.valid,
                    invalid: self.stats.invalid,
                    overrun: self.stats.overrun,
                });
            }
            return Ok(Report::Pass {
                name: self.config.name.clone(),
                tests_run: self.stats.valid,
                stats: self.stats.clone(),
            });
        }

        if self.config.runs(Phase::Shrink) {
            self.timed(Phase::Shrink, Self::shrink_phase)?;
        }

        let failures = self
            .discovered
            .iter()
            .filter_map(|origin| {
                let best = self.interesting.get(origin)?;
                let choices = best.choices();
                Some(Failure {
                    origin: origin.clone(),
                    blob: encode_failure(&choices),
                    choices,
                    payload: best.payload.clone(),
                    notes: best.notes.clone(),
                    diagnostics: self.diagnostics.get(origin).cloned().unwrap_or_default(),
                })
            })
            .collect();
        Ok(Report::Fail {
            name: self.config.name.clone(),
            tests_run,
            failures,
            stats: self.stats.clone(),
        })
    }

    fn timed(&mut self, phase: Phase, body: fn(&mut Self) -> Result<()>) -> Result<()> {
        debug!(phase = %phase, "entering phase");
        self.phase = phase;
        let started = Instant::now();
        let outcome = body(self);
        self.stats.add_phase_time(phase, started.elapsed());
        outcome
    }

    fn explicit_phase(&mut self) -> Result<()> {
        let blobs = self.config.replay.clone();
        for blob in blobs {
            let choices = decode_failure(&blob)?;
            let result = self.execute(&choices, false);
            if result.status != Status::Interesting {
                warn!(blob = %blob, status = ?result.status, "explicit example did not fail");
            }
            if self.stop_on_first_bug() {
                break;
            }
        }
        Ok(())
    }

    /// Stored values under `key`, decoded and sorted simplest first.
    /// Undecodable values are deleted.
    fn load_corpus(&self, key: &[u8]) -> Vec<(Vec<u8>, Vec<ChoiceValue>)> {
        let Some(db) = self.config.database.as_deref() else {
            return Vec::new();
        };
        let stored = match db.fetch(key) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "could not read example database");
                return Vec::new();
            }
        };
        let mut corpus = Vec::with_capacity(stored.len());
        for bytes in stored {
            match choices_from_bytes(&bytes) {
                Ok(choices) => corpus.push((bytes, choices)),
                Err(e) => {
                    warn!(error = %e, "deleting corrupt database entry");
                    discard(db, key, &bytes);
                }
            }
        }
        corpus.sort_by(|a, b| (a.0.len(), &a.0).cmp(&(b.0.len(), &b.0)));
        corpus
    }

    fn reuse_phase(&mut self) -> Result<()> {
        let Some(key) = self.key.clone() else {
            return Ok(());
        };
        let secondary = secondary_key(&key);

        for (bytes, choices) in self.load_corpus(&key) {
            let result = self.execute(&choices, false);
            if result.status != Status::Interesting {
                warn!(status = ?result.status, "stored example no longer fails; discarding it");
                if let Some(db) = self.config.database.as_deref() {
                    discard(db, &key, &bytes);
                    discard(db, &secondary, &bytes);
                }
            }
            if self.stop_on_first_bug() {
                return Ok(());
            }
        }

        let wanted = ((self.config.test_limit as f64 * 0.1).ceil() as usize).max(2);
        if self.interesting.len() >= wanted {
            return Ok(());
        }
        let top_up = wanted - self.interesting.len();
        for (bytes, choices) in self.load_corpus(&secondary).into_iter().take(top_up) {
            let result = self.execute(&choices, false);
            if result.status != Status::Interesting {
                if let Some(db) = self.config.database.as_deref() {
                    discard(db, &secondary, &bytes);
                }
            }
            if self.stop_on_first_bug() {
                break;
            }
        }
        Ok(())
    }

    fn generation_should_stop(&self) -> bool {
        let calls = self.stats.calls;
        if self.stats.valid >= self.config.test_limit
            || self.stats.invalid >= self.config.discard_limit
            || calls >= (10 * self.config.test_limit).max(1000)
        {
            return true;
        }
        match (self.first_bug_at, self.last_bug_at) {
            (Some(_), _) if !self.config.report_multiple_bugs => true,
            (Some(first), Some(last)) => calls >= (first + MULTI_BUG_GRACE).min(last * 2),
            _ => false,
        }
    }

    /// Splice one span of a recorded valid example over another span with
    /// the same label.
    fn mutated_prefix(&mut self) -> Option<Vec<ChoiceValue>> {
        let example = self.pool.choose(&mut self.rng)?;
        let mut by_label: BTreeMap<u64, Vec<(usize, usize)>> = BTreeMap::new();
        for span in example.spans.iter().skip(1) {
            by_label.entry(span.label).or_default().push((span.start, span.end));
        }
        let groups: Vec<Vec<(usize, usize)>> = by_label.into_values().filter(|g| g.len() > 1).collect();
        let group = groups.choose(&mut self.rng)?;
        let mut picked = group.choose_multiple(&mut self.rng, 2);
        let (source, dest) = (*picked.next()?, *picked.next()?);
        let values = example.choices();
        let mut prefix = values[..dest.0].to_vec();
        prefix.extend_from_slice(&values[source.0..source.1]);
        prefix.extend_from_slice(&values[dest.1..]);
        Some(prefix)
    }

    fn generate_phase(&mut self) -> Result<()> {
        if self.tree.simulate(&[]).is_none() {
            self.execute_simplest();
        }
        let mut fresh = 0;
        while !self.generation_should_stop() && !self.stop_on_first_bug() {
            let mutated = if fresh >= MUTATION_WARMUP && self.rng.gen_bool(0.2) {
                self.mutated_prefix()
                    .filter(|prefix| self.tree.simulate(prefix).is_none())
            } else {
                None
            };
            let prefix = match mutated {
                Some(prefix) => prefix,
                None => match self.tree.generate_novel_prefix(&mut self.rng) {
                    Some(prefix) => prefix,
                    None => {
                        debug!(calls = self.stats.calls, "search space exhausted");
                        self.stats.exhausted = true;
                        break;
                    }
                },
            };
            self.execute(&prefix, true);
            fresh += 1;
        }
        Ok(())
    }

    /// Retry superseded examples that could still beat a current best, then
    /// forget them.
    fn clear_secondary(&mut self) {
        let Some(key) = self.key.clone() else { return };
        let secondary = secondary_key(&key);
        let Some(worst) = self
            .interesting
            .values()
            .map(|r| choices_to_bytes(&r.choices()).len())
            .max()
        else {
            return;
        };
        for (bytes, choices) in self.load_corpus(&secondary) {
            if bytes.len() > worst {
                break;
            }
            self.cached_execute(&choices);
            if let Some(db) = self.config.database.as_deref() {
                discard(db, &secondary, &bytes);
            }
        }
    }

    fn shrink_phase(&mut self) -> Result<()> {
        self.clear_secondary();
        let mut done = BTreeSet::new();
        loop {
            let Some(origin) = self.discovered.iter().find(|o| !done.contains(*o)).cloned() else {
                return Ok(());
            };
            done.insert(origin.clone());
            let Some(best) = self.interesting.get(&origin).map(SessionResult::choices) else {
                continue;
            };

            let confirmed = self.execute(&best, false);
            if !confirmed.reproduces(&origin) {
                warn!(origin = %origin, "interesting example did not reproduce");
                return Err(ConjectureError::FlakyReplay { origin });
            }
            let Some(target) = self.interesting.get(&origin).cloned() else {
                continue;
            };

            let config = ShrinkConfig::default()
                .with_shrinks(self.config.shrink_limit)
                .with_timeout(self.config.timeout)
                .with_seed(self.rng.gen());
            let (shrinks, diagnostics) = {
                let mut shrinker = Shrinker::new(|choices: &[ChoiceValue]| self.cached_execute(choices), target, config);
                shrinker.shrink();
                (shrinker.shrinks(), shrinker.diagnostics().to_vec())
            };
            self.stats.shrinks += shrinks;
            if !diagnostics.is_empty() {
                self.diagnostics.entry(origin).or_default().extend(diagnostics);
            }
        }
    }
}

/// Run `test` under `config` and report.
pub fn run_test<T>(test: T, config: Config) -> Report
where
    T: FnMut(&mut DrawSession<'_>) -> std::result::Result<DrawOutcome, StopTest>,
{
    let name = config.name.clone();
    Runner::new(test, config)
        .run()
        .unwrap_or_else(Report::from)
        .with_name(name)
}
