//! The bridge pass: learn the shape of the region where two interesting
//! encodings differ, then ask the learned automaton for something smaller.

use tracing::{debug, warn};

use crate::choice::{self, ChoiceValue};
use crate::codec::{choices_from_bytes, choices_to_bytes};
use crate::error::FailedToNormalize;
use crate::session::SessionResult;

use super::lstar::{LStar, LearnError};
use super::Shrinker;

/// Rounds of "propose, check, relearn" per bridge attempt.
const MAX_ROUNDS: usize = 8;

enum Verdict {
    Improved,
    NoImprovement,
    Failed(String),
}

/// Lengths of the longest common prefix and (non-overlapping) suffix.
fn common_affixes(a: &[u8], b: &[u8]) -> (usize, usize) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let room = a.len().min(b.len()) - prefix;
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take(room)
        .take_while(|(x, y)| x == y)
        .count();
    (prefix, suffix)
}

impl<F> Shrinker<F>
where
    F: FnMut(&[ChoiceValue]) -> SessionResult,
{
    pub(super) fn bridge(&mut self) {
        if self.bridge_disabled || self.history.len() < 2 {
            return;
        }
        let current = choices_to_bytes(&self.target.choices());
        let mut others = Vec::new();
        if let Some(previous) = self.history.iter().rev().nth(1) {
            others.push(choices_to_bytes(&choice::values(previous)));
        }
        if self.history.len() > 2 {
            others.push(choices_to_bytes(&choice::values(&self.history[0])));
        }

        for other in others {
            if self.exhausted() || self.bridge_disabled {
                return;
            }
            let (p, s) = common_affixes(&current, &other);
            let middle = &current[p..current.len() - s];
            let other_middle = &other[p..other.len() - s];
            if middle.is_empty() || middle.len().max(other_middle.len()) > self.config.bridge_max_region {
                continue;
            }
            match self.bridge_between(&current[..p], middle, other_middle, &current[current.len() - s..]) {
                Verdict::NoImprovement => {}
                Verdict::Improved | Verdict::Failed(_) => return,
            }
        }
    }

    fn bridge_between(&mut self, prefix: &[u8], middle: &[u8], other: &[u8], suffix: &[u8]) -> Verdict {
        let before = self.target.sort_key();
        let origin = self.origin.clone();
        let budget = self
            .config
            .bridge_queries
            .min(self.config.max_calls.saturating_sub(self.calls));

        let (outcome, queries) = {
            let mut lstar = LStar::new(
                |m: &[u8]| {
                    let mut bytes = prefix.to_vec();
                    bytes.extend_from_slice(m);
                    bytes.extend_from_slice(suffix);
                    self.bridge_member(&bytes)
                },
                budget,
            );
            let outcome = learn_and_propose(&mut lstar, middle, other);
            (outcome, lstar.queries())
        };

        let verdict = match outcome {
            Ok(()) if self.target.sort_key() < before => Verdict::Improved,
            Ok(()) => Verdict::NoImprovement,
            Err(reason) => Verdict::Failed(reason),
        };
        match &verdict {
            Verdict::Improved => debug!(queries, "bridge found a simpler example"),
            Verdict::NoImprovement => debug!(queries, "bridge found nothing simpler"),
            Verdict::Failed(reason) => {
                warn!(origin = %origin, queries, reason = %reason, "failed to normalize");
                self.diagnostics.push(FailedToNormalize {
                    origin,
                    reason: reason.clone(),
                    queries,
                });
                self.bridge_disabled = true;
            }
        }
        verdict
    }

    /// Whether `bytes` decode to choices that reproduce the origin. Simpler
    /// reproductions are accepted along the way.
    fn bridge_member(&mut self, bytes: &[u8]) -> bool {
        let Ok(values) = choices_from_bytes(bytes) else {
            return false;
        };
        if self.exhausted() {
            return false;
        }
        let result = self.execute(&values);
        let reproduces = result.reproduces(&self.origin);
        self.incorporate(result);
        reproduces
    }
}

/// Teach `lstar` both known-interesting middles, then repeatedly propose
/// the smallest accepted string until it is confirmed or nothing smaller
/// than `middle` remains.
fn learn_and_propose<M>(lstar: &mut LStar<M>, middle: &[u8], other: &[u8]) -> Result<(), String>
where
    M: FnMut(&[u8]) -> bool,
{
    let describe = |e: LearnError| e.to_string();
    for known in [middle, other] {
        if !lstar.member(known).map_err(describe)? {
            return Err("predicate rejected a recorded interesting example".to_string());
        }
        lstar.learn(known).map_err(describe)?;
    }
    for _ in 0..MAX_ROUNDS {
        let Some(candidate) = lstar.shortest_accepted(middle.len()).map_err(describe)? else {
            return Ok(());
        };
        let shortlex = (candidate.len(), candidate.as_slice());
        if shortlex >= (middle.len(), middle) {
            return Ok(());
        }
        if lstar.member(&candidate).map_err(describe)? {
            return Ok(());
        }
        lstar.learn(&candidate).map_err(describe)?;
    }
    Ok(())
}
