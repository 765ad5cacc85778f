//! Test-case reduction.
//!
//! The shrinker owns one interesting [`SessionResult`] and keeps replacing
//! it with strictly simpler results that fail the same way. Candidates come
//! from a library of passes run to a fixpoint: cheap structural deletions
//! first, then per-choice minimisation, then a few expensive passes that
//! only run when everything else is stuck.

mod bridge;
mod lstar;
mod passes;
pub mod search;

pub use lstar::{IntegerNormalizer, LStar, LearnError};

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::choice::{self, ChoiceNode, ChoiceValue, SortKey};
use crate::error::FailedToNormalize;
use crate::origin::InterestingOrigin;
use crate::session::{SessionResult, Status};

/// One reduction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pass {
    DeleteSpans,
    DeleteSiblingRuns,
    ZeroSpans,
    PassToDescendant,
    MinimizeChoices,
    MinimizeDuplicates,
    ReorderSpans,
    CollapseIrrelevant,
    LowerAndDelete,
    RedistributePairs,
    Bridge,
}

impl Pass {
    pub const COARSE: [Pass; 4] = [
        Pass::DeleteSpans,
        Pass::DeleteSiblingRuns,
        Pass::ZeroSpans,
        Pass::PassToDescendant,
    ];

    pub const FINE: [Pass; 4] = [
        Pass::MinimizeChoices,
        Pass::MinimizeDuplicates,
        Pass::ReorderSpans,
        Pass::CollapseIrrelevant,
    ];

    pub const EMERGENCY: [Pass; 2] = [Pass::LowerAndDelete, Pass::RedistributePairs];

    pub fn name(&self) -> &'static str {
        match self {
            Pass::DeleteSpans => "delete_spans",
            Pass::DeleteSiblingRuns => "delete_sibling_runs",
            Pass::ZeroSpans => "zero_spans",
            Pass::PassToDescendant => "pass_to_descendant",
            Pass::MinimizeChoices => "minimize_choices",
            Pass::MinimizeDuplicates => "minimize_duplicates",
            Pass::ReorderSpans => "reorder_spans",
            Pass::CollapseIrrelevant => "collapse_irrelevant",
            Pass::LowerAndDelete => "lower_and_delete",
            Pass::RedistributePairs => "redistribute_pairs",
            Pass::Bridge => "bridge",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub runs: usize,
    pub calls: usize,
    pub shrinks: usize,
}

#[derive(Debug, Clone)]
pub struct ShrinkConfig {
    /// Accepted replacements before giving up.
    pub max_shrinks: usize,
    /// Test executions before giving up.
    pub max_calls: usize,
    pub timeout: Option<Duration>,
    /// Membership queries one bridge attempt may spend.
    pub bridge_queries: usize,
    /// Longest differing region the bridge will try to learn, in bytes.
    pub bridge_max_region: usize,
    pub seed: u64,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        ShrinkConfig {
            max_shrinks: 500,
            max_calls: 10_000,
            timeout: Some(Duration::from_secs(300)),
            bridge_queries: 500,
            bridge_max_region: 32,
            seed: 0,
        }
    }
}

impl ShrinkConfig {
    pub fn with_shrinks(mut self, max_shrinks: usize) -> Self {
        self.max_shrinks = max_shrinks;
        self
    }

    pub fn with_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = max_calls;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Reduces one interesting result to a simpler one with the same origin.
///
/// `test` replays a choice sequence and reports what happened.
pub struct Shrinker<F> {
    test: F,
    target: SessionResult,
    origin: InterestingOrigin,
    config: ShrinkConfig,
    calls: usize,
    shrinks: usize,
    started: Instant,
    tried: HashSet<Vec<ChoiceValue>>,
    history: Vec<Vec<ChoiceNode>>,
    stats: BTreeMap<Pass, PassStats>,
    settled: HashSet<(usize, usize)>,
    diagnostics: Vec<FailedToNormalize>,
    bridge_disabled: bool,
    rng: StdRng,
    active: Option<Pass>,
}

impl<F> Shrinker<F>
where
    F: FnMut(&[ChoiceValue]) -> SessionResult,
{
    /// Panics if `target` is not interesting.
    pub fn new(test: F, target: SessionResult, config: ShrinkConfig) -> Self {
        let origin = match (target.status, &target.origin) {
            (Status::Interesting, Some(origin)) => origin.clone(),
            (status, _) => panic!("shrink target must be interesting, got {:?}", status),
        };
        let rng = StdRng::seed_from_u64(config.seed);
        let mut tried = HashSet::new();
        tried.insert(target.choices());
        Shrinker {
            test,
            history: vec![target.nodes.clone()],
            target,
            origin,
            config,
            calls: 0,
            shrinks: 0,
            started: Instant::now(),
            tried,
            stats: BTreeMap::new(),
            settled: HashSet::new(),
            diagnostics: Vec::new(),
            bridge_disabled: false,
            rng,
            active: None,
        }
    }

    pub fn target(&self) -> &SessionResult {
        &self.target
    }

    pub fn into_target(self) -> SessionResult {
        self.target
    }

    pub fn origin(&self) -> &InterestingOrigin {
        &self.origin
    }

    /// Every accepted target, starting with the initial one.
    pub fn history(&self) -> &[Vec<ChoiceNode>] {
        &self.history
    }

    pub fn stats(&self) -> &BTreeMap<Pass, PassStats> {
        &self.stats
    }

    pub fn diagnostics(&self) -> &[FailedToNormalize] {
        &self.diagnostics
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn shrinks(&self) -> usize {
        self.shrinks
    }

    fn sort_key(&self) -> SortKey {
        self.target.sort_key()
    }

    /// Whether any budget has run out.
    pub fn exhausted(&self) -> bool {
        self.shrinks >= self.config.max_shrinks
            || self.calls >= self.config.max_calls
            || self
                .config
                .timeout
                .map_or(false, |limit| self.started.elapsed() >= limit)
    }

    /// Run passes until none of them makes progress or a budget runs out.
    pub fn shrink(&mut self) {
        debug!(origin = %self.origin, choices = self.target.nodes.len(), "shrinking");
        self.consider(Vec::new());
        let simplest: Vec<ChoiceNode> = self
            .target
            .nodes
            .iter()
            .map(|n| ChoiceNode {
                value: n.constraints.simplest(),
                ..n.clone()
            })
            .collect();
        self.consider(simplest);

        while !self.exhausted() {
            let before = self.sort_key();
            self.fixate(&Pass::COARSE, false);
            let all: Vec<Pass> = Pass::COARSE.iter().chain(Pass::FINE.iter()).copied().collect();
            self.fixate(&all, true);
            if self.sort_key() != before {
                continue;
            }
            for pass in Pass::EMERGENCY {
                self.run_pass(pass);
            }
            if self.sort_key() != before {
                continue;
            }
            self.run_pass(Pass::Bridge);
            if self.sort_key() == before {
                break;
            }
        }
        debug!(
            origin = %self.origin,
            choices = self.target.nodes.len(),
            calls = self.calls,
            shrinks = self.shrinks,
            "shrink finished"
        );
    }

    fn fixate(&mut self, passes: &[Pass], shuffle: bool) {
        loop {
            let before = self.sort_key();
            let mut order = passes.to_vec();
            if shuffle {
                order.shuffle(&mut self.rng);
            }
            for pass in order {
                if self.exhausted() {
                    return;
                }
                self.run_pass(pass);
            }
            if self.sort_key() == before {
                return;
            }
        }
    }

    pub fn run_pass(&mut self, pass: Pass) {
        if self.exhausted() {
            return;
        }
        self.active = Some(pass);
        self.stats.entry(pass).or_default().runs += 1;
        let shrinks = self.shrinks;
        match pass {
            Pass::DeleteSpans => self.delete_spans(),
            Pass::DeleteSiblingRuns => self.delete_sibling_runs(),
            Pass::ZeroSpans => self.zero_spans(),
            Pass::PassToDescendant => self.pass_to_descendant(),
            Pass::MinimizeChoices => self.minimize_choices(),
            Pass::MinimizeDuplicates => self.minimize_duplicates(),
            Pass::ReorderSpans => self.reorder_spans(),
            Pass::CollapseIrrelevant => self.collapse_irrelevant(),
            Pass::LowerAndDelete => self.lower_and_delete(),
            Pass::RedistributePairs => self.redistribute_pairs(),
            Pass::Bridge => self.bridge(),
        }
        self.active = None;
        if self.shrinks > shrinks {
            debug!(pass = %pass, accepted = self.shrinks - shrinks, "pass made progress");
        }
    }

    /// Try `nodes` as a replacement. Only strictly simpler candidates that
    /// have not been tried before reach the test.
    fn consider(&mut self, nodes: Vec<ChoiceNode>) -> bool {
        if choice::compare_nodes(&nodes, &self.target.nodes) != Ordering::Less {
            return false;
        }
        self.consider_values(choice::values(&nodes))
    }

    fn consider_values(&mut self, values: Vec<ChoiceValue>) -> bool {
        if self.exhausted() || !self.tried.insert(values.clone()) {
            return false;
        }
        let result = self.execute(&values);
        self.incorporate(result)
    }

    fn execute(&mut self, values: &[ChoiceValue]) -> SessionResult {
        self.calls += 1;
        if let Some(pass) = self.active {
            self.stats.entry(pass).or_default().calls += 1;
        }
        trace!(choices = values.len(), "shrink candidate");
        (self.test)(values)
    }

    /// Accept `result` if it reproduces the origin and is strictly simpler.
    fn incorporate(&mut self, result: SessionResult) -> bool {
        if !result.reproduces(&self.origin)
            || choice::compare_nodes(&result.nodes, &self.target.nodes) != Ordering::Less
        {
            return false;
        }
        if result.nodes.len() != self.target.nodes.len() {
            self.settled.clear();
        }
        self.shrinks += 1;
        if let Some(pass) = self.active {
            self.stats.entry(pass).or_default().shrinks += 1;
        }
        trace!(choices = result.nodes.len(), "accepted shrink");
        self.history.push(result.nodes.clone());
        self.target = result;
        true
    }

    /// The current target with `start..end` replaced by `with`.
    fn spliced(&self, start: usize, end: usize, with: &[ChoiceNode]) -> Vec<ChoiceNode> {
        let nodes = &self.target.nodes;
        let mut out = Vec::with_capacity(nodes.len() - (end - start) + with.len());
        out.extend_from_slice(&nodes[..start]);
        out.extend_from_slice(with);
        out.extend_from_slice(&nodes[end..]);
        out
    }

    /// Try a different value for the choice at `index`.
    fn try_replace(&mut self, index: usize, value: ChoiceValue) -> bool {
        let Some(node) = self.target.nodes.get(index) else {
            return false;
        };
        if node.value == value {
            return false;
        }
        let Some(replacement) = node.with_value(value) else {
            return false;
        };
        let candidate = self.spliced(index, index + 1, &[replacement]);
        self.consider(candidate)
    }

    fn is_settled(&self, index: usize) -> bool {
        self.settled.iter().any(|&(start, end)| start <= index && index < end)
    }
}
