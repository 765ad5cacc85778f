//! A trie of every choice sequence the runner has executed.
//!
//! The tree answers three questions without running the test: what would
//! replaying these choices do, which prefixes have never been tried, and
//! has every possible behaviour already been seen.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::warn;

use crate::choice::{ChoiceNode, ChoiceValue, Constraints};
use crate::origin::InterestingOrigin;
use crate::provider::{draw_with, RandomProvider};
use crate::session::{SessionResult, Status};

const MAX_ENUMERATED_DOMAIN: u128 = 256;

/// How a recorded path ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conclusion {
    pub status: Status,
    pub origin: Option<InterestingOrigin>,
}

/// The predicted outcome of replaying a choice sequence.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub conclusion: Conclusion,
    /// The choices the replay would actually make.
    pub nodes: Vec<ChoiceNode>,
}

#[derive(Debug, Default)]
struct TreeNode {
    constraints: Option<Constraints>,
    forced: Option<ChoiceValue>,
    children: HashMap<ChoiceValue, usize>,
    conclusion: Option<Conclusion>,
    exhausted: bool,
    parent: Option<usize>,
}

#[derive(Debug)]
pub struct DataTree {
    nodes: Vec<TreeNode>,
    inconsistent: usize,
}

impl Default for DataTree {
    fn default() -> Self {
        DataTree::new()
    }
}

impl DataTree {
    pub fn new() -> Self {
        DataTree {
            nodes: vec![TreeNode::default()],
            inconsistent: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.nodes[0].exhausted
    }

    /// How many recorded results disagreed with earlier ones.
    pub fn inconsistencies(&self) -> usize {
        self.inconsistent
    }

    fn flag_inconsistent(&mut self, detail: &str) {
        self.inconsistent += 1;
        warn!(detail, "test behaved differently on the same choices");
    }

    /// Add the path of a concluded session.
    pub fn record(&mut self, result: &SessionResult) {
        let mut current = 0;
        for node in &result.nodes {
            if self.nodes[current].conclusion.is_some() {
                self.flag_inconsistent("drew past a recorded conclusion");
                return;
            }
            if self.nodes[current].constraints.is_none() {
                self.nodes[current].constraints = Some(node.constraints.clone());
            } else if self.nodes[current].constraints.as_ref() != Some(&node.constraints) {
                self.flag_inconsistent("constraints changed");
                return;
            }
            if node.was_forced {
                self.nodes[current].forced = Some(node.value.clone());
            }
            current = match self.nodes[current].children.get(&node.value) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TreeNode {
                        parent: Some(current),
                        ..TreeNode::default()
                    });
                    self.nodes[current].children.insert(node.value.clone(), child);
                    child
                }
            };
        }

        if result.status == Status::Overrun {
            return;
        }
        let leaf = &mut self.nodes[current];
        if leaf.constraints.is_some() {
            self.flag_inconsistent("concluded where a draw was recorded");
            return;
        }
        leaf.conclusion = Some(Conclusion {
            status: result.status,
            origin: result.origin.clone(),
        });
        self.propagate_exhaustion(current);
    }

    fn node_is_exhausted(&self, index: usize) -> bool {
        let node = &self.nodes[index];
        if node.conclusion.is_some() {
            return true;
        }
        let Some(constraints) = &node.constraints else {
            return false;
        };
        let all_children_done = node.children.values().all(|&c| self.nodes[c].exhausted);
        if node.forced.is_some() {
            return !node.children.is_empty() && all_children_done;
        }
        match constraints.domain_size() {
            Some(size) => node.children.len() as u128 >= size && all_children_done,
            None => false,
        }
    }

    fn propagate_exhaustion(&mut self, mut index: usize) {
        while self.node_is_exhausted(index) {
            self.nodes[index].exhausted = true;
            match self.nodes[index].parent {
                Some(parent) => index = parent,
                None => return,
            }
        }
    }

    /// Predict the result of replaying `choices`, if the tree already knows it.
    pub fn simulate(&self, choices: &[ChoiceValue]) -> Option<Simulation> {
        let mut current = 0;
        let mut nodes = Vec::new();
        let mut position = 0;
        loop {
            let node = &self.nodes[current];
            if let Some(conclusion) = &node.conclusion {
                return Some(Simulation {
                    conclusion: conclusion.clone(),
                    nodes,
                });
            }
            let constraints = node.constraints.as_ref()?;
            let value = match (&node.forced, choices.get(position)) {
                (Some(forced), _) => forced.clone(),
                (None, Some(value)) if constraints.permits(value) => value.clone(),
                (None, Some(_)) => constraints.simplest(),
                (None, None) => {
                    return Some(Simulation {
                        conclusion: Conclusion {
                            status: Status::Overrun,
                            origin: None,
                        },
                        nodes,
                    })
                }
            };
            position += 1;
            current = *node.children.get(&value)?;
            nodes.push(ChoiceNode {
                value,
                constraints: constraints.clone(),
                was_forced: node.forced.is_some(),
            });
        }
    }

    fn untried_value(&self, index: usize, rng: &mut StdRng) -> Option<ChoiceValue> {
        let node = &self.nodes[index];
        let constraints = node.constraints.as_ref()?;
        if constraints.domain_size()? > MAX_ENUMERATED_DOMAIN {
            return None;
        }
        let candidates: Vec<ChoiceValue> = match constraints {
            Constraints::Boolean(_) => vec![ChoiceValue::Boolean(false), ChoiceValue::Boolean(true)],
            Constraints::Integer(c) => match (c.min_value, c.max_value) {
                (Some(lo), Some(hi)) => (lo..=hi).map(ChoiceValue::Integer).collect(),
                _ => return None,
            },
            _ => vec![constraints.simplest()],
        };
        let untried: Vec<ChoiceValue> = candidates
            .into_iter()
            .filter(|v| constraints.permits(v) && !node.children.contains_key(v))
            .collect();
        untried.choose(rng).cloned()
    }

    /// A prefix that no recorded path starts with, or `None` once the tree
    /// is exhausted.
    pub fn generate_novel_prefix(&self, rng: &mut StdRng) -> Option<Vec<ChoiceValue>> {
        if self.is_exhausted() {
            return None;
        }
        let mut provider = RandomProvider::from_rng(rng);
        let mut prefix = Vec::new();
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            let Some(constraints) = &node.constraints else {
                return Some(prefix);
            };

            if let Some(forced) = &node.forced {
                prefix.push(forced.clone());
                match node.children.get(forced) {
                    Some(&child) if !self.nodes[child].exhausted => current = child,
                    Some(_) => return None,
                    None => return Some(prefix),
                }
                continue;
            }

            let mut next = None;
            for _ in 0..8 {
                let value = draw_with(&mut provider, constraints).unwrap_or_else(|_| constraints.simplest());
                match node.children.get(&value) {
                    None => {
                        prefix.push(value);
                        return Some(prefix);
                    }
                    Some(&child) if !self.nodes[child].exhausted => {
                        next = Some((value, child));
                        break;
                    }
                    Some(_) => {}
                }
            }

            let (value, child) = match next {
                Some(found) => found,
                None => {
                    if let Some(value) = self.untried_value(current, rng) {
                        prefix.push(value);
                        return Some(prefix);
                    }
                    let mut open: Vec<(&ChoiceValue, usize)> = node
                        .children
                        .iter()
                        .filter(|(_, child)| !self.nodes[**child].exhausted)
                        .map(|(value, &child)| (value, child))
                        .collect();
                    open.sort_by_key(|(value, _)| constraints.key(value));
                    let (value, child) = open.choose(rng)?;
                    ((*value).clone(), *child)
                }
            };
            prefix.push(value);
            current = child;
        }
    }
}
