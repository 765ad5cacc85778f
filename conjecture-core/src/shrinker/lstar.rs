//! Angluin's L* over byte strings.
//!
//! Counterexamples are processed the Rivest–Schapire way: a binary search
//! for the single position where the hypothesis and the target disagree,
//! which yields one new experiment per counterexample. Bytes are grouped
//! by an [`IntegerNormalizer`] so the learned alphabet stays small.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use super::search::try_find_index;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnError {
    #[error("membership query budget exhausted after {queries} queries")]
    Budget { queries: usize },

    #[error("counterexample produced no new distinction")]
    Stuck,
}

/// Maps bytes onto the smallest representative of their learned class.
///
/// Classes are contiguous ranges; each starts at a representative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerNormalizer {
    values: Vec<u8>,
}

impl Default for IntegerNormalizer {
    fn default() -> Self {
        IntegerNormalizer { values: vec![0] }
    }
}

impl IntegerNormalizer {
    pub fn representatives(&self) -> &[u8] {
        &self.values
    }

    pub fn normalize(&self, value: u8) -> u8 {
        match self.values.binary_search(&value) {
            Ok(_) => value,
            Err(i) => self.values[i - 1],
        }
    }

    /// Split the class of `value` if `test` tells it apart from the class
    /// representative. Returns whether the classes changed.
    pub fn distinguish<E>(
        &mut self,
        value: u8,
        mut test: impl FnMut(u8) -> Result<bool, E>,
    ) -> Result<bool, E> {
        let canonical = self.normalize(value);
        if canonical == value {
            return Ok(false);
        }
        let expected = test(value)?;
        if test(canonical)? == expected {
            return Ok(false);
        }
        let room = (value - canonical) as usize;
        let k = try_find_index(|k| {
            if k >= room {
                return Ok(false);
            }
            Ok(test(value - k as u8)? == expected)
        })?;
        let split = value - k as u8;
        if let Err(at) = self.values.binary_search(&split) {
            self.values.insert(at, split);
        }
        Ok(true)
    }
}

/// Learns a DFA for the language accepted by a membership function.
pub struct LStar<M> {
    member_fn: M,
    cache: HashMap<Vec<u8>, bool>,
    queries: usize,
    max_queries: usize,
    experiments: Vec<Vec<u8>>,
    normalizer: IntegerNormalizer,
    generation: u64,
    rows: HashMap<Vec<bool>, Vec<u8>>,
    canonical: HashMap<Vec<u8>, Vec<u8>>,
    labels: Vec<Vec<u8>>,
    label_index: HashMap<Vec<u8>, usize>,
    transitions: HashMap<(usize, u8), usize>,
}

impl<M> LStar<M>
where
    M: FnMut(&[u8]) -> bool,
{
    pub fn new(member_fn: M, max_queries: usize) -> Self {
        LStar {
            member_fn,
            cache: HashMap::new(),
            queries: 0,
            max_queries,
            experiments: vec![Vec::new()],
            normalizer: IntegerNormalizer::default(),
            generation: 0,
            rows: HashMap::new(),
            canonical: HashMap::new(),
            labels: Vec::new(),
            label_index: HashMap::new(),
            transitions: HashMap::new(),
        }
    }

    /// Membership queries that reached the underlying function.
    pub fn queries(&self) -> usize {
        self.queries
    }

    /// Bumped each time the hypothesis is thrown away.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn normalizer(&self) -> &IntegerNormalizer {
        &self.normalizer
    }

    pub fn member(&mut self, s: &[u8]) -> Result<bool, LearnError> {
        if let Some(&answer) = self.cache.get(s) {
            return Ok(answer);
        }
        if self.queries >= self.max_queries {
            return Err(LearnError::Budget {
                queries: self.queries,
            });
        }
        self.queries += 1;
        let answer = (self.member_fn)(s);
        self.cache.insert(s.to_vec(), answer);
        Ok(answer)
    }

    /// Whether `s` was already queried, and the recorded answer.
    pub fn recorded(&self, s: &[u8]) -> Option<bool> {
        self.cache.get(s).copied()
    }

    fn canonicalize(&mut self, s: &[u8]) -> Result<Vec<u8>, LearnError> {
        if let Some(found) = self.canonical.get(s) {
            return Ok(found.clone());
        }
        let experiments = self.experiments.clone();
        let mut row = Vec::with_capacity(experiments.len());
        for e in &experiments {
            let mut probe = s.to_vec();
            probe.extend_from_slice(e);
            row.push(self.member(&probe)?);
        }
        let found = self.rows.entry(row).or_insert_with(|| s.to_vec()).clone();
        self.canonical.insert(s.to_vec(), found.clone());
        Ok(found)
    }

    fn dfa_changed(&mut self) {
        self.generation += 1;
        self.rows.clear();
        self.canonical.clear();
        self.labels.clear();
        self.label_index.clear();
        self.transitions.clear();
    }

    fn state_for(&mut self, label: Vec<u8>) -> usize {
        if let Some(&i) = self.label_index.get(&label) {
            return i;
        }
        let i = self.labels.len();
        self.label_index.insert(label.clone(), i);
        self.labels.push(label);
        i
    }

    pub fn start(&mut self) -> Result<usize, LearnError> {
        if self.labels.is_empty() {
            let label = self.canonicalize(&[])?;
            self.state_for(label);
        }
        Ok(0)
    }

    pub fn transition(&mut self, state: usize, c: u8) -> Result<usize, LearnError> {
        let c = self.normalizer.normalize(c);
        if let Some(&next) = self.transitions.get(&(state, c)) {
            return Ok(next);
        }
        let mut label = self.labels[state].clone();
        label.push(c);
        let canonical = self.canonicalize(&label)?;
        let next = self.state_for(canonical);
        self.transitions.insert((state, c), next);
        Ok(next)
    }

    pub fn is_accepting(&mut self, state: usize) -> Result<bool, LearnError> {
        let label = self.labels[state].clone();
        self.member(&label)
    }

    /// Whether the current hypothesis accepts `s`.
    pub fn matches(&mut self, s: &[u8]) -> Result<bool, LearnError> {
        let mut state = self.start()?;
        for &c in s {
            state = self.transition(state, c)?;
        }
        self.is_accepting(state)
    }

    /// Refine the hypothesis until it classifies `s` correctly.
    pub fn learn(&mut self, s: &[u8]) -> Result<(), LearnError> {
        let correct = self.member(s)?;
        if self.matches(s)? == correct {
            return Ok(());
        }
        loop {
            let mut states = vec![self.start()?];
            let n = try_find_index(|n| {
                if n > s.len() {
                    return Ok(false);
                }
                while n >= states.len() {
                    let last = states[states.len() - 1];
                    let next = self.transition(last, s[states.len() - 1])?;
                    states.push(next);
                }
                let mut probe = self.labels[states[n]].clone();
                probe.extend_from_slice(&s[n..]);
                Ok(self.member(&probe)? == correct)
            })?;
            if n == s.len() {
                return Ok(());
            }

            let prefix = &s[..n];
            let suffix = &s[n + 1..];
            let mut normalizer = std::mem::take(&mut self.normalizer);
            let split = normalizer.distinguish(s[n], |x| {
                let mut probe = prefix.to_vec();
                probe.push(x);
                probe.extend_from_slice(suffix);
                self.member(&probe)
            });
            self.normalizer = normalizer;
            if split? {
                self.dfa_changed();
                continue;
            }

            if self.experiments.iter().any(|e| e.as_slice() == suffix) {
                return Err(LearnError::Stuck);
            }
            self.experiments.push(suffix.to_vec());
            self.dfa_changed();
        }
    }

    /// The shortlex-smallest string of at most `max_len` bytes the
    /// hypothesis accepts, built only from class representatives.
    pub fn shortest_accepted(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, LearnError> {
        let start = self.start()?;
        if self.is_accepting(start)? {
            return Ok(Some(Vec::new()));
        }
        let alphabet = self.normalizer.representatives().to_vec();
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, Vec::new())]);
        while let Some((state, path)) = queue.pop_front() {
            if path.len() >= max_len {
                continue;
            }
            for &c in &alphabet {
                let next = self.transition(state, c)?;
                if !seen.insert(next) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(c);
                if self.is_accepting(next)? {
                    return Ok(Some(extended));
                }
                queue.push_back((next, extended));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizer_splits_at_boundary() {
        let mut normalizer = IntegerNormalizer::default();
        let changed = normalizer.distinguish::<()>(200, |x| Ok(x >= 37)).unwrap();
        assert!(changed);
        assert_eq!(normalizer.representatives(), &[0, 37]);
        assert_eq!(normalizer.normalize(36), 0);
        assert_eq!(normalizer.normalize(250), 37);
        assert!(!normalizer.distinguish::<()>(100, |x| Ok(x >= 37)).unwrap());
    }

    #[test]
    fn test_learns_alphabet_threshold() {
        let mut lstar = LStar::new(|s: &[u8]| s.iter().filter(|&&b| b >= 10).count() == 1, 1000);
        lstar.learn(&[12]).unwrap();
        assert!(lstar.matches(&[12]).unwrap());
        assert_eq!(lstar.shortest_accepted(5).unwrap(), Some(vec![10]));
    }

    #[test]
    fn test_learns_length_language() {
        let mut lstar = LStar::new(|s: &[u8]| s.len() >= 2, 1000);
        lstar.learn(&[0, 0, 0]).unwrap();
        assert!(lstar.generation() > 0);
        assert_eq!(lstar.shortest_accepted(3).unwrap(), Some(vec![0, 0]));
    }

    #[test]
    fn test_budget_is_enforced() {
        let mut lstar = LStar::new(|_: &[u8]| true, 0);
        assert_eq!(lstar.learn(b"x"), Err(LearnError::Budget { queries: 0 }));
    }

    #[test]
    fn test_membership_is_cached() {
        let mut calls = 0;
        let mut lstar = LStar::new(
            |s: &[u8]| {
                calls += 1;
                s.is_empty()
            },
            10,
        );
        assert!(lstar.member(b"").unwrap());
        assert!(lstar.member(b"").unwrap());
        assert_eq!(lstar.queries(), 1);
        assert_eq!(lstar.recorded(b""), Some(true));
        drop(lstar);
        assert_eq!(calls, 1);
    }
}
