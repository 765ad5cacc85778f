use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::choice::{self, ChoiceNode, ChoiceValue, Constraints};
use crate::provider::{draw_with, RandomProvider};
use crate::session::{SessionResult, Status};
use crate::span::Span;

use super::search::{find_index, minimize_magnitude};
use super::Shrinker;

/// Random fills `collapse_irrelevant` tries per region.
const IRRELEVANCE_PROBES: usize = 3;

/// Later spans `lower_and_delete` pairs with each integer.
const LOWER_AND_DELETE_SPANS: usize = 32;

impl<F> Shrinker<F>
where
    F: FnMut(&[ChoiceValue]) -> SessionResult,
{
    fn span(&self, index: usize) -> Option<Span> {
        self.target.spans.get(index).cloned()
    }

    fn span_count(&self) -> usize {
        self.target.spans.len()
    }

    pub(super) fn delete_spans(&mut self) {
        let mut discarded: Vec<(usize, usize)> = self
            .target
            .spans
            .discarded()
            .filter(|s| !s.is_empty())
            .map(|s| (s.start, s.end))
            .collect();
        if !discarded.is_empty() {
            discarded.sort_unstable();
            let mut candidate = Vec::with_capacity(self.target.nodes.len());
            let mut cursor = 0;
            for (start, end) in discarded {
                if start >= cursor {
                    candidate.extend_from_slice(&self.target.nodes[cursor..start]);
                    cursor = end;
                } else {
                    cursor = cursor.max(end);
                }
            }
            candidate.extend_from_slice(&self.target.nodes[cursor..]);
            self.consider(candidate);
        }

        let mut i = self.span_count();
        while i > 1 {
            i -= 1;
            let Some(span) = self.span(i) else { continue };
            if span.is_empty() {
                continue;
            }
            let candidate = self.spliced(span.start, span.end, &[]);
            self.consider(candidate);
            i = i.min(self.span_count());
        }
    }

    pub(super) fn delete_sibling_runs(&mut self) {
        let mut parent = 0;
        while parent < self.span_count() {
            let mut j = 0;
            loop {
                let children: Vec<Span> = self
                    .target
                    .spans
                    .children(parent)
                    .iter()
                    .filter_map(|&c| self.target.spans.get(c).cloned())
                    .collect();
                if j + 1 >= children.len() {
                    break;
                }
                let snapshot = self.target.nodes.clone();
                let deleted = find_index(|k| {
                    if j + k > children.len() {
                        return false;
                    }
                    let start = children[j].start;
                    let end = children[j + k - 1].end;
                    let mut candidate = snapshot[..start].to_vec();
                    candidate.extend_from_slice(&snapshot[end..]);
                    self.consider(candidate)
                });
                if deleted == 0 {
                    j += 1;
                }
                if parent >= self.span_count() {
                    return;
                }
            }
            parent += 1;
        }
    }

    pub(super) fn zero_spans(&mut self) {
        let mut i = 1;
        while i < self.span_count() {
            if let Some(span) = self.span(i) {
                let region = &self.target.nodes[span.start..span.end];
                if region.iter().any(|n| !n.was_forced && !n.is_simplest()) {
                    let zeroed: Vec<ChoiceNode> = region.iter().map(simplest_node).collect();
                    let candidate = self.spliced(span.start, span.end, &zeroed);
                    self.consider(candidate);
                }
            }
            i += 1;
        }
    }

    pub(super) fn pass_to_descendant(&mut self) {
        let mut i = 1;
        while i < self.span_count() {
            let Some(span) = self.span(i) else { break };
            let mut descendants: Vec<Span> = self
                .target
                .spans
                .descendants(i)
                .into_iter()
                .filter_map(|d| self.target.spans.get(d).cloned())
                .filter(|d| d.label == span.label && d.len() < span.len())
                .collect();
            descendants.sort_by_key(Span::len);
            for d in descendants {
                let inner = self.target.nodes[d.start..d.end].to_vec();
                let candidate = self.spliced(span.start, span.end, &inner);
                if self.consider(candidate) {
                    break;
                }
            }
            i += 1;
        }
    }

    pub(super) fn minimize_choices(&mut self) {
        let mut i = 0;
        while i < self.target.nodes.len() {
            if self.exhausted() {
                return;
            }
            let node = &self.target.nodes[i];
            if !node.was_forced && !node.is_simplest() && !self.is_settled(i) {
                match node.value.clone() {
                    ChoiceValue::Boolean(_) => {
                        let simplest = node.constraints.simplest();
                        self.try_replace(i, simplest);
                    }
                    ChoiceValue::Integer(_) => self.minimize_integer(i),
                    ChoiceValue::Float(_) => self.minimize_float(i),
                    ChoiceValue::String(_) | ChoiceValue::Bytes(_) => self.minimize_collection(i),
                }
            }
            i += 1;
        }
    }

    fn integer_at(&self, index: usize) -> Option<(i128, i128)> {
        let node = self.target.nodes.get(index)?;
        match (&node.value, &node.constraints) {
            (ChoiceValue::Integer(v), Constraints::Integer(c)) => Some((*v, c.simplest())),
            _ => None,
        }
    }

    fn minimize_integer(&mut self, index: usize) {
        let Some((value, towards)) = self.integer_at(index) else {
            return;
        };
        if value < towards {
            if let Some(mirror) = towards.checked_add_unsigned(value.abs_diff(towards)) {
                self.try_replace(index, ChoiceValue::Integer(mirror));
            }
        }
        let Some((value, towards)) = self.integer_at(index) else {
            return;
        };
        let above = value > towards;
        minimize_magnitude(value.abs_diff(towards), |n| {
            let candidate = if above {
                towards.checked_add_unsigned(n)
            } else {
                towards.checked_sub_unsigned(n)
            };
            candidate.map_or(false, |v| self.try_replace(index, ChoiceValue::Integer(v)))
        });
    }

    fn float_at(&self, index: usize) -> Option<f64> {
        match self.target.nodes.get(index)?.value {
            ChoiceValue::Float(v) => Some(v),
            _ => None,
        }
    }

    fn minimize_float(&mut self, index: usize) {
        let Some(value) = self.float_at(index) else {
            return;
        };
        if !value.is_finite() {
            let simplest = self.target.nodes[index].constraints.simplest();
            if !self.try_replace(index, simplest) {
                self.try_replace(index, ChoiceValue::Float(f64::MAX.copysign(value)));
            }
        }
        if let Some(value) = self.float_at(index).filter(|v| v.is_sign_negative()) {
            self.try_replace(index, ChoiceValue::Float(-value));
        }
        if let Some(value) = self.float_at(index).filter(|v| v.is_finite() && !choice::float_is_integral(*v)) {
            for candidate in [value.trunc(), value.floor(), value.ceil()] {
                if self.try_replace(index, ChoiceValue::Float(candidate)) {
                    break;
                }
            }
        }
        if let Some(value) = self.float_at(index).filter(|v| v.is_finite() && !choice::float_is_integral(*v)) {
            for bits in 1..=16 {
                let scale = f64::from(1u32 << bits);
                if self.try_replace(index, ChoiceValue::Float((value * scale).trunc() / scale)) {
                    break;
                }
            }
        }
        if let Some(value) = self.float_at(index).filter(|v| choice::float_is_integral(*v)) {
            let sign = value;
            minimize_magnitude(value.abs() as u128, |n| {
                self.try_replace(index, ChoiceValue::Float((n as f64).copysign(sign)))
            });
        }
    }

    /// Element orders of a string or bytes choice.
    fn collection_at(&self, index: usize) -> Option<Vec<u32>> {
        let node = self.target.nodes.get(index)?;
        match (&node.value, &node.constraints) {
            (ChoiceValue::String(s), Constraints::String(c)) => Some(c.orders(s)),
            (ChoiceValue::Bytes(b), Constraints::Bytes(_)) => Some(b.iter().map(|&x| u32::from(x)).collect()),
            _ => None,
        }
    }

    fn collection_value(&self, index: usize, orders: &[u32]) -> Option<ChoiceValue> {
        let node = self.target.nodes.get(index)?;
        match &node.constraints {
            Constraints::String(c) => orders
                .iter()
                .map(|&o| c.intervals.char_at(o))
                .collect::<Option<String>>()
                .map(ChoiceValue::String),
            Constraints::Bytes(_) => orders
                .iter()
                .map(|&o| u8::try_from(o).ok())
                .collect::<Option<Vec<u8>>>()
                .map(ChoiceValue::Bytes),
            _ => None,
        }
    }

    fn try_orders(&mut self, index: usize, orders: &[u32]) -> bool {
        match self.collection_value(index, orders) {
            Some(value) => self.try_replace(index, value),
            None => false,
        }
    }

    fn minimize_collection(&mut self, index: usize) {
        let Some(orders) = self.collection_at(index) else {
            return;
        };
        minimize_magnitude(orders.len() as u128, |n| self.try_orders(index, &orders[..n as usize]));

        let mut j = self.collection_at(index).map_or(0, |o| o.len());
        while j > 0 {
            j -= 1;
            let Some(mut orders) = self.collection_at(index) else {
                return;
            };
            if j < orders.len() {
                orders.remove(j);
                self.try_orders(index, &orders);
            }
        }

        let mut j = 0;
        while let Some(orders) = self.collection_at(index) {
            if j >= orders.len() {
                break;
            }
            minimize_magnitude(u128::from(orders[j]), |n| {
                let mut lowered = orders.clone();
                lowered[j] = n as u32;
                self.try_orders(index, &lowered)
            });
            j += 1;
        }

        if let Some(mut orders) = self.collection_at(index) {
            orders.sort_unstable();
            self.try_orders(index, &orders);
        }
    }

    pub(super) fn minimize_duplicates(&mut self) {
        let mut groups: BTreeMap<(i128, i128), Vec<usize>> = BTreeMap::new();
        for (i, node) in self.target.nodes.iter().enumerate() {
            if node.was_forced || node.is_simplest() {
                continue;
            }
            if let (ChoiceValue::Integer(v), Constraints::Integer(c)) = (&node.value, &node.constraints) {
                groups.entry((*v, c.simplest())).or_default().push(i);
            }
        }
        for ((value, towards), indices) in groups {
            if indices.len() < 2 || self.exhausted() {
                continue;
            }
            let above = value > towards;
            let snapshot = self.target.nodes.clone();
            minimize_magnitude(value.abs_diff(towards), |n| {
                let Some(v) = (if above {
                    towards.checked_add_unsigned(n)
                } else {
                    towards.checked_sub_unsigned(n)
                }) else {
                    return false;
                };
                let mut candidate = snapshot.clone();
                for &i in &indices {
                    match candidate[i].with_value(ChoiceValue::Integer(v)) {
                        Some(replaced) => candidate[i] = replaced,
                        None => return false,
                    }
                }
                self.consider(candidate)
            });
        }
    }

    /// Children of `parent` labelled `label`, if there are at least two.
    fn sibling_group(&self, parent: usize, label: u64) -> Option<Vec<Span>> {
        if parent >= self.span_count() {
            return None;
        }
        let group: Vec<Span> = self
            .target
            .spans
            .children(parent)
            .iter()
            .filter_map(|&c| self.target.spans.get(c))
            .filter(|s| s.label == label)
            .cloned()
            .collect();
        (group.len() > 1).then_some(group)
    }

    /// Rebuild the target with the node slices of `group` replaced, in order,
    /// by `slices`.
    fn with_slices(&self, group: &[Span], slices: &[Vec<ChoiceNode>]) -> Vec<ChoiceNode> {
        let nodes = &self.target.nodes;
        let mut out = Vec::with_capacity(nodes.len());
        let mut cursor = 0;
        for (span, slice) in group.iter().zip(slices) {
            out.extend_from_slice(&nodes[cursor..span.start]);
            out.extend_from_slice(slice);
            cursor = span.end;
        }
        out.extend_from_slice(&nodes[cursor..]);
        out
    }

    fn group_slices(&self, group: &[Span]) -> Vec<Vec<ChoiceNode>> {
        group
            .iter()
            .map(|s| self.target.nodes[s.start..s.end].to_vec())
            .collect()
    }

    pub(super) fn reorder_spans(&mut self) {
        let mut keys = Vec::new();
        for parent in 0..self.span_count() {
            for &c in self.target.spans.children(parent) {
                if let Some(span) = self.target.spans.get(c) {
                    if !keys.contains(&(parent, span.label)) {
                        keys.push((parent, span.label));
                    }
                }
            }
        }

        for (parent, label) in keys {
            if self.exhausted() {
                return;
            }
            let Some(group) = self.sibling_group(parent, label) else {
                continue;
            };
            let slices = self.group_slices(&group);
            let mut sorted = slices.clone();
            sorted.sort_by(|a, b| choice::compare_nodes(a, b));
            if sorted == slices {
                continue;
            }
            let candidate = self.with_slices(&group, &sorted);
            if self.consider(candidate) {
                continue;
            }

            // Sorting everything failed, so move one sibling at a time.
            let mut j = 0;
            while let Some(group) = self.sibling_group(parent, label) {
                if j + 1 >= group.len() || self.exhausted() {
                    break;
                }
                let mut slices = self.group_slices(&group);
                if choice::compare_nodes(&slices[j + 1], &slices[j]) == Ordering::Less {
                    slices.swap(j, j + 1);
                    let candidate = self.with_slices(&group, &slices);
                    if self.consider(candidate) {
                        j = j.saturating_sub(1);
                        continue;
                    }
                }
                j += 1;
            }
        }
    }

    pub(super) fn collapse_irrelevant(&mut self) {
        let mut i = 1;
        while i < self.span_count() {
            if self.exhausted() {
                return;
            }
            let Some(span) = self.span(i) else { break };
            i += 1;
            if span.is_empty() || self.settled.contains(&(span.start, span.end)) {
                continue;
            }
            let region: Vec<ChoiceNode> = self.target.nodes[span.start..span.end].to_vec();
            if region.iter().all(|n| n.was_forced || n.is_simplest()) {
                continue;
            }

            let mut valid = 0;
            let mut irrelevant = true;
            for _ in 0..IRRELEVANCE_PROBES {
                if self.exhausted() {
                    return;
                }
                let mut provider = RandomProvider::from_rng(&mut self.rng);
                let filled: Vec<ChoiceNode> = region
                    .iter()
                    .map(|n| {
                        if n.was_forced {
                            return n.clone();
                        }
                        let value = draw_with(&mut provider, &n.constraints).unwrap_or_else(|_| n.value.clone());
                        ChoiceNode { value, ..n.clone() }
                    })
                    .collect();
                let values = choice::values(&self.spliced(span.start, span.end, &filled));
                let result = self.execute(&values);
                if result.status >= Status::Valid {
                    valid += 1;
                    if !result.reproduces(&self.origin) {
                        irrelevant = false;
                        break;
                    }
                }
            }
            if !irrelevant || valid < 2 {
                continue;
            }
            let zeroed: Vec<ChoiceNode> = region.iter().map(simplest_node).collect();
            let candidate = self.spliced(span.start, span.end, &zeroed);
            if self.consider(candidate) && self.target.nodes.len() > span.start {
                let end = span.end.min(self.target.nodes.len());
                self.settled.insert((span.start, end));
            }
        }
    }

    pub(super) fn lower_and_delete(&mut self) {
        let mut i = 0;
        while i < self.target.nodes.len() {
            if self.exhausted() {
                return;
            }
            if let Some((value, towards)) = self.integer_at(i).filter(|_| !self.target.nodes[i].was_forced) {
                if value != towards {
                    let lowered = if value > towards { value - 1 } else { value + 1 };
                    let later: Vec<Span> = self
                        .target
                        .spans
                        .iter()
                        .filter(|s| s.start > i && !s.is_empty())
                        .take(LOWER_AND_DELETE_SPANS)
                        .cloned()
                        .collect();
                    if let Some(node) = self.target.nodes[i].with_value(ChoiceValue::Integer(lowered)) {
                        for span in later {
                            let mut candidate = self.spliced(span.start, span.end, &[]);
                            candidate[i] = node.clone();
                            if self.consider(candidate) {
                                break;
                            }
                        }
                    }
                }
            }
            i += 1;
        }
    }

    pub(super) fn redistribute_pairs(&mut self) {
        let integers: Vec<usize> = (0..self.target.nodes.len())
            .filter(|&i| self.integer_at(i).is_some() && !self.target.nodes[i].was_forced)
            .collect();
        for pair in integers.windows(2) {
            if self.exhausted() {
                return;
            }
            let (i, j) = (pair[0], pair[1]);
            let (Some((a, a_towards)), Some((b, _))) = (self.integer_at(i), self.integer_at(j)) else {
                continue;
            };
            if a == a_towards {
                continue;
            }
            let step: i128 = if a > a_towards { -1 } else { 1 };
            let room = a.abs_diff(a_towards);
            let snapshot = self.target.nodes.clone();
            find_index(|k| {
                let k = k as u128;
                if k > room {
                    return false;
                }
                let Ok(k) = i128::try_from(k) else { return false };
                let (Some(new_a), Some(new_b)) = (a.checked_add(step * k), b.checked_sub(step * k)) else {
                    return false;
                };
                let mut candidate = snapshot.clone();
                match (
                    candidate[i].with_value(ChoiceValue::Integer(new_a)),
                    candidate[j].with_value(ChoiceValue::Integer(new_b)),
                ) {
                    (Some(x), Some(y)) => {
                        candidate[i] = x;
                        candidate[j] = y;
                    }
                    _ => return false,
                }
                self.consider(candidate)
            });
        }
    }
}

fn simplest_node(node: &ChoiceNode) -> ChoiceNode {
    if node.was_forced {
        return node.clone();
    }
    ChoiceNode {
        value: node.constraints.simplest(),
        ..node.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::replay;
    use super::super::{Pass, ShrinkConfig, Shrinker};
    use crate::choice::{CharIntervals, ChoiceValue, FloatConstraints, IntegerConstraints};
    use crate::error::{DrawOutcome, StopTest};
    use crate::session::DrawSession;

    const ELEMENT: u64 = 7;

    /// A list of small integers, one span per element.
    fn list(s: &mut DrawSession<'_>) -> Result<Vec<i128>, StopTest> {
        let mut out = Vec::new();
        loop {
            s.start_span(ELEMENT);
            if !s.draw_boolean(0.5, None)? {
                s.stop_span(false);
                return Ok(out);
            }
            out.push(s.draw_integer(IntegerConstraints::bounded(0, 100), None)?);
            s.stop_span(false);
        }
    }

    fn adjacent_equal(s: &mut DrawSession<'_>) -> Result<DrawOutcome, StopTest> {
        let xs = list(s)?;
        Ok(DrawOutcome::check(!xs.windows(2).any(|w| w[0] == w[1]), "adjacent"))
    }

    fn encode_list(xs: &[i128]) -> Vec<ChoiceValue> {
        let mut out = Vec::new();
        for &x in xs {
            out.push(ChoiceValue::Boolean(true));
            out.push(ChoiceValue::Integer(x));
        }
        out.push(ChoiceValue::Boolean(false));
        out
    }

    fn shrink_with<B>(start: Vec<ChoiceValue>, body: B) -> Vec<ChoiceValue>
    where
        B: Fn(&mut DrawSession<'_>) -> Result<DrawOutcome, StopTest> + Copy,
    {
        let target = replay(&start, body);
        let mut shrinker = Shrinker::new(|c: &[ChoiceValue]| replay(c, body), target, ShrinkConfig::default());
        shrinker.shrink();
        shrinker.target().choices()
    }

    #[test]
    fn test_adjacent_duplicates_shrink_to_two_zeros() {
        let shrunk = shrink_with(encode_list(&[3, 17, 42, 42, 9, 5]), adjacent_equal);
        assert_eq!(shrunk, encode_list(&[0, 0]));
    }

    #[test]
    fn test_delete_spans_removes_irrelevant_elements() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let xs = list(s)?;
            Ok(DrawOutcome::check(!xs.contains(&13), "thirteen"))
        };
        let target = replay(&encode_list(&[1, 2, 13, 4]), body);
        let mut shrinker = Shrinker::new(|c: &[ChoiceValue]| replay(c, body), target, ShrinkConfig::default());
        shrinker.run_pass(Pass::DeleteSpans);
        assert_eq!(shrinker.target().choices(), encode_list(&[13]));
    }

    #[test]
    fn test_reorder_sorts_siblings() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let xs = list(s)?;
            Ok(DrawOutcome::check(xs.iter().sum::<i128>() < 30 || xs.len() < 3, "sum"))
        };
        let target = replay(&encode_list(&[20, 10, 5]), body);
        let mut shrinker = Shrinker::new(|c: &[ChoiceValue]| replay(c, body), target, ShrinkConfig::default());
        shrinker.run_pass(Pass::ReorderSpans);
        assert_eq!(shrinker.target().choices(), encode_list(&[5, 10, 20]));
    }

    #[test]
    fn test_floats_shrink_to_integral_boundary() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let x = s.draw_float(FloatConstraints::bounded(-1000.0, 1000.0), None)?;
            Ok(DrawOutcome::check(x < 1.5, "big float"))
        };
        let shrunk = shrink_with(vec![ChoiceValue::Float(712.390625)], body);
        assert_eq!(shrunk, vec![ChoiceValue::Float(2.0)]);
    }

    #[test]
    fn test_strings_shrink_in_length_and_content() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let text = s.draw_string(CharIntervals::ascii(), 0, 20, None)?;
            Ok(DrawOutcome::check(!text.contains('z'), "has z"))
        };
        let shrunk = shrink_with(vec![ChoiceValue::String("hello zebra".to_string())], body);
        assert_eq!(shrunk, vec![ChoiceValue::String("z".to_string())]);
    }

    #[test]
    fn test_bytes_shrink_to_minimal_pair() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let bytes = s.draw_bytes(0, 10, None)?;
            Ok(DrawOutcome::check(bytes.len() < 2, "long"))
        };
        let shrunk = shrink_with(vec![ChoiceValue::Bytes(vec![9, 200, 3, 77])], body);
        assert_eq!(shrunk, vec![ChoiceValue::Bytes(vec![0, 0])]);
    }

    #[test]
    fn test_length_prefixed_collections_shrink_with_lower_and_delete() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let n = s.draw_integer(IntegerConstraints::bounded(0, 10), None)?;
            let mut total = 0;
            for _ in 0..n {
                s.start_span(ELEMENT);
                total += s.draw_integer(IntegerConstraints::bounded(0, 100), None)?;
                s.stop_span(false);
            }
            Ok(DrawOutcome::check(total < 100, "total"))
        };
        let start = vec![
            ChoiceValue::Integer(3),
            ChoiceValue::Integer(60),
            ChoiceValue::Integer(5),
            ChoiceValue::Integer(60),
        ];
        let shrunk = shrink_with(start, body);
        assert_eq!(shrunk, vec![ChoiceValue::Integer(1), ChoiceValue::Integer(100)]);
    }

    #[test]
    fn test_redistribute_moves_magnitude_later() {
        let body = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let a = s.draw_integer(IntegerConstraints::bounded(0, 1000), None)?;
            let b = s.draw_integer(IntegerConstraints::bounded(0, 1000), None)?;
            Ok(DrawOutcome::check(a + b < 500, "sum"))
        };
        let target = replay(&[ChoiceValue::Integer(300), ChoiceValue::Integer(200)], body);
        let mut shrinker = Shrinker::new(|c: &[ChoiceValue]| replay(c, body), target, ShrinkConfig::default());
        shrinker.run_pass(Pass::RedistributePairs);
        assert_eq!(
            shrinker.target().choices(),
            vec![ChoiceValue::Integer(0), ChoiceValue::Integer(500)]
        );
    }
}
