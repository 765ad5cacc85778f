//! Choice values, their constraints, and the simplicity order.
//!
//! Every random decision a test makes is a typed choice. The constraints a
//! choice was drawn under decide which values are permitted, which value is
//! simplest, and how any two values compare.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::floats::{float_to_lex, is_simple, sign_aware_lte};

/// Booleans with probability at or beyond this are treated as constant.
const BOOLEAN_EPSILON: f64 = 1.0 / (1u64 << 63) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChoiceKind {
    Boolean,
    Integer,
    Float,
    String,
    Bytes,
}

impl fmt::Display for ChoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChoiceKind::Boolean => "boolean",
            ChoiceKind::Integer => "integer",
            ChoiceKind::Float => "float",
            ChoiceKind::String => "string",
            ChoiceKind::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A single recorded choice.
#[derive(Debug, Clone)]
pub enum ChoiceValue {
    Boolean(bool),
    Integer(i128),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl ChoiceValue {
    pub fn kind(&self) -> ChoiceKind {
        match self {
            ChoiceValue::Boolean(_) => ChoiceKind::Boolean,
            ChoiceValue::Integer(_) => ChoiceKind::Integer,
            ChoiceValue::Float(_) => ChoiceKind::Float,
            ChoiceValue::String(_) => ChoiceKind::String,
            ChoiceValue::Bytes(_) => ChoiceKind::Bytes,
        }
    }
}

// Floats compare by bit pattern so NaN equals itself and -0.0 differs from 0.0.
impl PartialEq for ChoiceValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ChoiceValue::Boolean(a), ChoiceValue::Boolean(b)) => a == b,
            (ChoiceValue::Integer(a), ChoiceValue::Integer(b)) => a == b,
            (ChoiceValue::Float(a), ChoiceValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ChoiceValue::String(a), ChoiceValue::String(b)) => a == b,
            (ChoiceValue::Bytes(a), ChoiceValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ChoiceValue {}

impl Hash for ChoiceValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ChoiceValue::Boolean(v) => v.hash(state),
            ChoiceValue::Integer(v) => v.hash(state),
            ChoiceValue::Float(v) => v.to_bits().hash(state),
            ChoiceValue::String(v) => v.hash(state),
            ChoiceValue::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceValue::Boolean(v) => write!(f, "{}", v),
            ChoiceValue::Integer(v) => write!(f, "{}", v),
            ChoiceValue::Float(v) => write!(f, "{:?}", v),
            ChoiceValue::String(v) => write!(f, "{:?}", v),
            ChoiceValue::Bytes(v) => {
                write!(f, "b\"")?;
                for byte in v {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, "\"")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanConstraints {
    /// Probability of drawing `true`.
    pub p: f64,
}

impl BooleanConstraints {
    pub fn new(p: f64) -> Self {
        BooleanConstraints { p }.normalized()
    }

    /// `p` clamped into `[0, 1]`, with NaN read as never `true`.
    pub fn probability(&self) -> f64 {
        if self.p.is_nan() {
            0.0
        } else {
            self.p.clamp(0.0, 1.0)
        }
    }

    fn normalized(self) -> Self {
        BooleanConstraints { p: self.probability() }
    }

    fn only_false(&self) -> bool {
        self.probability() <= BOOLEAN_EPSILON
    }

    fn only_true(&self) -> bool {
        self.probability() >= 1.0 - BOOLEAN_EPSILON
    }

    pub fn permits(&self, value: bool) -> bool {
        if self.only_false() {
            !value
        } else if self.only_true() {
            value
        } else {
            true
        }
    }

    pub fn simplest(&self) -> bool {
        self.only_true()
    }

    fn index(&self, value: bool) -> u128 {
        if self.only_false() || self.only_true() {
            0
        } else {
            value as u128
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegerConstraints {
    pub min_value: Option<i128>,
    pub max_value: Option<i128>,
    /// Probabilities of specific values; the remaining mass is uniform.
    pub weights: Option<Vec<(i128, f64)>>,
    pub shrink_towards: i128,
}

impl IntegerConstraints {
    pub fn unbounded() -> Self {
        IntegerConstraints::default()
    }

    pub fn bounded(min_value: i128, max_value: i128) -> Self {
        IntegerConstraints {
            min_value: Some(min_value),
            max_value: Some(max_value),
            ..IntegerConstraints::default()
        }
    }

    pub fn with_min(mut self, min_value: i128) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn with_max(mut self, max_value: i128) -> Self {
        self.max_value = Some(max_value);
        self
    }

    pub fn with_shrink_towards(mut self, shrink_towards: i128) -> Self {
        self.shrink_towards = shrink_towards;
        self
    }

    pub fn with_weights(mut self, weights: Vec<(i128, f64)>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn permits(&self, value: i128) -> bool {
        self.min_value.map_or(true, |lo| value >= lo) && self.max_value.map_or(true, |hi| value <= hi)
    }

    /// `shrink_towards` clamped into the permitted range.
    pub fn simplest(&self) -> i128 {
        let mut target = self.shrink_towards;
        if let Some(lo) = self.min_value {
            target = target.max(lo);
        }
        if let Some(hi) = self.max_value {
            target = target.min(hi);
        }
        target
    }

    /// Position of `value` in the zig-zag order around the simplest value.
    ///
    /// Values above the target come before their mirror image below it.
    /// Once one side of the range runs out the other continues in order.
    pub fn index(&self, value: i128) -> u128 {
        let target = self.simplest();
        if value == target {
            return 0;
        }
        let below = self.min_value.map(|lo| target.abs_diff(lo));
        let above = self.max_value.map(|hi| hi.abs_diff(target));
        let distance = value.abs_diff(target);
        let (mirror_room, paired_offset) = if value > target {
            (below, 1)
        } else {
            (above, 0)
        };
        match mirror_room {
            Some(room) if distance > room => room.saturating_add(distance),
            _ => distance.saturating_mul(2).saturating_sub(paired_offset),
        }
    }

    fn domain_size(&self) -> Option<u128> {
        match (self.min_value, self.max_value) {
            (Some(lo), Some(hi)) => Some(hi.abs_diff(lo).saturating_add(1)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatConstraints {
    pub min_value: f64,
    pub max_value: f64,
    pub allow_nan: bool,
    /// Non-zero values closer to zero than this are not permitted.
    pub smallest_nonzero_magnitude: f64,
}

impl Default for FloatConstraints {
    fn default() -> Self {
        FloatConstraints {
            min_value: f64::NEG_INFINITY,
            max_value: f64::INFINITY,
            allow_nan: true,
            smallest_nonzero_magnitude: f64::from_bits(1),
        }
    }
}

impl FloatConstraints {
    pub fn bounded(min_value: f64, max_value: f64) -> Self {
        FloatConstraints {
            min_value,
            max_value,
            allow_nan: false,
            ..FloatConstraints::default()
        }
    }

    pub fn permits(&self, value: f64) -> bool {
        if value.is_nan() {
            return self.allow_nan;
        }
        if value != 0.0 && value.abs() < self.smallest_nonzero_magnitude {
            return false;
        }
        sign_aware_lte(self.min_value, value) && sign_aware_lte(value, self.max_value)
    }

    /// The permitted value that sorts first: zero if allowed, otherwise the
    /// smallest-magnitude integral value in range, otherwise the bound
    /// nearest zero.
    pub fn simplest(&self) -> f64 {
        if self.permits(0.0) {
            return 0.0;
        }
        if self.permits(-0.0) {
            return -0.0;
        }
        let candidate = if self.min_value > 0.0 {
            self.min_value.ceil()
        } else if self.max_value < 0.0 {
            self.max_value.floor()
        } else {
            self.smallest_nonzero_magnitude
        };
        if self.permits(candidate) {
            return candidate;
        }
        if self.min_value > 0.0 {
            self.min_value
        } else if self.max_value < 0.0 {
            self.max_value
        } else if self.permits(-candidate) {
            -candidate
        } else {
            f64::NAN
        }
    }

    pub fn index(&self, value: f64) -> u128 {
        let sign = value.is_sign_negative() as u128;
        (sign << 64) | float_to_lex(value) as u128
    }

    /// Map an arbitrary float onto a permitted one.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return if self.allow_nan { value } else { self.simplest() };
        }
        let mut value = value;
        if !(sign_aware_lte(self.min_value, value) && sign_aware_lte(value, self.max_value)) {
            let range = self.max_value - self.min_value;
            value = if range.is_finite() {
                let fraction = (value.to_bits() & ((1u64 << 52) - 1)) as f64 / ((1u64 << 52) - 1) as f64;
                self.min_value + range * fraction
            } else {
                value.max(self.min_value).min(self.max_value)
            };
        }
        if value != 0.0 && value.abs() < self.smallest_nonzero_magnitude {
            value = self.smallest_nonzero_magnitude.copysign(value);
            if !self.permits(value) {
                value = -value;
            }
        }
        if self.permits(value) {
            value
        } else {
            self.simplest()
        }
    }

    fn domain_size(&self) -> Option<u128> {
        if self.min_value == self.max_value && !self.allow_nan {
            Some(1)
        } else {
            None
        }
    }
}

/// A set of permitted characters as sorted, disjoint, inclusive code point
/// intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharIntervals {
    intervals: Vec<(u32, u32)>,
    size: u32,
}

impl CharIntervals {
    pub fn new(intervals: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut raw: Vec<(u32, u32)> = Vec::new();
        for (lo, hi) in intervals {
            let hi = hi.min(char::MAX as u32);
            if lo > hi {
                continue;
            }
            // Surrogates are not chars.
            if lo < 0xD800 && hi >= 0xD800 {
                raw.push((lo, 0xD7FF));
            }
            if hi > 0xDFFF && lo <= 0xDFFF {
                raw.push((0xE000, hi));
            }
            if hi < 0xD800 || lo > 0xDFFF {
                raw.push((lo, hi));
            }
        }
        raw.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(raw.len());
        for (lo, hi) in raw {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        let size = merged.iter().map(|(lo, hi)| hi - lo + 1).sum();
        CharIntervals {
            intervals: merged,
            size,
        }
    }

    pub fn ascii() -> Self {
        CharIntervals::new([(0, 127)])
    }

    pub fn full() -> Self {
        CharIntervals::new([(0, char::MAX as u32)])
    }

    pub fn from_chars(chars: &str) -> Self {
        CharIntervals::new(chars.chars().map(|c| (c as u32, c as u32)))
    }

    pub fn len(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn char_at(&self, mut index: u32) -> Option<char> {
        for &(lo, hi) in &self.intervals {
            let width = hi - lo + 1;
            if index < width {
                return char::from_u32(lo + index);
            }
            index -= width;
        }
        None
    }

    pub fn index_of(&self, c: char) -> Option<u32> {
        let code = c as u32;
        let mut offset = 0;
        for &(lo, hi) in &self.intervals {
            if code < lo {
                return None;
            }
            if code <= hi {
                return Some(offset + code - lo);
            }
            offset += hi - lo + 1;
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringConstraints {
    pub intervals: CharIntervals,
    pub min_size: usize,
    pub max_size: usize,
}

impl StringConstraints {
    pub fn new(intervals: CharIntervals, min_size: usize, max_size: usize) -> Self {
        StringConstraints {
            intervals,
            min_size,
            max_size,
        }
    }

    pub fn permits(&self, value: &str) -> bool {
        let len = value.chars().count();
        len >= self.min_size
            && len <= self.max_size
            && value.chars().all(|c| self.intervals.index_of(c).is_some())
    }

    pub fn simplest(&self) -> String {
        match self.intervals.char_at(0) {
            Some(c) => std::iter::repeat(c).take(self.min_size).collect(),
            None => String::new(),
        }
    }

    /// Per-character shrink order.
    pub fn orders(&self, value: &str) -> Vec<u32> {
        value
            .chars()
            .map(|c| self.intervals.index_of(c).unwrap_or(u32::MAX))
            .collect()
    }

    fn domain_size(&self) -> Option<u128> {
        if self.max_size == 0 || self.intervals.is_empty() {
            Some(1)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BytesConstraints {
    pub min_size: usize,
    pub max_size: usize,
}

impl BytesConstraints {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        BytesConstraints { min_size, max_size }
    }

    pub fn permits(&self, value: &[u8]) -> bool {
        value.len() >= self.min_size && value.len() <= self.max_size
    }

    pub fn simplest(&self) -> Vec<u8> {
        vec![0; self.min_size]
    }

    fn domain_size(&self) -> Option<u128> {
        if self.max_size == 0 {
            Some(1)
        } else {
            None
        }
    }
}

/// The constraints a choice was drawn under.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraints {
    Boolean(BooleanConstraints),
    Integer(IntegerConstraints),
    Float(FloatConstraints),
    String(StringConstraints),
    Bytes(BytesConstraints),
}

impl Constraints {
    pub fn kind(&self) -> ChoiceKind {
        match self {
            Constraints::Boolean(_) => ChoiceKind::Boolean,
            Constraints::Integer(_) => ChoiceKind::Integer,
            Constraints::Float(_) => ChoiceKind::Float,
            Constraints::String(_) => ChoiceKind::String,
            Constraints::Bytes(_) => ChoiceKind::Bytes,
        }
    }

    /// Whether `value` is of the right kind and satisfies these constraints.
    pub fn permits(&self, value: &ChoiceValue) -> bool {
        match (self, value) {
            (Constraints::Boolean(c), ChoiceValue::Boolean(v)) => c.permits(*v),
            (Constraints::Integer(c), ChoiceValue::Integer(v)) => c.permits(*v),
            (Constraints::Float(c), ChoiceValue::Float(v)) => c.permits(*v),
            (Constraints::String(c), ChoiceValue::String(v)) => c.permits(v),
            (Constraints::Bytes(c), ChoiceValue::Bytes(v)) => c.permits(v),
            _ => false,
        }
    }

    /// The permitted value with the smallest choice key.
    pub fn simplest(&self) -> ChoiceValue {
        match self {
            Constraints::Boolean(c) => ChoiceValue::Boolean(c.simplest()),
            Constraints::Integer(c) => ChoiceValue::Integer(c.simplest()),
            Constraints::Float(c) => ChoiceValue::Float(c.simplest()),
            Constraints::String(c) => ChoiceValue::String(c.simplest()),
            Constraints::Bytes(c) => ChoiceValue::Bytes(c.simplest()),
        }
    }

    /// Number of distinct permitted values, when that is small enough to
    /// be worth counting.
    pub fn domain_size(&self) -> Option<u128> {
        match self {
            Constraints::Boolean(c) => Some(if c.only_false() || c.only_true() { 1 } else { 2 }),
            Constraints::Integer(c) => c.domain_size(),
            Constraints::Float(c) => c.domain_size(),
            Constraints::String(c) => c.domain_size(),
            Constraints::Bytes(c) => c.domain_size(),
        }
    }

    /// Key of `value` in this choice's simplicity order.
    pub fn key(&self, value: &ChoiceValue) -> ChoiceKey {
        match (self, value) {
            (Constraints::Boolean(c), ChoiceValue::Boolean(v)) => ChoiceKey::Index(c.index(*v)),
            (Constraints::Integer(c), ChoiceValue::Integer(v)) => ChoiceKey::Index(c.index(*v)),
            (Constraints::Float(c), ChoiceValue::Float(v)) => ChoiceKey::Index(c.index(*v)),
            (Constraints::String(c), ChoiceValue::String(v)) => {
                let orders = c.orders(v);
                ChoiceKey::Collection(orders.len(), orders)
            }
            (Constraints::Bytes(_), ChoiceValue::Bytes(v)) => {
                ChoiceKey::Collection(v.len(), v.iter().map(|&b| b as u32).collect())
            }
            // A mismatched value can only arise from a corrupt record; sort it last.
            _ => ChoiceKey::Index(u128::MAX),
        }
    }
}

/// One choice as it was made during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceNode {
    pub value: ChoiceValue,
    pub constraints: Constraints,
    pub was_forced: bool,
}

impl ChoiceNode {
    pub fn key(&self) -> ChoiceKey {
        self.constraints.key(&self.value)
    }

    pub fn is_simplest(&self) -> bool {
        self.value == self.constraints.simplest()
    }

    /// A copy holding `value` instead, if the constraints permit it.
    pub fn with_value(&self, value: ChoiceValue) -> Option<ChoiceNode> {
        if self.constraints.permits(&value) {
            Some(ChoiceNode {
                value,
                constraints: self.constraints.clone(),
                was_forced: self.was_forced,
            })
        } else {
            None
        }
    }
}

/// Position of a single choice in its simplicity order.
///
/// Collections compare shortlex: length first, then element orders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChoiceKey {
    Index(u128),
    Collection(usize, Vec<u32>),
}

/// Total simplicity order over choice sequences: fewer choices first, then
/// the per-choice keys compared left to right.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(usize, Vec<ChoiceKey>);

impl SortKey {
    pub fn len(&self) -> usize {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

pub fn sort_key(nodes: &[ChoiceNode]) -> SortKey {
    SortKey(nodes.len(), nodes.iter().map(ChoiceNode::key).collect())
}

/// Compare two node sequences without building full keys.
pub fn compare_nodes(a: &[ChoiceNode], b: &[ChoiceNode]) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| {
            a.iter()
                .zip(b)
                .map(|(x, y)| x.key().cmp(&y.key()))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
}

pub fn values(nodes: &[ChoiceNode]) -> Vec<ChoiceValue> {
    nodes.iter().map(|n| n.value.clone()).collect()
}

/// Whether a float is an integer small enough to shrink as one.
pub fn float_is_integral(value: f64) -> bool {
    is_simple(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_keys(c: &IntegerConstraints, values: &[i128]) -> Vec<u128> {
        values.iter().map(|&v| c.index(v)).collect()
    }

    #[test]
    fn test_unbounded_integers_zigzag() {
        let c = IntegerConstraints::unbounded();
        assert_eq!(int_keys(&c, &[0, 1, -1, 2, -2]), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_bounded_integers_continue_on_remaining_side() {
        let c = IntegerConstraints::bounded(-1, 3);
        assert_eq!(int_keys(&c, &[0, 1, -1, 2, 3]), vec![0, 1, 2, 3, 4]);
        let c = IntegerConstraints::bounded(-3, 1);
        assert_eq!(int_keys(&c, &[0, 1, -1, -2, -3]), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shrink_towards_is_clamped() {
        let c = IntegerConstraints::bounded(5, 10).with_shrink_towards(0);
        assert_eq!(c.simplest(), 5);
        assert_eq!(int_keys(&c, &[5, 6, 7, 10]), vec![0, 1, 2, 5]);
    }

    #[test]
    fn test_extreme_integer_bounds_do_not_overflow() {
        let c = IntegerConstraints::bounded(i128::MIN, i128::MAX);
        assert!(c.index(i128::MIN) > c.index(i128::MAX - 1));
        assert_eq!(c.domain_size(), Some(u128::MAX));
    }

    #[test]
    fn test_boolean_probability_is_sanitized() {
        assert_eq!(BooleanConstraints::new(f64::NAN).p, 0.0);
        assert_eq!(BooleanConstraints::new(3.0).p, 1.0);
        assert_eq!(BooleanConstraints::new(-1.0).p, 0.0);
        let raw = BooleanConstraints { p: f64::NAN };
        assert_eq!(raw.probability(), 0.0);
        assert!(!raw.permits(true));
    }

    #[test]
    fn test_boolean_order_and_constants() {
        let c = BooleanConstraints::new(0.5);
        assert!(c.index(false) < c.index(true));
        let always = BooleanConstraints::new(1.0);
        assert!(always.simplest());
        assert!(!always.permits(false));
        assert_eq!(always.index(true), 0);
    }

    #[test]
    fn test_float_order_prefers_positive_integers() {
        let c = FloatConstraints::default();
        assert!(c.index(0.0) < c.index(1.0));
        assert!(c.index(1.0) < c.index(0.5));
        assert!(c.index(1.0) < c.index(-1.0));
        assert!(c.index(-0.0) > c.index(0.0));
    }

    #[test]
    fn test_float_permits_respects_signed_zero_and_magnitude() {
        let c = FloatConstraints {
            min_value: 0.0,
            max_value: 1.0,
            allow_nan: false,
            smallest_nonzero_magnitude: 0.25,
        };
        assert!(c.permits(0.0));
        assert!(!c.permits(-0.0));
        assert!(!c.permits(0.1));
        assert!(c.permits(0.3));
        assert!(!c.permits(f64::NAN));
    }

    #[test]
    fn test_float_simplest_and_clamp_stay_in_range() {
        let c = FloatConstraints::bounded(2.5, 7.25);
        assert_eq!(c.simplest(), 3.0);
        for raw in [0.0, -100.0, 1e300, f64::NAN, f64::INFINITY] {
            assert!(c.permits(c.clamp(raw)), "clamp({}) escaped", raw);
        }
    }

    #[test]
    fn test_char_intervals_skip_surrogates() {
        let full = CharIntervals::full();
        assert_eq!(full.len(), 0x110000 - 0x800);
        assert_eq!(full.index_of('\u{E000}'), Some(0xD800));
        assert_eq!(full.char_at(0xD800), Some('\u{E000}'));
        let abc = CharIntervals::from_chars("cab");
        assert_eq!(abc.len(), 3);
        assert_eq!(abc.char_at(0), Some('a'));
        assert_eq!(abc.index_of('z'), None);
    }

    #[test]
    fn test_collections_compare_shortlex() {
        let c = Constraints::Bytes(BytesConstraints::new(0, 10));
        let short = c.key(&ChoiceValue::Bytes(vec![255]));
        let long = c.key(&ChoiceValue::Bytes(vec![0, 0]));
        assert!(short < long);
    }

    #[test]
    fn test_sort_key_prefers_fewer_choices() {
        let int = Constraints::Integer(IntegerConstraints::unbounded());
        let node = |v| ChoiceNode {
            value: ChoiceValue::Integer(v),
            constraints: int.clone(),
            was_forced: false,
        };
        let short = vec![node(1000)];
        let long = vec![node(0), node(0)];
        assert!(sort_key(&short) < sort_key(&long));
        assert_eq!(compare_nodes(&short, &long), Ordering::Less);
        assert!(sort_key(&[node(1)]) < sort_key(&[node(-1)]));
    }

    #[test]
    fn test_float_values_hash_by_bits() {
        use std::collections::HashSet;
        let set: HashSet<ChoiceValue> = [
            ChoiceValue::Float(f64::NAN),
            ChoiceValue::Float(f64::NAN),
            ChoiceValue::Float(0.0),
            ChoiceValue::Float(-0.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 3);
    }
}
