//! Primitive providers: where the value of each choice comes from.
//!
//! The session never makes random decisions itself. It asks a provider, so
//! the same test code can be driven by a random source, by a recorded
//! sequence, or by an external backend.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::choice::{
    BooleanConstraints, BytesConstraints, ChoiceValue, Constraints, FloatConstraints,
    IntegerConstraints, StringConstraints,
};
use crate::error::ProviderExhausted;

/// How long a provider instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderLifetime {
    /// A fresh provider for every trial.
    TestCase,
    /// One provider for the whole run.
    TestFunction,
}

/// A source of primitive values.
pub trait PrimitiveProvider {
    fn lifetime(&self) -> ProviderLifetime {
        ProviderLifetime::TestCase
    }

    fn draw_boolean(&mut self, constraints: &BooleanConstraints) -> Result<bool, ProviderExhausted>;

    fn draw_integer(&mut self, constraints: &IntegerConstraints) -> Result<i128, ProviderExhausted>;

    fn draw_float(&mut self, constraints: &FloatConstraints) -> Result<f64, ProviderExhausted>;

    fn draw_string(&mut self, constraints: &StringConstraints) -> Result<String, ProviderExhausted>;

    fn draw_bytes(&mut self, constraints: &BytesConstraints) -> Result<Vec<u8>, ProviderExhausted>;

    /// Called when a forced value is recorded without asking the provider.
    fn skip_forced(&mut self) {}

    fn span_start(&mut self, _label: u64) {}

    fn span_end(&mut self, _discard: bool) {}

    /// Index of the first replayed choice that did not fit its draw.
    fn misaligned_at(&self) -> Option<usize> {
        None
    }
}

/// Draw one value of whatever kind `constraints` describe.
pub fn draw_with(
    provider: &mut dyn PrimitiveProvider,
    constraints: &Constraints,
) -> Result<ChoiceValue, ProviderExhausted> {
    Ok(match constraints {
        Constraints::Boolean(c) => ChoiceValue::Boolean(provider.draw_boolean(c)?),
        Constraints::Integer(c) => ChoiceValue::Integer(provider.draw_integer(c)?),
        Constraints::Float(c) => ChoiceValue::Float(provider.draw_float(c)?),
        Constraints::String(c) => ChoiceValue::String(provider.draw_string(c)?),
        Constraints::Bytes(c) => ChoiceValue::Bytes(provider.draw_bytes(c)?),
    })
}

/// Builds providers for the runner.
#[derive(Clone)]
pub struct ProviderFactory {
    name: String,
    build: Arc<dyn Fn(u64) -> Box<dyn PrimitiveProvider> + Send + Sync>,
}

impl ProviderFactory {
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(u64) -> Box<dyn PrimitiveProvider> + Send + Sync + 'static,
    {
        ProviderFactory {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    pub fn random() -> Self {
        ProviderFactory::new("random", |seed| Box::new(RandomProvider::new(seed)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self, seed: u64) -> Box<dyn PrimitiveProvider> {
        (self.build)(seed)
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        ProviderFactory::random()
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory").field("name", &self.name).finish()
    }
}

const NASTY_FLOATS: &[f64] = &[
    0.0,
    0.5,
    1.1,
    1.5,
    1.9,
    1.0 / 3.0,
    10e6,
    10e-6,
    1.175494351e-38,
    2.2250738585072014e-308,
    1.7976931348623157e308,
    3.402823466e38,
    9007199254740992.0,
    1.0 - 10e-6,
    2.0 + 10e-6,
    1.192092896e-07,
    2.2204460492503131e-016,
    f64::INFINITY,
    f64::NAN,
    5e-324,
];

/// Draws values from a seeded pseudo-random stream.
///
/// Draws are biased towards boundary values and small magnitudes, which
/// is where bugs tend to live.
pub struct RandomProvider {
    rng: StdRng,
}

impl RandomProvider {
    pub fn new(seed: u64) -> Self {
        RandomProvider {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_rng(rng: &mut impl Rng) -> Self {
        RandomProvider::new(rng.gen())
    }

    fn draw_length(&mut self, min_size: usize, max_size: usize) -> usize {
        if max_size <= min_size {
            return min_size;
        }
        let average = (min_size * 2).max(min_size + 5).min(max_size) - min_size;
        let p_continue = 1.0 - 1.0 / (1.0 + average as f64);
        let mut len = min_size;
        while len < max_size && self.rng.gen_bool(p_continue) {
            len += 1;
        }
        len
    }

    fn uniform_between(&mut self, lo: i128, hi: i128) -> i128 {
        let span = hi.abs_diff(lo);
        let offset = if span == u128::MAX {
            self.rng.gen::<u128>()
        } else {
            self.rng.gen_range(0..=span)
        };
        lo.wrapping_add(offset as i128)
    }

    fn unbounded_near(&mut self, centre: i128) -> i128 {
        const WIDTHS: &[(u32, u32)] = &[(8, 8), (16, 8), (32, 2), (64, 2), (127, 1)];
        let width = WIDTHS
            .choose_weighted(&mut self.rng, |w| w.1)
            .map(|w| w.0)
            .unwrap_or(8);
        let magnitude = (self.rng.gen::<u128>() >> (128 - width)) as i128;
        let offset = if self.rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };
        centre.saturating_add(offset)
    }
}

impl PrimitiveProvider for RandomProvider {
    fn draw_boolean(&mut self, constraints: &BooleanConstraints) -> Result<bool, ProviderExhausted> {
        let value = self.rng.gen_bool(constraints.probability());
        Ok(if constraints.permits(value) {
            value
        } else {
            constraints.simplest()
        })
    }

    fn draw_integer(&mut self, c: &IntegerConstraints) -> Result<i128, ProviderExhausted> {
        if let Some(weights) = &c.weights {
            let roll: f64 = self.rng.gen();
            let mut total = 0.0;
            for &(value, weight) in weights {
                total += weight;
                if roll < total && c.permits(value) {
                    return Ok(value);
                }
            }
        }

        if self.rng.gen_ratio(1, 16) {
            let target = c.simplest();
            let mut nasty = vec![target, 0, 1, -1, target.saturating_add(1), target.saturating_sub(1)];
            nasty.extend(c.min_value);
            nasty.extend(c.max_value);
            nasty.retain(|&v| c.permits(v));
            if let Some(&value) = nasty.choose(&mut self.rng) {
                return Ok(value);
            }
        }

        let value = match (c.min_value, c.max_value) {
            (Some(lo), Some(hi)) => {
                if hi.abs_diff(lo) > 1 << 24 && self.rng.gen_bool(0.5) {
                    self.unbounded_near(c.simplest()).clamp(lo, hi)
                } else {
                    self.uniform_between(lo, hi)
                }
            }
            (Some(lo), None) => {
                let value = self.unbounded_near(c.simplest());
                if value < lo {
                    lo.saturating_add(lo.abs_diff(value).min(i128::MAX as u128) as i128)
                } else {
                    value
                }
            }
            (None, Some(hi)) => {
                let value = self.unbounded_near(c.simplest());
                if value > hi {
                    hi.saturating_sub(value.abs_diff(hi).min(i128::MAX as u128) as i128)
                } else {
                    value
                }
            }
            (None, None) => self.unbounded_near(c.shrink_towards),
        };
        Ok(if c.permits(value) { value } else { c.simplest() })
    }

    fn draw_float(&mut self, c: &FloatConstraints) -> Result<f64, ProviderExhausted> {
        if self.rng.gen_ratio(1, 8) {
            let mut nasty: Vec<f64> = NASTY_FLOATS
                .iter()
                .flat_map(|&f| [f, -f])
                .chain([c.min_value, c.max_value])
                .filter(|&f| c.permits(f))
                .collect();
            nasty.dedup_by(|a, b| a.to_bits() == b.to_bits());
            if let Some(&value) = nasty.choose(&mut self.rng) {
                return Ok(value);
            }
        }
        let range = c.max_value - c.min_value;
        let value = if range.is_finite() && self.rng.gen_bool(0.5) {
            c.min_value + range * self.rng.gen::<f64>()
        } else if self.rng.gen_bool(0.5) {
            let magnitude = self.rng.gen_range(0..1_000) as f64 / self.rng.gen_range(1..100) as f64;
            if self.rng.gen_bool(0.5) {
                magnitude
            } else {
                -magnitude
            }
        } else {
            f64::from_bits(self.rng.gen())
        };
        Ok(c.clamp(value))
    }

    fn draw_string(&mut self, c: &StringConstraints) -> Result<String, ProviderExhausted> {
        if c.intervals.is_empty() {
            return Ok(String::new());
        }
        let len = self.draw_length(c.min_size, c.max_size);
        let size = c.intervals.len();
        let mut out = String::with_capacity(len);
        for _ in 0..len {
            let index = if size > 256 && self.rng.gen_bool(0.5) {
                self.rng.gen_range(0..128)
            } else {
                self.rng.gen_range(0..size)
            };
            if let Some(ch) = c.intervals.char_at(index) {
                out.push(ch);
            }
        }
        Ok(if c.permits(&out) { out } else { c.simplest() })
    }

    fn draw_bytes(&mut self, c: &BytesConstraints) -> Result<Vec<u8>, ProviderExhausted> {
        let len = self.draw_length(c.min_size, c.max_size);
        let mut out = vec![0u8; len];
        self.rng.fill(&mut out[..]);
        Ok(out)
    }
}

/// Replays a recorded choice sequence.
///
/// A recorded value that no longer fits the draw (wrong kind or outside the
/// constraints) is replaced by the simplest permitted value and the
/// position is remembered. When the prefix runs out, draws go to the
/// fallback provider, or fail if there is none.
pub struct ReplayProvider<'a> {
    prefix: &'a [ChoiceValue],
    index: usize,
    fallback: Option<&'a mut dyn PrimitiveProvider>,
    misaligned_at: Option<usize>,
}

impl<'a> ReplayProvider<'a> {
    pub fn new(prefix: &'a [ChoiceValue]) -> Self {
        ReplayProvider {
            prefix,
            index: 0,
            fallback: None,
            misaligned_at: None,
        }
    }

    pub fn with_fallback(prefix: &'a [ChoiceValue], fallback: &'a mut dyn PrimitiveProvider) -> Self {
        ReplayProvider {
            prefix,
            index: 0,
            fallback: Some(fallback),
            misaligned_at: None,
        }
    }

    fn take(&mut self) -> Option<(usize, &'a ChoiceValue)> {
        let index = self.index;
        self.index += 1;
        self.prefix.get(index).map(|value| (index, value))
    }

    fn misaligned(&mut self, index: usize) {
        self.misaligned_at.get_or_insert(index);
    }

    fn fallback(&mut self) -> Result<&mut dyn PrimitiveProvider, ProviderExhausted> {
        match self.fallback.as_mut() {
            Some(provider) => Ok(&mut **provider),
            None => Err(ProviderExhausted),
        }
    }
}

impl PrimitiveProvider for ReplayProvider<'_> {
    fn draw_boolean(&mut self, c: &BooleanConstraints) -> Result<bool, ProviderExhausted> {
        match self.take() {
            Some((_, ChoiceValue::Boolean(v))) if c.permits(*v) => Ok(*v),
            Some((i, _)) => {
                self.misaligned(i);
                Ok(c.simplest())
            }
            None => self.fallback()?.draw_boolean(c),
        }
    }

    fn draw_integer(&mut self, c: &IntegerConstraints) -> Result<i128, ProviderExhausted> {
        match self.take() {
            Some((_, ChoiceValue::Integer(v))) if c.permits(*v) => Ok(*v),
            Some((i, _)) => {
                self.misaligned(i);
                Ok(c.simplest())
            }
            None => self.fallback()?.draw_integer(c),
        }
    }

    fn draw_float(&mut self, c: &FloatConstraints) -> Result<f64, ProviderExhausted> {
        match self.take() {
            Some((_, ChoiceValue::Float(v))) if c.permits(*v) => Ok(*v),
            Some((i, _)) => {
                self.misaligned(i);
                Ok(c.simplest())
            }
            None => self.fallback()?.draw_float(c),
        }
    }

    fn draw_string(&mut self, c: &StringConstraints) -> Result<String, ProviderExhausted> {
        match self.take() {
            Some((_, ChoiceValue::String(v))) if c.permits(v) => Ok(v.clone()),
            Some((i, _)) => {
                self.misaligned(i);
                Ok(c.simplest())
            }
            None => self.fallback()?.draw_string(c),
        }
    }

    fn draw_bytes(&mut self, c: &BytesConstraints) -> Result<Vec<u8>, ProviderExhausted> {
        match self.take() {
            Some((_, ChoiceValue::Bytes(v))) if c.permits(v) => Ok(v.clone()),
            Some((i, _)) => {
                self.misaligned(i);
                Ok(c.simplest())
            }
            None => self.fallback()?.draw_bytes(c),
        }
    }

    fn skip_forced(&mut self) {
        if self.take().is_none() {
            if let Some(provider) = self.fallback.as_mut() {
                provider.skip_forced();
            }
        }
    }

    fn span_start(&mut self, label: u64) {
        if let Some(provider) = self.fallback.as_mut() {
            provider.span_start(label);
        }
    }

    fn span_end(&mut self, discard: bool) {
        if let Some(provider) = self.fallback.as_mut() {
            provider.span_end(discard);
        }
    }

    fn misaligned_at(&self) -> Option<usize> {
        self.misaligned_at
    }
}
