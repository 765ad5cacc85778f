//! Generator combinators.
//!
//! A [`Gen`] is an explicit, first-class value wrapping a draw function.
//! Every value it produces is drawn from the choice sequence inside a span
//! labelled by the generator, so the shrinker sees the structure of the
//! data rather than a flat list of choices.

use crate::choice::{CharIntervals, FloatConstraints, IntegerConstraints};
use crate::error::StopTest;
use crate::session::DrawSession;

/// Attempts a filtered generator makes before rejecting the trial.
const FILTER_ATTEMPTS: usize = 3;

/// Stable span label for a generator name. Never zero, which is reserved
/// for the top-level span.
pub fn label_for(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash.max(1)
}

type DrawFn<T> = Box<dyn Fn(&mut DrawSession<'_>) -> Result<T, StopTest>>;

/// A generator for test data of type `T`.
pub struct Gen<T> {
    label: u64,
    draw: DrawFn<T>,
}

impl<T> Gen<T> {
    /// Create a generator from a draw function. Its draws are grouped in a
    /// span labelled by `name`.
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut DrawSession<'_>) -> Result<T, StopTest> + 'static,
    {
        Gen {
            label: label_for(name),
            draw: Box::new(f),
        }
    }

    pub fn label(&self) -> u64 {
        self.label
    }

    /// Draw one value.
    pub fn draw(&self, session: &mut DrawSession<'_>) -> Result<T, StopTest> {
        session.start_span(self.label);
        let value = (self.draw)(session);
        session.stop_span(false);
        value
    }

    /// Create a generator that always produces the same value.
    pub fn constant(value: T) -> Self
    where
        T: Clone + 'static,
    {
        Gen::new("constant", move |_| Ok(value.clone()))
    }
}

impl<T> Gen<T>
where
    T: 'static,
{
    /// Map a function over the generated values.
    pub fn map<U, F>(self, f: F) -> Gen<U>
    where
        F: Fn(T) -> U + 'static,
    {
        Gen::new("map", move |s| self.draw(s).map(&f))
    }

    /// Bind for dependent generation.
    pub fn bind<U, F>(self, f: F) -> Gen<U>
    where
        F: Fn(T) -> Gen<U> + 'static,
        U: 'static,
    {
        Gen::new("bind", move |s| {
            let value = self.draw(s)?;
            f(value).draw(s)
        })
    }

    /// Keep only values satisfying `predicate`. After a few misses the
    /// trial is rejected.
    pub fn filter<F>(self, predicate: F) -> Gen<T>
    where
        F: Fn(&T) -> bool + 'static,
    {
        let attempt = label_for("filter.attempt");
        Gen::new("filter", move |s| {
            for _ in 0..FILTER_ATTEMPTS {
                s.start_span(attempt);
                let value = self.draw(s)?;
                if predicate(&value) {
                    s.stop_span(false);
                    return Ok(value);
                }
                s.stop_span(true);
            }
            s.assume(false)?;
            Err(StopTest::Rejected)
        })
    }

    /// Pick one of `gens`, shrinking towards the first.
    ///
    /// # Panics
    ///
    /// Panics if `gens` is empty.
    pub fn one_of(gens: Vec<Gen<T>>) -> Gen<T> {
        assert!(!gens.is_empty(), "one_of needs at least one generator");
        let last = gens.len() as i128 - 1;
        Gen::new("one_of", move |s| {
            let index = s.draw_integer(IntegerConstraints::bounded(0, last), None)?;
            gens[index as usize].draw(s)
        })
    }

    /// Lists of `element` with between `min_size` and `max_size` entries.
    ///
    /// Each element is preceded by a "more" boolean in its own span, so
    /// deleting a span deletes one element cleanly.
    pub fn vec_of(element: Gen<T>, min_size: usize, max_size: usize) -> Gen<Vec<T>> {
        let item = label_for("vec.element");
        let average = (min_size * 2).max(min_size + 5).min(max_size.max(min_size));
        let p_continue = 1.0 - 1.0 / (1.0 + average as f64);
        Gen::new("vec", move |s| {
            let mut values = Vec::new();
            loop {
                let forced = if values.len() < min_size {
                    Some(true)
                } else if values.len() >= max_size {
                    Some(false)
                } else {
                    None
                };
                s.start_span(item);
                if !s.draw_boolean(p_continue, forced)? {
                    s.stop_span(false);
                    return Ok(values);
                }
                values.push(element.draw(s)?);
                s.stop_span(false);
            }
        })
    }
}

impl<A, B> Gen<(A, B)>
where
    A: 'static,
    B: 'static,
{
    pub fn tuple_of(first: Gen<A>, second: Gen<B>) -> Self {
        Gen::new("tuple", move |s| Ok((first.draw(s)?, second.draw(s)?)))
    }
}

impl Gen<bool> {
    pub fn bool() -> Self {
        Gen::new("bool", |s| s.draw_boolean(0.5, None))
    }
}

impl Gen<i128> {
    /// Integers in `[min, max]`, shrinking towards zero when it is in range.
    pub fn int_range(min: i128, max: i128) -> Self {
        Gen::new("int_range", move |s| {
            s.draw_integer(IntegerConstraints::bounded(min, max), None)
        })
    }

    /// Integers of any size.
    pub fn integers() -> Self {
        Gen::new("integers", |s| s.draw_integer(IntegerConstraints::unbounded(), None))
    }
}

impl Gen<f64> {
    pub fn float_range(min: f64, max: f64) -> Self {
        Gen::new("float_range", move |s| {
            s.draw_float(FloatConstraints::bounded(min, max), None)
        })
    }
}

impl Gen<Vec<u8>> {
    pub fn bytes(min_size: usize, max_size: usize) -> Self {
        Gen::new("bytes", move |s| s.draw_bytes(min_size, max_size, None))
    }
}

impl Gen<String> {
    /// Strings over `alphabet`.
    pub fn string(alphabet: CharIntervals, min_size: usize, max_size: usize) -> Self {
        Gen::new("string", move |s| {
            s.draw_string(alphabet.clone(), min_size, max_size, None)
        })
    }

    pub fn ascii(max_size: usize) -> Self {
        Self::string(CharIntervals::ascii(), 0, max_size)
    }
}
