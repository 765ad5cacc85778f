//! Adaptive integer searches shared by the shrink passes.

/// Largest `n` for which `f(n)` holds, assuming `f(0)` does and that `f` is
/// roughly monotone.
///
/// Probes small values one at a time, then doubles, then bisects, so the
/// cost is logarithmic in the answer rather than in the search space.
pub fn find_integer(mut f: impl FnMut(u128) -> bool) -> u128 {
    for i in 1..5 {
        if !f(i) {
            return i - 1;
        }
    }
    let mut lo: u128 = 4;
    let mut hi: u128 = 5;
    while f(hi) {
        lo = hi;
        hi = match hi.checked_mul(2) {
            Some(next) => next,
            None => return lo,
        };
    }
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if f(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

pub fn find_index(mut f: impl FnMut(usize) -> bool) -> usize {
    find_integer(|n| usize::try_from(n).map_or(false, &mut f)) as usize
}

/// [`find_index`] for a predicate that can fail.
pub fn try_find_index<E>(mut f: impl FnMut(usize) -> Result<bool, E>) -> Result<usize, E> {
    let mut error = None;
    let found = find_index(|n| {
        if error.is_some() {
            return false;
        }
        match f(n) {
            Ok(answer) => answer,
            Err(e) => {
                error = Some(e);
                false
            }
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(found),
    }
}

/// Drive a magnitude towards zero.
///
/// `accept(n)` tries a candidate of magnitude `n` and reports whether it
/// became the new current value. Only magnitudes below the current one are
/// ever proposed. Returns the final magnitude.
pub fn minimize_magnitude(start: u128, mut accept: impl FnMut(u128) -> bool) -> u128 {
    if start == 0 || accept(0) {
        return 0;
    }
    if start == 1 || accept(1) {
        return 1;
    }
    let mut current = start;
    loop {
        let before = current;

        let base = current;
        find_integer(|k| {
            if k >= 128 {
                return false;
            }
            let n = base >> k;
            if n == current {
                return true;
            }
            if n < current && accept(n) {
                current = n;
                return true;
            }
            false
        });

        let base = current;
        find_integer(|k| {
            if k > base {
                return false;
            }
            let n = base - k;
            if n == current {
                return true;
            }
            if n < current && accept(n) {
                current = n;
                return true;
            }
            false
        });

        if current == before {
            return current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_integer_finds_threshold() {
        for limit in [0u128, 1, 3, 4, 5, 17, 1000, 123_456_789] {
            assert_eq!(find_integer(|n| n <= limit), limit);
        }
    }

    #[test]
    fn test_find_integer_handles_always_true() {
        // Doubling from 5 stops at the last value before overflow.
        assert_eq!(find_integer(|_| true), 5u128 << 125);
    }

    #[test]
    fn test_find_integer_is_logarithmic() {
        let mut calls = 0;
        find_integer(|n| {
            calls += 1;
            n <= 1_000_000
        });
        assert!(calls < 60, "{} calls", calls);
    }

    #[test]
    fn test_try_find_index_propagates_errors() {
        let result: Result<usize, &str> = try_find_index(|n| if n < 3 { Ok(true) } else { Err("stop") });
        assert_eq!(result, Err("stop"));
        assert_eq!(try_find_index::<()>(|n| Ok(n < 7)), Ok(6));
    }

    #[test]
    fn test_minimize_magnitude_reaches_threshold() {
        let mut current = 3_847_592u128;
        let result = minimize_magnitude(current, |n| {
            if n >= 10_000 && n < current {
                current = n;
                true
            } else {
                false
            }
        });
        assert_eq!(result, 10_000);
    }

    #[test]
    fn test_minimize_magnitude_short_circuits_to_zero() {
        let mut calls = 0;
        assert_eq!(
            minimize_magnitude(99, |_| {
                calls += 1;
                true
            }),
            0
        );
        assert_eq!(calls, 1);
    }
}
