//! Lexicographic encoding of non-negative floats.
//!
//! `float_to_lex` maps a float to a `u64` whose natural order is the
//! shrinking order: small integral values first, then values whose
//! fractional part needs fewer bits, then everything else. Infinity and NaN
//! sort last.

use std::sync::OnceLock;

const MAX_EXPONENT: u16 = 0x7ff;
const BIAS: i64 = 1023;
const MANTISSA_MASK: u64 = (1 << 52) - 1;
const SIMPLE_LIMIT: f64 = (1u64 << 56) as f64;

fn exponent_key(exponent: u16) -> u32 {
    if exponent == MAX_EXPONENT {
        return u32::MAX;
    }
    let unbiased = exponent as i64 - BIAS;
    if unbiased < 0 {
        (10_000 - unbiased) as u32
    } else {
        unbiased as u32
    }
}

struct ExponentTables {
    encoding: Vec<u16>,
    decoding: Vec<u16>,
}

fn tables() -> &'static ExponentTables {
    static TABLES: OnceLock<ExponentTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut encoding: Vec<u16> = (0..=MAX_EXPONENT).collect();
        encoding.sort_by_key(|&e| exponent_key(e));
        let mut decoding = vec![0u16; encoding.len()];
        for (i, &e) in encoding.iter().enumerate() {
            decoding[e as usize] = i as u16;
        }
        ExponentTables { encoding, decoding }
    })
}

fn reverse_bits(x: u64, n: u32) -> u64 {
    if n == 0 {
        0
    } else {
        x.reverse_bits() >> (64 - n)
    }
}

fn update_mantissa(unbiased_exponent: i64, mantissa: u64) -> u64 {
    if unbiased_exponent <= 0 {
        reverse_bits(mantissa, 52)
    } else if unbiased_exponent <= 51 {
        let fractional_bits = (52 - unbiased_exponent) as u32;
        let fractional = mantissa & ((1u64 << fractional_bits) - 1);
        (mantissa ^ fractional) | reverse_bits(fractional, fractional_bits)
    } else {
        mantissa
    }
}

/// Whether `f` is a non-negative-or-negative integral value small enough to
/// encode as itself.
pub fn is_simple(f: f64) -> bool {
    f.is_finite() && f.trunc() == f && f.abs() < SIMPLE_LIMIT
}

/// Encode a non-negative float. The sign bit is ignored.
pub fn float_to_lex(f: f64) -> u64 {
    let f = f.abs();
    if is_simple(f) {
        return f as u64;
    }
    let bits = f.to_bits() & ((1u64 << 63) - 1);
    let exponent = (bits >> 52) as u16;
    let mantissa = update_mantissa(exponent as i64 - BIAS, bits & MANTISSA_MASK);
    let encoded = tables().decoding[exponent as usize] as u64;
    (1u64 << 63) | (encoded << 52) | mantissa
}

/// Inverse of [`float_to_lex`].
pub fn lex_to_float(i: u64) -> f64 {
    if i >> 63 == 1 {
        let exponent = tables().encoding[((i >> 52) & 0x7ff) as usize];
        let mantissa = update_mantissa(exponent as i64 - BIAS, i & MANTISSA_MASK);
        f64::from_bits(((exponent as u64) << 52) | mantissa)
    } else {
        (i & ((1u64 << 56) - 1)) as f64
    }
}

/// Sign-aware `<=`: `-0.0` sorts strictly below `0.0`.
pub fn sign_aware_lte(a: f64, b: f64) -> bool {
    if a == 0.0 && b == 0.0 {
        a.is_sign_negative() || b.is_sign_positive()
    } else {
        a <= b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_values_encode_as_themselves() {
        for value in [0.0, 1.0, 2.0, 17.0, 1e10] {
            assert_eq!(float_to_lex(value), value as u64);
            assert_eq!(lex_to_float(value as u64), value);
        }
    }

    #[test]
    fn test_fractions_sort_after_integers() {
        assert!(float_to_lex(0.5) > float_to_lex(1e15));
        assert!(float_to_lex(1.5) < float_to_lex(1.25));
        assert!(float_to_lex(f64::INFINITY) > float_to_lex(f64::MAX));
        assert!(float_to_lex(f64::NAN) > float_to_lex(f64::INFINITY));
    }

    #[test]
    fn test_lex_inverts_for_awkward_values() {
        for value in [
            0.5,
            0.1,
            1.0 / 3.0,
            f64::MIN_POSITIVE,
            5e-324,
            f64::MAX,
            f64::INFINITY,
            (1u64 << 60) as f64,
            123456.789,
        ] {
            let back = lex_to_float(float_to_lex(value));
            assert_eq!(back.to_bits(), value.to_bits(), "value {}", value);
        }
    }

    #[test]
    fn test_exponent_tables_are_inverse() {
        let t = tables();
        for e in 0..=MAX_EXPONENT {
            assert_eq!(t.encoding[t.decoding[e as usize] as usize], e);
        }
    }

    #[test]
    fn test_sign_aware_lte_orders_zeros() {
        assert!(sign_aware_lte(-0.0, 0.0));
        assert!(!sign_aware_lte(0.0, -0.0));
        assert!(sign_aware_lte(1.0, 2.0));
    }
}
