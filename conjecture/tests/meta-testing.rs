//! Meta testing - using Conjecture to test Conjecture itself
//!
//! This module contains properties that validate the correctness of the
//! shrinker, the simplicity order, the byte codec and the example databases.

use conjecture::*;

#[path = "meta-testing/shrinking-properties.rs"]
mod shrinking_properties;

#[path = "meta-testing/ordering-properties.rs"]
mod ordering_properties;

#[path = "meta-testing/codec-properties.rs"]
mod codec_properties;

#[path = "meta-testing/database-properties.rs"]
mod database_properties;

/// Config for the outer property: few tests, no deadline, fixed seed.
fn meta_config() -> Config {
    Config::default()
        .with_tests(15)
        .with_seed(1234)
        .with_deadline(None)
}

/// Helper to generate choice values of every kind
fn arbitrary_choice() -> Gen<ChoiceValue> {
    Gen::one_of(vec![
        Gen::bool().map(ChoiceValue::Boolean),
        Gen::integers().map(ChoiceValue::Integer),
        Gen::float_range(-1e6, 1e6).map(ChoiceValue::Float),
        Gen::ascii(8).map(ChoiceValue::String),
        Gen::bytes(0, 8).map(ChoiceValue::Bytes),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_test_shrinks_to_threshold() {
        shrinking_properties::test_threshold_is_found_exactly();
    }

    #[test]
    fn meta_test_shrinking_is_idempotent() {
        shrinking_properties::test_minimal_examples_stay_put();
    }

    #[test]
    fn meta_test_shrinking_is_monotone() {
        shrinking_properties::test_history_strictly_decreases();
    }

    #[test]
    fn meta_test_integer_order() {
        ordering_properties::test_integers_order_by_distance();
    }

    #[test]
    fn meta_test_sort_key_is_total() {
        ordering_properties::test_sort_key_is_a_total_order();
    }

    #[test]
    fn meta_test_codec_round_trip() {
        codec_properties::test_choices_round_trip();
    }

    #[test]
    fn meta_test_codec_never_panics() {
        codec_properties::test_arbitrary_bytes_decode_or_fail();
    }

    #[test]
    fn meta_test_backends_agree() {
        database_properties::test_backends_agree_with_model();
    }
}
