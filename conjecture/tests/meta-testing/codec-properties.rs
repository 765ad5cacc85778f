//! Properties of the choice-sequence byte codec.

use crate::{arbitrary_choice, meta_config};
use conjecture::*;

/// Property: encoding then decoding a choice sequence is lossless
pub fn test_choices_round_trip() {
    let prop = for_all_named(Gen::vec_of(arbitrary_choice(), 0, 10), "choices", |choices| {
        choices_from_bytes(&choices_to_bytes(choices)).map_or(false, |decoded| decoded == *choices)
    });

    match prop.run(&meta_config().with_tests(100)) {
        Report::Pass { .. } => println!("✓ Codec round trip property passed"),
        result => panic!("Codec round trip property failed: {result}"),
    }
}

/// Property: arbitrary bytes either decode or fail cleanly, never panic
pub fn test_arbitrary_bytes_decode_or_fail() {
    let prop = for_all_named(Gen::bytes(0, 64), "bytes", |bytes| match choices_from_bytes(bytes) {
        Ok(choices) => choices_from_bytes(&choices_to_bytes(&choices)).map_or(false, |again| again == choices),
        Err(_) => true,
    });

    match prop.run(&meta_config().with_tests(300)) {
        Report::Pass { .. } => println!("✓ Codec robustness property passed"),
        result => panic!("Codec robustness property failed: {result}"),
    }
}
