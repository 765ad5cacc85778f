//! Reproduction blobs survive a round trip and reject damage loudly.

use conjecture::blob::{decode_blob, encode_blob, BLOB_VERSION};
use conjecture::*;

/// Bytes with no structure for zlib to exploit.
fn noise(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

#[test]
fn test_empty_buffer_round_trips() {
    assert_eq!(decode_blob(&encode_blob(&[])).unwrap(), Vec::<u8>::new());
    assert_eq!(decode_failure(&encode_failure(&[])).unwrap(), Vec::<ChoiceValue>::new());
}

#[test]
fn test_large_buffers_round_trip() {
    let random = noise(150_000);
    assert_eq!(decode_blob(&encode_blob(&random)).unwrap(), random);

    let repetitive: Vec<u8> = b"conjecture".iter().copied().cycle().take(200_000).collect();
    let blob = encode_blob(&repetitive);
    assert!(blob.len() < repetitive.len() / 10);
    assert_eq!(decode_blob(&blob).unwrap(), repetitive);
}

#[test]
fn test_every_choice_kind_round_trips() {
    let choices = vec![
        ChoiceValue::Boolean(true),
        ChoiceValue::Integer(-150),
        ChoiceValue::Integer(i128::MAX),
        ChoiceValue::Float(-0.0),
        ChoiceValue::Float(f64::INFINITY),
        ChoiceValue::String("héllo ☃".to_string()),
        ChoiceValue::Bytes(noise(300)),
    ];
    let decoded = decode_failure(&encode_failure(&choices)).unwrap();
    assert_eq!(decoded.len(), choices.len());
    for (a, b) in decoded.iter().zip(&choices) {
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.kind(), b.kind());
    }
    assert!(matches!(decoded[3], ChoiceValue::Float(f) if f == 0.0 && f.is_sign_negative()));
}

#[test]
fn test_future_version_is_rejected() {
    // Version 2 header followed by zeroes.
    let err = decode_blob("AgAAAAAAAAAAAAAA").unwrap_err();
    assert!(matches!(err, BlobError::UnsupportedVersion { found: 2, expected } if expected == BLOB_VERSION));
    assert!(err.to_string().contains("unsupported blob version 2"));
}

#[test]
fn test_damage_is_detected() {
    assert!(matches!(decode_blob("not base64!"), Err(BlobError::Base64(_))));
    assert!(matches!(decode_blob("AQA="), Err(BlobError::TooShort { .. })));

    let blob = encode_blob(b"some bytes to protect");
    let mut chars: Vec<char> = blob.chars().collect();
    let last = chars.len() - 3;
    chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
    let damaged: String = chars.into_iter().collect();
    assert!(matches!(
        decode_blob(&damaged),
        Err(BlobError::Checksum) | Err(BlobError::Base64(_))
    ));
}

#[test]
fn test_bad_blob_surfaces_as_error_report() {
    let report = run(
        &Gen::bool(),
        |_: &bool| true,
        Config::default().with_replay("AgAAAAAAAAAAAAAA"),
    );
    assert!(matches!(report, Report::Error { .. }), "{report}");
    assert!(report.to_string().contains("unsupported blob version"));
}
