//! Reproduction blobs: a failing choice sequence as a pasteable string.
//!
//! Layout before base64 armour:
//!
//! ```text
//! [version: u8][flags: u8][raw length: u32 BE][sha-256(raw)[..4]][payload]
//! ```
//!
//! Bit 0 of `flags` marks a zlib-compressed payload.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::choice::ChoiceValue;
use crate::codec::{choices_from_bytes, choices_to_bytes};
use crate::error::BlobError;

pub const BLOB_VERSION: u8 = 1;

const FLAG_ZLIB: u8 = 0b1;
const HEADER_LEN: usize = 10;

fn checksum(raw: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(raw);
    [digest[0], digest[1], digest[2], digest[3]]
}

fn compress(raw: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(raw).ok()?;
    encoder.finish().ok()
}

/// Armour raw bytes as a blob.
pub fn encode_blob(raw: &[u8]) -> String {
    let (flags, payload) = match compress(raw) {
        Some(compressed) if compressed.len() < raw.len() => (FLAG_ZLIB, compressed),
        _ => (0, raw.to_vec()),
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(BLOB_VERSION);
    out.push(flags);
    out.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    out.extend_from_slice(&checksum(raw));
    out.extend_from_slice(&payload);
    STANDARD.encode(out)
}

/// Recover the raw bytes of a blob, verifying version, length and checksum.
pub fn decode_blob(blob: &str) -> Result<Vec<u8>, BlobError> {
    let bytes = STANDARD.decode(blob.trim())?;
    if bytes.len() < HEADER_LEN {
        return Err(BlobError::TooShort { len: bytes.len() });
    }
    if bytes[0] != BLOB_VERSION {
        return Err(BlobError::UnsupportedVersion {
            found: bytes[0],
            expected: BLOB_VERSION,
        });
    }
    let flags = bytes[1];
    if flags & !FLAG_ZLIB != 0 {
        return Err(BlobError::UnknownFlags { flags });
    }
    let declared = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    let expected_checksum = &bytes[6..10];
    let payload = &bytes[HEADER_LEN..];

    let raw = if flags & FLAG_ZLIB != 0 {
        let mut raw = Vec::with_capacity(declared);
        ZlibDecoder::new(payload)
            .take(declared as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(BlobError::Compression)?;
        raw
    } else {
        payload.to_vec()
    };

    if raw.len() != declared {
        return Err(BlobError::Length {
            declared,
            actual: raw.len(),
        });
    }
    if checksum(&raw) != expected_checksum {
        return Err(BlobError::Checksum);
    }
    Ok(raw)
}

/// Encode a failing choice sequence for reproduction.
pub fn encode_failure(choices: &[ChoiceValue]) -> String {
    encode_blob(&choices_to_bytes(choices))
}

/// Decode a blob produced by [`encode_failure`].
pub fn decode_failure(blob: &str) -> Result<Vec<ChoiceValue>, BlobError> {
    Ok(choices_from_bytes(&decode_blob(blob)?)?)
}
