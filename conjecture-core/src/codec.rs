//! Compact binary form of a choice sequence.
//!
//! Each choice starts with a header byte `tag << 5 | size`. A size of 31
//! means the real size follows as a ULEB128 varint. Booleans keep their
//! value in the size bits and carry no payload.

use crate::choice::ChoiceValue;
use crate::error::CodecError;

const TAG_BOOLEAN: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_BYTES: u8 = 3;
const TAG_STRING: u8 = 4;
const SIZE_ESCAPE: u8 = 0b11111;

fn push_uleb128(out: &mut Vec<u8>, mut value: usize) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Minimal big-endian two's complement bytes of `value`.
fn integer_bytes(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let sign = if value < 0 { 0xff } else { 0x00 };
    let mut start = 0;
    while start < bytes.len() - 1 && bytes[start] == sign && (bytes[start + 1] & 0x80) == (sign & 0x80) {
        start += 1;
    }
    bytes[start..].to_vec()
}

pub fn choices_to_bytes(choices: &[ChoiceValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for choice in choices {
        let (tag, payload) = match choice {
            ChoiceValue::Boolean(v) => {
                out.push(*v as u8);
                continue;
            }
            ChoiceValue::Float(v) => (TAG_FLOAT, v.to_bits().to_be_bytes().to_vec()),
            ChoiceValue::Integer(v) => (TAG_INTEGER, integer_bytes(*v)),
            ChoiceValue::Bytes(v) => (TAG_BYTES, v.clone()),
            ChoiceValue::String(v) => (TAG_STRING, v.as_bytes().to_vec()),
        };
        if payload.len() < SIZE_ESCAPE as usize {
            out.push(tag << 5 | payload.len() as u8);
        } else {
            out.push(tag << 5 | SIZE_ESCAPE);
            push_uleb128(&mut out, payload.len());
        }
        out.extend_from_slice(&payload);
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, CodecError> {
        let byte = *self.bytes.get(self.offset).ok_or(CodecError::Truncated { offset: self.offset })?;
        self.offset += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::Truncated { offset: self.offset })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn uleb128(&mut self) -> Result<usize, CodecError> {
        let start = self.offset;
        let mut value: usize = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.byte()?;
            let chunk = (byte & 0x7f) as usize;
            if shift >= usize::BITS || (chunk << shift) >> shift != chunk {
                return Err(CodecError::LengthOverflow { offset: start });
            }
            value |= chunk << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }
}

pub fn choices_from_bytes(bytes: &[u8]) -> Result<Vec<ChoiceValue>, CodecError> {
    let mut reader = Reader { bytes, offset: 0 };
    let mut out = Vec::new();
    while reader.offset < bytes.len() {
        let offset = reader.offset;
        let header = reader.byte()?;
        let tag = header >> 5;
        let mut size = (header & SIZE_ESCAPE) as usize;
        if tag == TAG_BOOLEAN {
            match size {
                0 => out.push(ChoiceValue::Boolean(false)),
                1 => out.push(ChoiceValue::Boolean(true)),
                _ => return Err(CodecError::InvalidBoolean { value: header, offset }),
            }
            continue;
        }
        if size == SIZE_ESCAPE as usize {
            size = reader.uleb128()?;
        }
        let payload = reader.take(size)?;
        let value = match tag {
            TAG_FLOAT => {
                let raw: [u8; 8] = payload
                    .try_into()
                    .map_err(|_| CodecError::InvalidFloat { size, offset })?;
                ChoiceValue::Float(f64::from_bits(u64::from_be_bytes(raw)))
            }
            TAG_INTEGER => {
                if size == 0 || size > 16 {
                    return Err(CodecError::IntegerTooLarge { size, offset });
                }
                let fill = if payload[0] & 0x80 != 0 { 0xff } else { 0x00 };
                let mut raw = [fill; 16];
                raw[16 - size..].copy_from_slice(payload);
                ChoiceValue::Integer(i128::from_be_bytes(raw))
            }
            TAG_BYTES => ChoiceValue::Bytes(payload.to_vec()),
            TAG_STRING => ChoiceValue::String(
                String::from_utf8(payload.to_vec()).map_err(|_| CodecError::InvalidUtf8 { offset })?,
            ),
            _ => return Err(CodecError::UnknownTag { tag, offset }),
        };
        out.push(value);
    }
    Ok(out)
}
