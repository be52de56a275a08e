//! C1: TypedCodec — the tagged variable-size integer scheme used throughout
//! the binary record stream (§4.1).
//!
//! Every typed value starts with one byte: high nibble is the element count
//! `n` (0..14, or 15 meaning "read a size-prefixed element count"), low
//! nibble is the type tag. When `n == 15` a second typed value (always an
//! integer, count 1) follows carrying the real count. The payload is `n`
//! fixed-width elements in little-endian.

use crate::error::{BgtError, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const I8_MISSING: i8 = i8::MIN;
pub const I16_MISSING: i16 = i16::MIN;
pub const I32_MISSING: i32 = i32::MIN;
pub const I8_VECTOR_END: i8 = i8::MIN + 1;
pub const I16_VECTOR_END: i16 = i16::MIN + 1;
pub const I32_VECTOR_END: i32 = i32::MIN + 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum TypeKind {
    Missing = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Float32 = 5,
    Char = 7,
}

impl TypeKind {
    fn elem_size(self) -> usize {
        match self {
            TypeKind::Missing => 0,
            TypeKind::Int8 | TypeKind::Char => 1,
            TypeKind::Int16 => 2,
            TypeKind::Int32 | TypeKind::Float32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub num_elements: usize,
}

fn need(buf: &[u8], at: usize, n: usize) -> Result<()> {
    if buf.len() < at + n {
        Err(BgtError::Truncated {
            offset: at,
            expected: at + n - buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Decodes the one- (or two-) byte size/type header at the front of `buf`.
/// Returns `(n, kind, bytes_consumed)`.
pub fn decode_size_header(buf: &[u8]) -> Result<(usize, TypeKind, usize)> {
    need(buf, 0, 1)?;
    let byte = buf[0];
    let type_tag = byte & 0x0f;
    let kind = TypeKind::try_from_primitive(type_tag)
        .map_err(|_| BgtError::CorruptRecord(format!("unknown type tag {}", type_tag)))?;
    let raw_n = (byte >> 4) & 0x0f;
    if raw_n != 15 {
        Ok((raw_n as usize, kind, 1))
    } else {
        let (n, consumed) = decode_typed_integer(&buf[1..])?;
        if n < 0 {
            return Err(BgtError::CorruptRecord(
                "negative element count in size header".into(),
            ));
        }
        Ok((n as usize, kind, 1 + consumed))
    }
}

/// Decodes a single typed integer (count must be 1) and returns `(value, bytes_consumed)`.
pub fn decode_typed_integer(buf: &[u8]) -> Result<(i32, usize)> {
    let (n, kind, header_len) = decode_size_header(buf)?;
    if n != 1 {
        return Err(BgtError::CorruptRecord(format!(
            "expected a scalar typed integer, got count {}",
            n
        )));
    }
    let payload = &buf[header_len..];
    let (value, elem_len) = match kind {
        TypeKind::Int8 => {
            need(payload, 0, 1)?;
            let v = payload[0] as i8;
            (if v == I8_MISSING { I32_MISSING } else { v as i32 }, 1)
        }
        TypeKind::Int16 => {
            need(payload, 0, 2)?;
            let v = i16::from_le_bytes([payload[0], payload[1]]);
            (if v == I16_MISSING { I32_MISSING } else { v as i32 }, 2)
        }
        TypeKind::Int32 => {
            need(payload, 0, 4)?;
            let v = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
            (v, 4)
        }
        other => {
            return Err(BgtError::CorruptRecord(format!(
                "expected an integer type, got {:?}",
                other
            )))
        }
    };
    Ok((value, header_len + elem_len))
}

/// Encodes the size/type header for `n` elements of `kind`.
pub fn encode_size_header(out: &mut Vec<u8>, n: usize, kind: TypeKind) {
    if n < 15 {
        out.push(((n as u8) << 4) | u8::from(kind));
    } else {
        out.push((15 << 4) | u8::from(kind));
        encode_single_integer(out, n as i64);
    }
}

/// Picks the narrowest integer width that fits `x` (and its sentinel) and
/// appends a scalar typed integer.
pub fn encode_single_integer(out: &mut Vec<u8>, x: i64) {
    if x == i64::from(I32_MISSING) {
        encode_size_header(out, 1, TypeKind::Int8);
        out.push(I8_MISSING as u8);
    } else if x <= i64::from(i8::MAX) && x > i64::from(i8::MIN) {
        encode_size_header(out, 1, TypeKind::Int8);
        out.push(x as i8 as u8);
    } else if x <= i64::from(i16::MAX) && x > i64::from(i16::MIN) {
        encode_size_header(out, 1, TypeKind::Int16);
        out.extend_from_slice(&(x as i16).to_le_bytes());
    } else {
        encode_size_header(out, 1, TypeKind::Int32);
        out.extend_from_slice(&(x as i32).to_le_bytes());
    }
}

/// Decodes `n` fixed-width little-endian elements of `kind` from `buf`,
/// widening everything to `i32`. Used for FILTER ids and other typed-int
/// vectors that are not size-prefixed strings.
pub fn decode_typed_int_vec(buf: &[u8]) -> Result<(Vec<i32>, usize)> {
    let (n, kind, header_len) = decode_size_header(buf)?;
    if kind == TypeKind::Missing {
        return Ok((vec![], header_len));
    }
    let elem = kind.elem_size();
    need(buf, header_len, n * elem)?;
    let payload = &buf[header_len..];
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let v = match kind {
            TypeKind::Int8 => payload[i] as i8 as i32,
            TypeKind::Int16 => {
                i16::from_le_bytes([payload[i * 2], payload[i * 2 + 1]]) as i32
            }
            TypeKind::Int32 => i32::from_le_bytes([
                payload[i * 4],
                payload[i * 4 + 1],
                payload[i * 4 + 2],
                payload[i * 4 + 3],
            ]),
            other => {
                return Err(BgtError::CorruptRecord(format!(
                    "expected an integer vector type, got {:?}",
                    other
                )))
            }
        };
        out.push(v);
    }
    Ok((out, header_len + n * elem))
}

/// Decodes a size-prefixed string/char vector and returns `(bytes, consumed)`.
pub fn decode_typed_string(buf: &[u8]) -> Result<(Vec<u8>, usize)> {
    let (n, kind, header_len) = decode_size_header(buf)?;
    if kind != TypeKind::Char && kind != TypeKind::Missing {
        return Err(BgtError::CorruptRecord(format!(
            "expected a char/string type, got {:?}",
            kind
        )));
    }
    need(buf, header_len, n)?;
    Ok((buf[header_len..header_len + n].to_vec(), header_len + n))
}

pub fn encode_typed_string(out: &mut Vec<u8>, s: &[u8]) {
    encode_size_header(out, s.len(), TypeKind::Char);
    out.extend_from_slice(s);
}
