//! Raw tagged values and the strict typed decoder.
//!
//! Every named value inside a record carries a data tag from a small closed
//! set. Decoding maps the tag plus the raw native-endian payload into a
//! typed result, and it is strict: a numeric request must name the stored
//! tag exactly. No implicit coercions, no lossless widening.
//!
//! The one deliberate asymmetry is strings: the kernel stores them either as
//! an inline fixed-capacity character buffer or as an indirect
//! pointer/length string, and both satisfy a string request with identical
//! results.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{Error, Result};

/// Capacity of the inline character-buffer string encoding, in bytes.
pub const CHAR_BUF_LEN: usize = 16;

/// Data tag stored on a named value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTag {
    /// 32-bit signed integer.
    Int32,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit unsigned integer.
    UInt64,
    /// Inline fixed-capacity character buffer.
    Char,
    /// Indirect pointer/length string.
    String,
}

impl DataTag {
    /// Tag name for error messages.
    ///
    /// Both string encodings report `"string"`; callers cannot distinguish
    /// them and should not have to.
    pub fn name(&self) -> &'static str {
        match self {
            DataTag::Int32 => "int32",
            DataTag::UInt32 => "uint32",
            DataTag::Int64 => "int64",
            DataTag::UInt64 => "uint64",
            DataTag::Char | DataTag::String => "string",
        }
    }
}

/// Kind requested by a typed accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqKind {
    /// Requested via the `int32` accessor.
    Int32,
    /// Requested via the `uint32` accessor.
    UInt32,
    /// Requested via the `int64` accessor.
    Int64,
    /// Requested via the `uint64` accessor.
    UInt64,
    /// Requested via the `string` accessor.
    String,
}

impl ReqKind {
    /// Kind name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ReqKind::Int32 => "int32",
            ReqKind::UInt32 => "uint32",
            ReqKind::Int64 => "int64",
            ReqKind::UInt64 => "uint64",
            ReqKind::String => "string",
        }
    }
}

/// A raw tagged value as stored in a record's data section.
///
/// The payload is a native-endian image of the kernel value union; the
/// constructors below produce exactly the layout [`decode`] consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    tag: DataTag,
    bytes: Vec<u8>,
}

impl RawValue {
    /// A 32-bit signed value.
    pub fn int32(v: i32) -> Self {
        let mut bytes = vec![0u8; 4];
        NativeEndian::write_i32(&mut bytes, v);
        RawValue { tag: DataTag::Int32, bytes }
    }

    /// A 32-bit unsigned value.
    pub fn uint32(v: u32) -> Self {
        let mut bytes = vec![0u8; 4];
        NativeEndian::write_u32(&mut bytes, v);
        RawValue { tag: DataTag::UInt32, bytes }
    }

    /// A 64-bit signed value.
    pub fn int64(v: i64) -> Self {
        let mut bytes = vec![0u8; 8];
        NativeEndian::write_i64(&mut bytes, v);
        RawValue { tag: DataTag::Int64, bytes }
    }

    /// A 64-bit unsigned value.
    pub fn uint64(v: u64) -> Self {
        let mut bytes = vec![0u8; 8];
        NativeEndian::write_u64(&mut bytes, v);
        RawValue { tag: DataTag::UInt64, bytes }
    }

    /// An inline character-buffer string, truncated to the buffer capacity.
    pub fn char_buf(s: &str) -> Self {
        let mut bytes = vec![0u8; CHAR_BUF_LEN];
        let src = s.as_bytes();
        let len = src.len().min(CHAR_BUF_LEN - 1);
        bytes[..len].copy_from_slice(&src[..len]);
        RawValue { tag: DataTag::Char, bytes }
    }

    /// An indirect pointer/length string.
    pub fn string(s: &str) -> Self {
        RawValue {
            tag: DataTag::String,
            bytes: s.as_bytes().to_vec(),
        }
    }

    /// The stored data tag.
    pub fn tag(&self) -> DataTag {
        self.tag
    }

    /// The raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A decoded, strongly-typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// String, from either raw encoding.
    String(String),
}

fn mismatch(name: &str, requested: ReqKind, actual: DataTag) -> Error {
    Error::TypeMismatch {
        name: name.to_string(),
        requested: requested.name(),
        actual: actual.name(),
    }
}

/// Decode a raw tagged value as the requested kind.
///
/// Pure function of its inputs. Numeric requests require the stored tag to
/// equal the requested kind exactly; a string request accepts either string
/// encoding. Anything else fails with [`Error::TypeMismatch`] naming both
/// kinds; `name` is the value key, used only for diagnostics.
pub fn decode(name: &str, raw: &RawValue, requested: ReqKind) -> Result<TypedValue> {
    match (requested, raw.tag) {
        (ReqKind::Int32, DataTag::Int32) => {
            Ok(TypedValue::Int32(NativeEndian::read_i32(&raw.bytes)))
        }
        (ReqKind::UInt32, DataTag::UInt32) => {
            Ok(TypedValue::UInt32(NativeEndian::read_u32(&raw.bytes)))
        }
        (ReqKind::Int64, DataTag::Int64) => {
            Ok(TypedValue::Int64(NativeEndian::read_i64(&raw.bytes)))
        }
        (ReqKind::UInt64, DataTag::UInt64) => {
            Ok(TypedValue::UInt64(NativeEndian::read_u64(&raw.bytes)))
        }
        (ReqKind::String, DataTag::Char) => {
            let end = raw
                .bytes
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(raw.bytes.len());
            Ok(TypedValue::String(
                String::from_utf8_lossy(&raw.bytes[..end]).into_owned(),
            ))
        }
        (ReqKind::String, DataTag::String) => Ok(TypedValue::String(
            String::from_utf8_lossy(&raw.bytes).into_owned(),
        )),
        (requested, actual) => Err(mismatch(name, requested, actual)),
    }
}

pub(crate) fn decode_i32(name: &str, raw: &RawValue) -> Result<i32> {
    if raw.tag != DataTag::Int32 {
        return Err(mismatch(name, ReqKind::Int32, raw.tag));
    }
    Ok(NativeEndian::read_i32(&raw.bytes))
}

pub(crate) fn decode_u32(name: &str, raw: &RawValue) -> Result<u32> {
    if raw.tag != DataTag::UInt32 {
        return Err(mismatch(name, ReqKind::UInt32, raw.tag));
    }
    Ok(NativeEndian::read_u32(&raw.bytes))
}

pub(crate) fn decode_i64(name: &str, raw: &RawValue) -> Result<i64> {
    if raw.tag != DataTag::Int64 {
        return Err(mismatch(name, ReqKind::Int64, raw.tag));
    }
    Ok(NativeEndian::read_i64(&raw.bytes))
}

pub(crate) fn decode_u64(name: &str, raw: &RawValue) -> Result<u64> {
    if raw.tag != DataTag::UInt64 {
        return Err(mismatch(name, ReqKind::UInt64, raw.tag));
    }
    Ok(NativeEndian::read_u64(&raw.bytes))
}

pub(crate) fn decode_string(name: &str, raw: &RawValue) -> Result<String> {
    match decode(name, raw, ReqKind::String)? {
        TypedValue::String(v) => Ok(v),
        // decode() answers a string request only with the string variant.
        _ => Err(mismatch(name, ReqKind::String, raw.tag)),
    }
}
