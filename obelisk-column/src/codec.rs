//! Binary encoding of single dynamic scalar values.

use obelisk_common::{verify_data, Error, Result};

use crate::{dynamic::DynamicColumn, value::Scalar};

/// Stateless codec packing one [`Scalar`] into bytes and back.
///
/// The encoding is a tag byte followed by the payload: fixed-width values
/// are stored with native endianness and size, variable-length values carry
/// a `u64` length prefix. Null encodes to the single tag byte. The format
/// matches the width conventions of the arena row codec, so shared-data
/// values and arena dynamic entries are interchangeable byte-for-byte.
pub struct ValueCodec;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT64: u8 = 2;
const TAG_UINT64: u8 = 3;
const TAG_FLOAT64: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BINARY: u8 = 6;

impl ValueCodec {
    /// Appends the encoding of `value` to `out`.
    pub fn encode(value: &Scalar, out: &mut Vec<u8>) {
        match value {
            Scalar::Null => out.push(TAG_NULL),
            Scalar::Bool(v) => {
                out.push(TAG_BOOL);
                out.push(*v as u8);
            }
            Scalar::Int(v) => {
                out.push(TAG_INT64);
                out.extend_from_slice(&v.to_ne_bytes());
            }
            Scalar::UInt(v) => {
                out.push(TAG_UINT64);
                out.extend_from_slice(&v.to_ne_bytes());
            }
            Scalar::Float(v) => {
                out.push(TAG_FLOAT64);
                out.extend_from_slice(&v.to_ne_bytes());
            }
            Scalar::String(v) => {
                out.push(TAG_STRING);
                write_u64(out, v.len() as u64);
                out.extend_from_slice(v.as_bytes());
            }
            Scalar::Binary(v) => {
                out.push(TAG_BINARY);
                write_u64(out, v.len() as u64);
                out.extend_from_slice(v);
            }
        }
    }

    /// Appends the stored encoding of row `index` of a dynamic column.
    pub fn encode_at(column: &DynamicColumn, index: usize, out: &mut Vec<u8>) {
        out.extend_from_slice(column.encoded_at(index));
    }

    /// Decodes one value, advancing `input` past its encoding.
    pub fn decode(input: &mut &[u8]) -> Result<Scalar> {
        let tag = read_u8(input)?;
        match tag {
            TAG_NULL => Ok(Scalar::Null),
            TAG_BOOL => Ok(Scalar::Bool(read_u8(input)? != 0)),
            TAG_INT64 => Ok(Scalar::Int(read_u64(input)? as i64)),
            TAG_UINT64 => Ok(Scalar::UInt(read_u64(input)?)),
            TAG_FLOAT64 => Ok(Scalar::Float(f64::from_bits(read_u64(input)?))),
            TAG_STRING => {
                let len = read_u64(input)? as usize;
                let bytes = read_bytes(input, len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    Error::invalid_format("encoded value", "string payload is not valid utf-8")
                })?;
                Ok(Scalar::String(text.to_string()))
            }
            TAG_BINARY => {
                let len = read_u64(input)? as usize;
                Ok(Scalar::Binary(read_bytes(input, len)?.to_vec()))
            }
            _ => Err(Error::invalid_format(
                "encoded value",
                format!("unknown value tag {tag}"),
            )),
        }
    }

    /// Decodes one value and appends it to `column`, advancing `input`.
    pub fn decode_into(column: &mut DynamicColumn, input: &mut &[u8]) -> Result<()> {
        let value = Self::decode(input)?;
        column.push(&value);
        Ok(())
    }

    /// Returns `true` if `bytes` is exactly the encoding of null.
    #[inline]
    pub fn is_encoded_null(bytes: &[u8]) -> bool {
        bytes == [TAG_NULL]
    }

    /// Returns the canonical encoding of null.
    #[inline]
    pub fn encoded_null() -> &'static [u8] {
        &[TAG_NULL]
    }
}

#[inline]
pub(crate) fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_ne_bytes());
}

pub(crate) fn read_u8(input: &mut &[u8]) -> Result<u8> {
    verify_data!(input, !input.is_empty());
    let value = input[0];
    *input = &input[1..];
    Ok(value)
}

pub(crate) fn read_u64(input: &mut &[u8]) -> Result<u64> {
    verify_data!(input, input.len() >= 8);
    let (head, tail) = input.split_at(8);
    *input = tail;
    Ok(u64::from_ne_bytes(head.try_into().expect("8 bytes")))
}

pub(crate) fn read_bytes<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    verify_data!(input, input.len() >= len);
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}
