//! Self-describing wire values.
//!
//! The stream carries a sequence of tagged values. Three shapes exist:
//!
//! ```text
//! +------+                      nil (absent byte string)
//! | 0x00 |
//! +------+
//! +------+-----------------+    unsigned 64-bit integer
//! | 0x01 | u64 big-endian  |
//! +------+-----------------+
//! +------+----------+---------+ byte string (length may be zero)
//! | 0x02 | len: u32 | payload |
//! +------+----------+---------+
//! ```
//!
//! Nil is distinct from the empty byte string: nil terminates cursor streams
//! and answers missing values, while an empty byte string is a legitimate
//! stored value. Decoding is incremental: `parse_*` functions operate on a
//! borrowed view and report `Ok(None)` when the buffer does not yet hold a
//! complete value, consuming nothing; `decode_*` wrappers advance the real
//! buffer only once a whole value parsed.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Value tag for the nil sentinel.
pub const TAG_NIL: u8 = 0x00;

/// Value tag for an unsigned 64-bit integer.
pub const TAG_UINT: u8 = 0x01;

/// Value tag for a length-prefixed byte string.
pub const TAG_BYTES: u8 = 0x02;

/// Maximum length of a single byte string (16 MiB).
pub const MAX_BYTES_LEN: u32 = 16 * 1024 * 1024;

/// A decoded byte-string value: `None` is the nil sentinel, `Some` carries
/// the payload (possibly empty).
pub type ByteString = Option<Bytes>;

/// Appends an unsigned integer value.
pub fn put_uint(buf: &mut BytesMut, v: u64) {
    buf.put_u8(TAG_UINT);
    buf.put_u64(v);
}

/// Appends a byte-string value, or the nil sentinel for `None`.
pub fn put_bytes(buf: &mut BytesMut, v: Option<&[u8]>) {
    match v {
        Some(data) => {
            buf.put_u8(TAG_BYTES);
            buf.put_u32(data.len() as u32);
            buf.put_slice(data);
        }
        None => buf.put_u8(TAG_NIL),
    }
}

/// Appends the nil sentinel.
pub fn put_nil(buf: &mut BytesMut) {
    buf.put_u8(TAG_NIL);
}

/// Parses an unsigned integer from the front of `input`, advancing it on
/// success. Returns `Ok(None)` if more data is needed.
pub fn parse_uint(input: &mut &[u8]) -> Result<Option<u64>, ProtocolError> {
    if input.is_empty() {
        return Ok(None);
    }
    let tag = input[0];
    if tag != TAG_UINT {
        return Err(ProtocolError::ValueMismatch {
            expected: "uint",
            tag,
        });
    }
    if input.len() < 9 {
        return Ok(None);
    }
    input.advance(1);
    Ok(Some(input.get_u64()))
}

/// Parses a byte-string value (or nil) from the front of `input`, advancing
/// it on success. Returns `Ok(None)` if more data is needed.
pub fn parse_bytes(input: &mut &[u8]) -> Result<Option<ByteString>, ProtocolError> {
    if input.is_empty() {
        return Ok(None);
    }
    match input[0] {
        TAG_NIL => {
            input.advance(1);
            Ok(Some(None))
        }
        TAG_BYTES => {
            if input.len() < 5 {
                return Ok(None);
            }
            let len = u32::from_be_bytes([input[1], input[2], input[3], input[4]]);
            if len > MAX_BYTES_LEN {
                return Err(ProtocolError::BytesTooLarge {
                    len,
                    max: MAX_BYTES_LEN,
                });
            }
            let total = 5 + len as usize;
            if input.len() < total {
                return Ok(None);
            }
            input.advance(5);
            let data = Bytes::copy_from_slice(&input[..len as usize]);
            input.advance(len as usize);
            Ok(Some(Some(data)))
        }
        tag => Err(ProtocolError::ValueMismatch {
            expected: "bytes",
            tag,
        }),
    }
}

/// Decodes an unsigned integer from `buf`, consuming it only on success.
pub fn decode_uint(buf: &mut BytesMut) -> Result<Option<u64>, ProtocolError> {
    let mut view = &buf[..];
    match parse_uint(&mut view)? {
        Some(v) => {
            let consumed = buf.len() - view.len();
            buf.advance(consumed);
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

/// Decodes a byte-string value from `buf`, consuming it only on success.
pub fn decode_bytes(buf: &mut BytesMut) -> Result<Option<ByteString>, ProtocolError> {
    let mut view = &buf[..];
    match parse_bytes(&mut view)? {
        Some(v) => {
            let consumed = buf.len() - view.len();
            buf.advance(consumed);
            Ok(Some(v))
        }
        None => Ok(None),
    }
}
