//! # Variable-Length Integer Encoding
//!
//! Base-128 varint encoding used for item length prefixes and explicit
//! `put_varint` values in the block stream. This is the wire format the
//! cluster exchanges, so it is bit-exact and frozen.
//!
//! ## Encoding Format
//!
//! The value is split into 7-bit groups, least-significant group first. Every
//! byte except the last has the continuation bit `0x80` set:
//!
//! ```text
//! 0        -> 00
//! 127      -> 7F
//! 128      -> 80 01
//! 123456   -> C0 C4 07
//! u64::MAX -> FF FF FF FF FF FF FF FF FF 01   (10 bytes)
//! ```
//!
//! A `u64` therefore encodes in at most [`MAX_VARINT_LEN`] bytes. Values
//! below 128 encode in a single byte, which covers the common case of short
//! item length prefixes.
//!
//! ## Error Handling
//!
//! `decode_varint` reports a malformed-encoding error for a truncated buffer
//! or an encoding that runs past 10 bytes. Encoding cannot fail; the caller
//! provides a buffer of at least `MAX_VARINT_LEN` bytes.

use eyre::Result;

use crate::error::DataError;

/// Longest possible encoding of a `u64`: ceil(64 / 7) bytes.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies when varint-encoded.
pub fn varint_len(value: u64) -> usize {
    let mut value = value;
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encodes `value` into `buf`, returning the number of bytes written.
///
/// `buf` must hold at least `varint_len(value)` bytes.
pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    let mut value = value;
    let mut pos = 0;
    while value >= 0x80 {
        buf[pos] = (value as u8 & 0x7F) | 0x80;
        value >>= 7;
        pos += 1;
    }
    buf[pos] = value as u8;
    pos + 1
}

/// Decodes a varint from the front of `buf`, returning `(value, bytes_read)`.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (pos, &byte) in buf.iter().enumerate() {
        if pos >= MAX_VARINT_LEN {
            return Err(DataError::malformed("varint exceeds 10 bytes").into());
        }
        // the 10th byte may only contribute the final single bit
        if shift == 63 && byte > 1 {
            return Err(DataError::malformed("varint overflows u64").into());
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, pos + 1));
        }
        shift += 7;
    }
    Err(DataError::malformed("truncated varint").into())
}
