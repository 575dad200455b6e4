//! # Encoding Module
//!
//! Wire-level encodings for the block stream:
//!
//! - **Varint encoding**: base-128 variable-length integers used for item
//!   length prefixes and explicit varint values
//! - **Item serialization**: the per-type fixed/variable-size strategy that
//!   the block writer and reader consult

pub mod serialize;
pub mod varint;

pub use serialize::{ItemReader, ItemSerialize, ItemWriter};
pub use varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
