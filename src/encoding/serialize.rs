//! # Item Serialization Strategy
//!
//! Per-type encoding descriptors that drive both the block writer and the
//! block reader. Every item type reports, at compile time, whether its
//! encoded form has a fixed byte width:
//!
//! - **Fixed-size** values (scalars, pairs of fixed-size members) are written
//!   as raw little-endian bytes with no prefix. The reader can skip one by
//!   advancing a known width, which is what makes seeking by item index
//!   cheap.
//! - **Variable-size** values (strings, byte buffers, pairs with a variable
//!   member) are written as a varint byte length followed by the payload.
//!
//! Composition is recursive: a pair is fixed-size iff both members are, and
//! its width is the sum of the member widths. If either member is variable,
//! the whole pair is variable and the members are serialized independently in
//! sequence.
//!
//! ## Writer/Reader Decoupling
//!
//! Item types talk to the stream through the narrow [`ItemWriter`] and
//! [`ItemReader`] traits rather than the concrete block types, mirroring how
//! the record layer is kept independent of the pager in an embedded engine.
//! The scalar impls are generated by a macro over the
//! `zerocopy::little_endian` wrapper types so the on-wire layout is
//! independent of host endianness.

use eyre::Result;
use zerocopy::{FromBytes, IntoBytes};

use crate::error::DataError;

/// Byte-level output sink consumed by [`ItemSerialize::serialize`].
pub trait ItemWriter {
    /// Appends raw bytes to the stream.
    fn append(&mut self, bytes: &[u8]) -> Result<()>;

    /// Appends a base-128 varint.
    fn put_varint(&mut self, value: u64) -> Result<()>;
}

/// Byte-level input source consumed by [`ItemSerialize::deserialize`].
pub trait ItemReader {
    /// Fills `buf` with the next `buf.len()` bytes of the stream.
    fn read_bytes_into(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Decodes a base-128 varint.
    fn get_varint(&mut self) -> Result<u64>;

    /// Advances past `n` bytes without materializing them.
    fn skip_bytes(&mut self, n: usize) -> Result<()>;
}

/// A value that can be stored in and recovered from the block stream.
pub trait ItemSerialize: Sized {
    /// Whether the encoded form always occupies [`Self::FIXED_SIZE`] bytes.
    const IS_FIXED_SIZE: bool;

    /// Encoded width in bytes; 0 for variable-size types.
    const FIXED_SIZE: usize;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()>;

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self>;

    /// Advances `reader` past one encoded value without building it.
    fn skip<R: ItemReader + ?Sized>(reader: &mut R) -> Result<()> {
        if Self::IS_FIXED_SIZE {
            reader.skip_bytes(Self::FIXED_SIZE)
        } else {
            Self::deserialize(reader).map(|_| ())
        }
    }
}

/// A length prefix has been decoded, so running out of bytes inside the
/// payload is corruption, not a clean end of stream.
fn remap_exhausted(e: eyre::Report, msg: &str) -> eyre::Report {
    match e.downcast_ref::<DataError>() {
        Some(DataError::StreamExhausted) => DataError::malformed(msg.to_string()).into(),
        _ => e,
    }
}

macro_rules! le_scalar_serialize {
    ($($ty:ty => $le:ty),* $(,)?) => {$(
        impl ItemSerialize for $ty {
            const IS_FIXED_SIZE: bool = true;
            const FIXED_SIZE: usize = size_of::<$ty>();

            fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
                writer.append(<$le>::new(*self).as_bytes())
            }

            fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
                let mut buf = [0u8; size_of::<$ty>()];
                reader.read_bytes_into(&mut buf)?;
                let value = <$le>::read_from_bytes(&buf)
                    .map_err(|e| DataError::malformed(format!(
                        "failed to decode {}: {:?}", stringify!($ty), e)))?;
                Ok(value.get())
            }
        }
    )*};
}

le_scalar_serialize! {
    u16 => zerocopy::little_endian::U16,
    u32 => zerocopy::little_endian::U32,
    u64 => zerocopy::little_endian::U64,
    i16 => zerocopy::little_endian::I16,
    i32 => zerocopy::little_endian::I32,
    i64 => zerocopy::little_endian::I64,
    f32 => zerocopy::little_endian::F32,
    f64 => zerocopy::little_endian::F64,
}

impl ItemSerialize for u8 {
    const IS_FIXED_SIZE: bool = true;
    const FIXED_SIZE: usize = 1;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.append(&[*self])
    }

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 1];
        reader.read_bytes_into(&mut buf)?;
        Ok(buf[0])
    }
}

impl ItemSerialize for i8 {
    const IS_FIXED_SIZE: bool = true;
    const FIXED_SIZE: usize = 1;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.append(&[*self as u8])
    }

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 1];
        reader.read_bytes_into(&mut buf)?;
        Ok(buf[0] as i8)
    }
}

impl ItemSerialize for bool {
    const IS_FIXED_SIZE: bool = true;
    const FIXED_SIZE: usize = 1;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.append(&[u8::from(*self)])
    }

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 1];
        reader.read_bytes_into(&mut buf)?;
        match buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DataError::malformed(format!("invalid bool byte: {:#04x}", other)).into()),
        }
    }
}

impl ItemSerialize for String {
    const IS_FIXED_SIZE: bool = false;
    const FIXED_SIZE: usize = 0;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.put_varint(self.len() as u64)?;
        writer.append(self.as_bytes())
    }

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let len = reader.get_varint()? as usize;
        let mut buf = vec![0u8; len];
        reader
            .read_bytes_into(&mut buf)
            .map_err(|e| remap_exhausted(e, "string payload shorter than its length prefix"))?;
        String::from_utf8(buf)
            .map_err(|e| DataError::malformed(format!("string is not valid utf-8: {}", e)).into())
    }

    fn skip<R: ItemReader + ?Sized>(reader: &mut R) -> Result<()> {
        let len = reader.get_varint()? as usize;
        reader
            .skip_bytes(len)
            .map_err(|e| remap_exhausted(e, "string payload shorter than its length prefix"))
    }
}

impl ItemSerialize for Vec<u8> {
    const IS_FIXED_SIZE: bool = false;
    const FIXED_SIZE: usize = 0;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.put_varint(self.len() as u64)?;
        writer.append(self)
    }

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let len = reader.get_varint()? as usize;
        let mut buf = vec![0u8; len];
        reader
            .read_bytes_into(&mut buf)
            .map_err(|e| remap_exhausted(e, "buffer payload shorter than its length prefix"))?;
        Ok(buf)
    }

    fn skip<R: ItemReader + ?Sized>(reader: &mut R) -> Result<()> {
        let len = reader.get_varint()? as usize;
        reader
            .skip_bytes(len)
            .map_err(|e| remap_exhausted(e, "buffer payload shorter than its length prefix"))
    }
}

impl<A: ItemSerialize, B: ItemSerialize> ItemSerialize for (A, B) {
    const IS_FIXED_SIZE: bool = A::IS_FIXED_SIZE && B::IS_FIXED_SIZE;
    const FIXED_SIZE: usize = A::FIXED_SIZE + B::FIXED_SIZE;

    fn serialize<W: ItemWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)?;
        self.1.serialize(writer)
    }

    fn deserialize<R: ItemReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let a = A::deserialize(reader)?;
        let b = B::deserialize(reader)?;
        Ok((a, b))
    }

    fn skip<R: ItemReader + ?Sized>(reader: &mut R) -> Result<()> {
        A::skip(reader)?;
        B::skip(reader)
    }
}
