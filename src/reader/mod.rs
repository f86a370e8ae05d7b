//! Bounds-checked, little-endian record reader over an in-memory asset.
//!
//! Every read validates `offset + size <= buffer.len()` before decoding, so a
//! corrupted or hostile file can only ever produce a [`ParseError`], never a
//! panic or a read of unrelated bytes.

use std::io::Cursor;

use binrw::{binrw, BinResult};
use serde::Serialize;

use crate::error::{ParseError, Result};

pub const DEFAULT_MAX_ARRAY_COUNT: usize = 1_000_000;

/// A record with a fixed on-disk size that can be decoded from exactly
/// `SIZE` bytes.
pub trait FixedRecord: Sized {
    const SIZE: usize;

    fn decode(cursor: &mut Cursor<&[u8]>) -> BinResult<Self>;
}

macro_rules! fixed_record {
    ($($ty:ty => $size:expr),* $(,)?) => {
        $(
            impl $crate::reader::FixedRecord for $ty {
                const SIZE: usize = $size;

                fn decode(cursor: &mut std::io::Cursor<&[u8]>) -> binrw::BinResult<Self> {
                    <$ty as binrw::BinRead>::read_options(cursor, binrw::Endian::Little, ())
                }
            }
        )*
    };
}
pub(crate) use fixed_record;

fixed_record! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    f32 => 4,
}

/// Count + byte offset pair pointing at a variable-length section.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArrayDescriptor {
    pub count: u32,
    pub offset: u32,
}

fixed_record! { ArrayDescriptor => 8 }

impl ArrayDescriptor {
    pub fn new(count: u32, offset: u32) -> Self {
        Self { count, offset }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Byte offset of element `index` for the given stride.
    pub fn element_offset(&self, index: usize, stride: usize) -> Option<usize> {
        index
            .checked_mul(stride)
            .and_then(|rel| (self.offset as usize).checked_add(rel))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    max_array_count: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            max_array_count: DEFAULT_MAX_ARRAY_COUNT,
        }
    }

    pub fn with_max_array_count(mut self, max_array_count: usize) -> Self {
        self.max_array_count = max_array_count;
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.buf.len() => Ok(()),
            _ => Err(ParseError::TruncatedBuffer {
                offset,
                len,
                buffer_len: self.buf.len(),
            }),
        }
    }

    pub fn read_fixed_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.check_range(offset, len)?;
        Ok(&self.buf[offset..offset + len])
    }

    pub fn read_record<T: FixedRecord>(&self, offset: usize) -> Result<T> {
        let bytes = self.read_fixed_bytes(offset, T::SIZE)?;
        let mut cursor = Cursor::new(bytes);
        // The slice is exactly SIZE bytes, so a decode failure means the record
        // definition wanted more than it declared.
        T::decode(&mut cursor).map_err(|_| ParseError::TruncatedBuffer {
            offset,
            len: T::SIZE,
            buffer_len: self.buf.len(),
        })
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.read_record(offset)
    }

    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        self.read_record(offset)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.read_record(offset)
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        self.read_record(offset)
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.read_record(offset)
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        self.read_record(offset)
    }

    pub fn read_f32(&self, offset: usize) -> Result<f32> {
        self.read_record(offset)
    }

    pub fn read_array_descriptor(&self, offset: usize) -> Result<ArrayDescriptor> {
        self.read_record(offset)
    }

    /// Validate that `desc.count` records of `stride` bytes fit in the buffer.
    pub fn check_array(
        &self,
        what: &'static str,
        desc: ArrayDescriptor,
        stride: usize,
    ) -> Result<()> {
        let count = desc.count as usize;
        if count == 0 {
            return Ok(());
        }
        if count > self.max_array_count {
            return Err(ParseError::ArrayTooLarge {
                what,
                count,
                limit: self.max_array_count,
            });
        }
        let len = count.checked_mul(stride).ok_or(ParseError::TruncatedBuffer {
            offset: desc.offset as usize,
            len: usize::MAX,
            buffer_len: self.buf.len(),
        })?;
        self.check_range(desc.offset as usize, len)
    }

    /// Read `desc.count` records laid out `stride` bytes apart. `stride` may be
    /// larger than the record itself when a newer layout appends fields.
    pub fn read_strided<T: FixedRecord>(
        &self,
        what: &'static str,
        desc: ArrayDescriptor,
        stride: usize,
    ) -> Result<Vec<T>> {
        let stride = stride.max(T::SIZE);
        self.check_array(what, desc, stride)?;

        let mut values = Vec::with_capacity(desc.count as usize);
        for i in 0..desc.count as usize {
            values.push(self.read_record(desc.offset as usize + i * stride)?);
        }
        Ok(values)
    }

    pub fn read_array<T: FixedRecord>(
        &self,
        what: &'static str,
        desc: ArrayDescriptor,
    ) -> Result<Vec<T>> {
        self.read_strided(what, desc, T::SIZE)
    }

    /// Reads a character array, stopping at the first NUL.
    pub fn read_c_string(&self, desc: ArrayDescriptor) -> Result<String> {
        if desc.is_empty() {
            return Ok(String::new());
        }
        let raw = self.read_fixed_bytes(desc.offset as usize, desc.count as usize)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).to_string())
    }
}
