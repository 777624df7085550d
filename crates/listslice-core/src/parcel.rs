//! The append-only message buffer every slice is written into.
//!
//! Primitives are little-endian. Byte arrays and strings carry an i32 length
//! prefix and are padded to a 4-byte boundary, so every primitive starts
//! aligned. `data_size()` is the running size the slice encoder checks
//! against the channel ceiling.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{HandleObject, HandleRef, TypeTag, WireError};

/// Bytes of padding needed to bring `len` up to a 4-byte boundary.
fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Message writer.
#[derive(Debug, Default)]
pub struct Parcel {
    data: BytesMut,
}

impl Parcel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.put_i32_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u32_le(value);
    }

    /// Length-prefixed byte array, padded to 4 bytes.
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let len = i32::try_from(bytes.len()).map_err(|_| WireError::LengthOverflow(bytes.len()))?;
        self.write_i32(len);
        self.data.put_slice(bytes);
        self.data.put_bytes(0, pad_len(bytes.len()));
        Ok(())
    }

    /// UTF-8 string, encoded like a byte array.
    pub fn write_string(&mut self, value: &str) -> Result<(), WireError> {
        self.write_byte_array(value.as_bytes())
    }

    pub fn write_type_tag(&mut self, tag: &TypeTag) {
        self.data.put_slice(tag.as_bytes());
    }

    pub fn write_handle(&mut self, handle: HandleRef) {
        self.data.put_slice(HandleObject::new(handle).as_bytes());
    }

    /// Roll the parcel back to `len` bytes. No-op if `len` is past the end.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Finish writing and hand out the immutable bytes.
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Message reader. Reads are bounds-checked; a short message is a
/// `WireError::Truncated`, never a panic.
#[derive(Debug, Clone)]
pub struct ParcelReader {
    buf: Bytes,
    total: usize,
}

impl ParcelReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let buf = data.into();
        let total = buf.len();
        Self { buf, total }
    }

    /// Read cursor, in bytes from the start of the message.
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), WireError> {
        if self.buf.remaining() < needed {
            return Err(WireError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<Bytes, WireError> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Length-prefixed byte array. Zero-copy: the returned Bytes shares
    /// the message buffer.
    pub fn read_byte_array(&mut self) -> Result<Bytes, WireError> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| WireError::NegativeLength(len))?;
        self.ensure(len + pad_len(len))?;
        let bytes = self.take(len)?;
        self.buf.advance(pad_len(len));
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let bytes = self.read_byte_array()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }

    pub fn read_type_tag(&mut self) -> Result<TypeTag, WireError> {
        let raw = self.take(std::mem::size_of::<TypeTag>())?;
        TypeTag::read_from(&raw[..]).ok_or(WireError::Truncated {
            needed: std::mem::size_of::<TypeTag>(),
            remaining: raw.len(),
        })
    }

    pub fn read_handle(&mut self) -> Result<HandleRef, WireError> {
        let size = std::mem::size_of::<HandleObject>();
        let raw = self.take(size)?;
        let object = HandleObject::read_from(&raw[..]).ok_or(WireError::Truncated {
            needed: size,
            remaining: raw.len(),
        })?;
        object.handle_ref()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
