//! List slice wire format: the fixed-size pieces of every slice message.
//!
//! A slice message is a count, a type witness, a run of flag-prefixed
//! elements, and (when the run did not cover the whole list) a handle object
//! naming the responder that serves the remainder. Element payloads are
//! opaque here; their layout belongs to the element codec.
//!
//! Fixed-size structs use zerocopy derives with explicit little-endian
//! fields, so the layout is identical on every host. There is no unsafe
//! code in this module.

use std::fmt;

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Type Witness ──────────────────────────────────────────────────────────────

/// Type witness. BLAKE3 hash of a canonical element type name.
///
/// Written once per slice, derived from the first element. Every other
/// element on both the encode and the decode path must report the same tag.
///
/// Wire size: 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, AsBytes, FromBytes, FromZeroes)]
#[repr(transparent)]
pub struct TypeTag(pub [u8; 32]);

assert_eq_size!(TypeTag, [u8; 32]);

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({self})")
    }
}

/// Compute a TypeTag from a canonical type name.
/// The name is part of the protocol: both ends must agree on it.
pub fn type_tag(name: &[u8]) -> TypeTag {
    TypeTag(*blake3::hash(name).as_bytes())
}

/// Tag used for plain UTF-8 string elements.
pub fn string_tag() -> TypeTag {
    type_tag(b"listslice.string")
}

// ── Handles ───────────────────────────────────────────────────────────────────

/// Reference to a responder registered on a transport.
/// Handle 0 is never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleRef(pub u32);

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// On-wire form of a HandleRef, written after the inline run when a
/// remainder exists.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct HandleObject {
    /// Always HANDLE_OBJECT_KIND. Anything else is rejected.
    pub kind: U32<LittleEndian>,
    /// Reserved, must be zero.
    pub flags: U32<LittleEndian>,
    /// Handle id on the sender's transport.
    pub handle: U32<LittleEndian>,
    /// Reserved, must be zero.
    pub reserved: U32<LittleEndian>,
}

assert_eq_size!(HandleObject, [u8; 16]);

impl HandleObject {
    pub fn new(handle: HandleRef) -> Self {
        Self {
            kind: U32::new(HANDLE_OBJECT_KIND),
            flags: U32::new(0),
            handle: U32::new(handle.0),
            reserved: U32::new(0),
        }
    }

    /// Validate the object and extract the handle it names.
    pub fn handle_ref(&self) -> Result<HandleRef, WireError> {
        let kind = self.kind.get();
        if kind != HANDLE_OBJECT_KIND {
            return Err(WireError::BadHandleObject(kind));
        }
        let flags = self.flags.get();
        if flags != 0 || self.reserved.get() != 0 {
            return Err(WireError::ReservedFieldsSet(flags));
        }
        match self.handle.get() {
            0 => Err(WireError::NullHandle),
            id => Ok(HandleRef(id)),
        }
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Flag preceding every element in a run.
pub const PRESENT: i32 = 1;

/// Flag terminating a run early: more elements remain on the responder.
pub const ABSENT: i32 = 0;

/// Size of a run flag on the wire.
pub const FLAG_SIZE: usize = 4;

/// Size of the trailer written after an incomplete inline run.
pub const INLINE_TRAILER_SIZE: usize = FLAG_SIZE + std::mem::size_of::<HandleObject>();

/// Transaction code for "send elements starting at index S".
pub const FETCH_REMAINDER: u32 = 1;

/// Magic identifying a handle object.
pub const HANDLE_OBJECT_KIND: u32 = 0x7368_2a85;

/// Default byte ceiling for one message.
pub const DEFAULT_MAX_IPC_SIZE: usize = 64 * 1024;

/// Contents flag: an element carries a file descriptor.
pub const CONTENTS_FILE_DESCRIPTOR: u32 = 0x0001;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("message truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("length {0} does not fit in a 32-bit length prefix")]
    LengthOverflow(usize),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown run flag: {0}")]
    BadFlag(i32),

    #[error("unknown handle object kind: 0x{0:08x}")]
    BadHandleObject(u32),

    #[error("reserved handle object fields are non-zero: 0x{0:08x}")]
    ReservedFieldsSet(u32),

    #[error("handle object names the null handle")]
    NullHandle,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
