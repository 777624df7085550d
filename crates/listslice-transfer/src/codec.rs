//! Element codecs: how one list element goes onto and comes off the wire.
//!
//! The slice layer never interprets element bytes. It asks the codec for
//! each element's type tag, hands it a parcel to write into, and checks the
//! tag of every decoded element against the witness.

use std::fmt;
use std::marker::PhantomData;

use listslice_core::wire::string_tag;
use listslice_core::{Parcel, ParcelReader, TypeTag};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SliceError;

/// Encodes and decodes single list elements.
///
/// Implementations must be stateless with respect to the list: the same
/// codec value serves the inline segment and every remainder batch,
/// possibly from several threads at once.
pub trait ElementCodec: Send + Sync {
    type Item;

    /// Concrete type of `item`. All elements of a slice must agree.
    fn type_tag(&self, item: &Self::Item) -> TypeTag;

    fn encode(&self, item: &Self::Item, dest: &mut Parcel) -> Result<(), SliceError>;

    /// Decode one element. `witness` is the tag the slice was written
    /// with; the returned element's tag is checked against it afterwards.
    fn decode(&self, witness: &TypeTag, src: &mut ParcelReader) -> Result<Self::Item, SliceError>;

    /// Contents flags of one element. See `CONTENTS_FILE_DESCRIPTOR`.
    fn contents_flags(&self, _item: &Self::Item) -> u32 {
        0
    }
}

// ── Parcelable ────────────────────────────────────────────────────────────────

/// A record type that writes itself into a parcel.
pub trait Parcelable: Sized {
    fn type_tag(&self) -> TypeTag;

    fn write_to_parcel(&self, dest: &mut Parcel) -> Result<(), SliceError>;

    /// Build a value from the parcel. `witness` names the type the list
    /// was written with.
    fn create_from_parcel(witness: &TypeTag, src: &mut ParcelReader) -> Result<Self, SliceError>;

    fn contents_flags(&self) -> u32 {
        0
    }
}

/// Codec for any `Parcelable`.
pub struct ParcelableCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParcelableCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ParcelableCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ParcelableCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ParcelableCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParcelableCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Parcelable> ElementCodec for ParcelableCodec<T> {
    type Item = T;

    fn type_tag(&self, item: &T) -> TypeTag {
        item.type_tag()
    }

    fn encode(&self, item: &T, dest: &mut Parcel) -> Result<(), SliceError> {
        item.write_to_parcel(dest)
    }

    fn decode(&self, witness: &TypeTag, src: &mut ParcelReader) -> Result<T, SliceError> {
        T::create_from_parcel(witness, src)
    }

    fn contents_flags(&self, item: &T) -> u32 {
        item.contents_flags()
    }
}

// ── Strings ───────────────────────────────────────────────────────────────────

/// Codec for UTF-8 strings. Every element carries `string_tag()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ElementCodec for StringCodec {
    type Item = String;

    fn type_tag(&self, _item: &String) -> TypeTag {
        string_tag()
    }

    fn encode(&self, item: &String, dest: &mut Parcel) -> Result<(), SliceError> {
        Ok(dest.write_string(item)?)
    }

    fn decode(&self, _witness: &TypeTag, src: &mut ParcelReader) -> Result<String, SliceError> {
        Ok(src.read_string()?)
    }
}

// ── Serde ─────────────────────────────────────────────────────────────────────

/// Codec for serde types. Each element travels as a JSON byte array; the
/// caller supplies the function that names an element's concrete type.
pub struct SerdeCodec<T> {
    tag_of: fn(&T) -> TypeTag,
}

impl<T> SerdeCodec<T> {
    pub fn new(tag_of: fn(&T) -> TypeTag) -> Self {
        Self { tag_of }
    }
}

impl<T> Clone for SerdeCodec<T> {
    fn clone(&self) -> Self {
        Self {
            tag_of: self.tag_of,
        }
    }
}

impl<T> fmt::Debug for SerdeCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerdeCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize + DeserializeOwned> ElementCodec for SerdeCodec<T> {
    type Item = T;

    fn type_tag(&self, item: &T) -> TypeTag {
        (self.tag_of)(item)
    }

    fn encode(&self, item: &T, dest: &mut Parcel) -> Result<(), SliceError> {
        let json = serde_json::to_vec(item).map_err(|e| SliceError::Codec(e.to_string()))?;
        Ok(dest.write_byte_array(&json)?)
    }

    fn decode(&self, _witness: &TypeTag, src: &mut ParcelReader) -> Result<T, SliceError> {
        let json = src.read_byte_array()?;
        serde_json::from_slice(&json).map_err(|e| SliceError::Codec(e.to_string()))
    }
}
