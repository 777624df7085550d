//! listslice-core — parcel buffers, type tags, and the list slice wire format.
//! All other listslice crates depend on this one.

pub mod config;
pub mod parcel;
pub mod wire;

pub use config::{ConfigError, SliceConfig, SliceLogLevel};
pub use parcel::{Parcel, ParcelReader};
pub use wire::{HandleRef, TypeTag, WireError};
