//! Transfer errors.

use listslice_core::{HandleRef, TypeTag, WireError};

/// Failures of the bounded channel itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("no responder registered for handle {0}")]
    UnknownHandle(HandleRef),

    #[error("unknown transaction code {0}")]
    UnknownTransaction(u32),

    #[error("negative start index {0}")]
    BadStartIndex(i32),

    #[error("reply of {size} bytes exceeds the channel ceiling of {max}")]
    ReplyTooLarge { size: usize, max: usize },

    #[error("transport disconnected")]
    Disconnected,
}

/// Everything a slice transfer can fail with. None of these is recoverable
/// within the transfer: a list is either delivered whole or not at all.
#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    #[error("heterogeneous list: element {index} has type {found}, expected {expected}")]
    Heterogeneous {
        index: usize,
        expected: TypeTag,
        found: TypeTag,
    },

    #[error("list truncated: received {received} of {expected} elements")]
    Truncated { expected: usize, received: usize },

    #[error("list of {0} elements does not fit the wire count")]
    TooLarge(usize),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("element codec failed: {0}")]
    Codec(String),
}
