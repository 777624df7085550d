//! listslice-transfer — moving large homogeneous lists across a
//! size-bounded request/response channel.
//!
//! A `ListSlice` writes as many elements as fit into the first message and
//! registers a responder on the `Transport` that serves the rest in bounded
//! batches. The reading side pulls those batches until the list is whole.
//! Every element is checked against one type witness on both sides.

pub mod codec;
pub mod error;
pub mod slice;
pub mod transport;

pub use codec::{ElementCodec, Parcelable, ParcelableCodec, SerdeCodec, StringCodec};
pub use error::{ChannelError, SliceError};
pub use slice::{ListSlice, ParceledListSlice, StringParceledListSlice};
pub use transport::{LocalTransport, Registration, Responder, Transport};
