//! List slices: a homogeneous list split across an inline segment and a
//! remainder served on demand.
//!
//! Wire layout of the first message:
//!
//! ```text
//! i32      N
//! [N > 0]
//!   TypeTag  witness, from element 0
//!   (i32 PRESENT, element)*     until N elements or the ceiling
//!   [fewer than N inlined]
//!     i32 ABSENT, HandleObject  responder serving the rest
//! ```
//!
//! A remainder reply is the same `(PRESENT, element)*` run, terminated by
//! ABSENT when more elements remain after it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use listslice_core::wire::{ABSENT, FETCH_REMAINDER, FLAG_SIZE, INLINE_TRAILER_SIZE, PRESENT};
use listslice_core::{
    HandleRef, Parcel, ParcelReader, SliceConfig, SliceLogLevel, TypeTag, WireError,
};

use crate::codec::{ElementCodec, Parcelable, ParcelableCodec, StringCodec};
use crate::error::{ChannelError, SliceError};
use crate::transport::{Registration, Responder, Transport};

/// Upper bound on capacity reserved from an untrusted count.
const MAX_PREALLOC: usize = 1024;

/// Slice of `Parcelable` records.
pub type ParceledListSlice<T> = ListSlice<ParcelableCodec<T>>;

/// Slice of strings.
pub type StringParceledListSlice = ListSlice<StringCodec>;

/// A list being transferred, plus the codec for its elements.
///
/// The list is immutable once the slice exists; remainder responders share
/// it, so a slice can be written any number of times.
pub struct ListSlice<C: ElementCodec> {
    list: Arc<Vec<C::Item>>,
    codec: Arc<C>,
    inline_count_limit: Option<usize>,
}

impl<C: ElementCodec> ListSlice<C> {
    pub fn new(list: Vec<C::Item>, codec: C) -> Self {
        Self {
            list: Arc::new(list),
            codec: Arc::new(codec),
            inline_count_limit: None,
        }
    }

    pub fn empty(codec: C) -> Self {
        Self::new(Vec::new(), codec)
    }

    /// Cap the number of elements written inline. Overrides
    /// `SliceConfig::inline_count_limit`.
    pub fn with_inline_count_limit(mut self, limit: usize) -> Self {
        self.inline_count_limit = Some(limit);
        self
    }

    pub fn set_inline_count_limit(&mut self, limit: usize) {
        self.inline_count_limit = Some(limit);
    }

    pub fn inline_count_limit(&self) -> Option<usize> {
        self.inline_count_limit
    }

    pub fn list(&self) -> &[C::Item] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Bitwise OR of every element's contents flags.
    pub fn contents_flags(&self) -> u32 {
        self.list
            .iter()
            .fold(0, |flags, item| flags | self.codec.contents_flags(item))
    }

    /// Take the list out. Copies only if a remainder responder still
    /// shares it.
    pub fn into_list(self) -> Vec<C::Item>
    where
        C::Item: Clone,
    {
        Arc::try_unwrap(self.list).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T: Parcelable> ListSlice<ParcelableCodec<T>> {
    pub fn parcelables(list: Vec<T>) -> Self {
        Self::new(list, ParcelableCodec::new())
    }
}

impl ListSlice<StringCodec> {
    pub fn strings(list: Vec<String>) -> Self {
        Self::new(list, StringCodec)
    }
}

impl<C: ElementCodec> Clone for ListSlice<C> {
    fn clone(&self) -> Self {
        Self {
            list: Arc::clone(&self.list),
            codec: Arc::clone(&self.codec),
            inline_count_limit: self.inline_count_limit,
        }
    }
}

impl<C: ElementCodec> fmt::Debug for ListSlice<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListSlice")
            .field("len", &self.list.len())
            .field("inline_count_limit", &self.inline_count_limit)
            .finish()
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encode one element after checking it against the witness.
fn write_element<C: ElementCodec>(
    codec: &C,
    witness: &TypeTag,
    index: usize,
    item: &C::Item,
    dest: &mut Parcel,
) -> Result<(), SliceError> {
    let found = codec.type_tag(item);
    if found != *witness {
        return Err(SliceError::Heterogeneous {
            index,
            expected: *witness,
            found,
        });
    }
    dest.write_i32(PRESENT);
    codec.encode(item, dest)
}

impl<C> ListSlice<C>
where
    C: ElementCodec + 'static,
    C::Item: Send + Sync + 'static,
{
    /// Write the slice into `dest`.
    ///
    /// Returns the registration of the remainder responder when not every
    /// element fit inline. The reader can pull the remainder only while the
    /// registration is alive.
    ///
    /// Messages are bounded by the smaller of `config.max_ipc_size` and the
    /// transport's own `max_message_size()`.
    pub fn write_to_parcel(
        &self,
        dest: &mut Parcel,
        transport: &dyn Transport,
        config: &SliceConfig,
    ) -> Result<Option<Registration>, SliceError> {
        let n = self.list.len();
        let count = i32::try_from(n).map_err(|_| SliceError::TooLarge(n))?;

        let Some(first) = self.list.first() else {
            dest.write_i32(0);
            return Ok(None);
        };

        // Reject a mixed list before anything reaches the wire.
        let witness = self.codec.type_tag(first);
        for (index, item) in self.list.iter().enumerate() {
            let found = self.codec.type_tag(item);
            if found != witness {
                tracing::warn!(index, expected = %witness, %found, "refusing heterogeneous list");
                return Err(SliceError::Heterogeneous {
                    index,
                    expected: witness,
                    found,
                });
            }
        }

        let start_size = dest.data_size();
        dest.write_i32(count);
        dest.write_type_tag(&witness);

        let limit = self
            .inline_count_limit
            .or(config.inline_count_limit)
            .unwrap_or(usize::MAX);
        let max_size = config.max_ipc_size.min(transport.max_message_size());
        let log_level = config.log_level;

        let mut inlined = 0;
        for (index, item) in self.list.iter().enumerate().take(limit) {
            let mark = dest.data_size();
            write_element(&*self.codec, &witness, index, item, dest)?;
            // Room for ABSENT and the handle object unless this is the last element.
            let ceiling = if index + 1 < n {
                max_size.saturating_sub(INLINE_TRAILER_SIZE)
            } else {
                max_size
            };
            if dest.data_size() >= ceiling {
                dest.truncate(mark);
                break;
            }
            if log_level.elements() {
                tracing::trace!(index, bytes = dest.data_size() - mark, "element inlined");
            }
            inlined += 1;
        }

        if inlined == n {
            if log_level.batches() {
                tracing::debug!(
                    count = n,
                    witness = %witness,
                    bytes = dest.data_size() - start_size,
                    "list slice written inline"
                );
            }
            return Ok(None);
        }

        dest.write_i32(ABSENT);
        let responder = Arc::new(RemainderResponder {
            list: Arc::clone(&self.list),
            codec: Arc::clone(&self.codec),
            witness,
            max_reply_size: max_size,
            log_level,
        });
        let registration = transport.register(responder);
        dest.write_handle(registration.handle());

        if log_level.batches() {
            tracing::debug!(
                count = n,
                inlined,
                witness = %witness,
                handle = %registration.handle(),
                bytes = dest.data_size() - start_size,
                "list slice written with remainder"
            );
        }

        Ok(Some(registration))
    }
}

/// Serves the elements the inline segment left out.
struct RemainderResponder<C: ElementCodec> {
    list: Arc<Vec<C::Item>>,
    codec: Arc<C>,
    witness: TypeTag,
    max_reply_size: usize,
    log_level: SliceLogLevel,
}

impl<C> Responder for RemainderResponder<C>
where
    C: ElementCodec,
    C::Item: Send + Sync,
{
    fn on_transact(
        &self,
        code: u32,
        request: &mut ParcelReader,
        reply: &mut Parcel,
    ) -> Result<(), SliceError> {
        if code != FETCH_REMAINDER {
            return Err(ChannelError::UnknownTransaction(code).into());
        }
        let start = request.read_i32()?;
        let start = usize::try_from(start).map_err(|_| ChannelError::BadStartIndex(start))?;

        let n = self.list.len();

        let mut next = start;
        for (index, item) in self.list.iter().enumerate().skip(start) {
            let mark = reply.data_size();
            write_element(&*self.codec, &self.witness, index, item, reply)?;
            let ceiling = if index + 1 < n {
                self.max_reply_size.saturating_sub(FLAG_SIZE)
            } else {
                self.max_reply_size
            };
            // Always send at least one element so the reader makes progress.
            if index > start && reply.data_size() >= ceiling {
                reply.truncate(mark);
                break;
            }
            next = index + 1;
        }

        let more = next < n;
        if more {
            reply.write_i32(ABSENT);
        }

        if self.log_level.batches() {
            tracing::debug!(
                start,
                end = next,
                count = n,
                more,
                bytes = reply.data_size(),
                "remainder batch served"
            );
        }
        Ok(())
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Read one `(PRESENT, element)*` run into `list`, stopping at `n`.
/// Returns true if the run was terminated by ABSENT (more remain), false if
/// it reached `n` or the end of the message.
fn read_run<C: ElementCodec>(
    codec: &C,
    witness: &TypeTag,
    n: usize,
    src: &mut ParcelReader,
    list: &mut Vec<C::Item>,
    log_level: SliceLogLevel,
) -> Result<bool, SliceError> {
    while list.len() < n {
        if !src.has_remaining() {
            return Ok(false);
        }
        match src.read_i32()? {
            ABSENT => return Ok(true),
            PRESENT => {}
            other => return Err(WireError::BadFlag(other).into()),
        }

        let index = list.len();
        let item = codec.decode(witness, src)?;
        let found = codec.type_tag(&item);
        if found != *witness {
            tracing::warn!(index, expected = %witness, %found, "received heterogeneous list");
            return Err(SliceError::Heterogeneous {
                index,
                expected: *witness,
                found,
            });
        }
        if log_level.elements() {
            tracing::trace!(index, "element read");
        }
        list.push(item);
    }
    Ok(false)
}

fn fetch_request(start: usize) -> Bytes {
    let mut request = Parcel::with_capacity(4);
    // start < n <= i32::MAX
    request.write_i32(start as i32);
    request.freeze()
}

impl<C: ElementCodec> ListSlice<C> {
    /// Read a slice written by `write_to_parcel`, pulling any remainder
    /// through `transport`.
    ///
    /// Fails with `SliceError::Truncated` if the remainder runs out before
    /// the advertised count is reached.
    pub fn read_from_parcel(
        src: &mut ParcelReader,
        codec: C,
        transport: &dyn Transport,
        config: &SliceConfig,
    ) -> Result<Self, SliceError> {
        let count = src.read_i32()?;
        if count <= 0 {
            return Ok(Self::empty(codec));
        }
        let n = count as usize;
        let witness = src.read_type_tag()?;
        let log_level = config.log_level;

        let mut list = Vec::with_capacity(n.min(MAX_PREALLOC));
        read_run(&codec, &witness, n, src, &mut list, log_level)?;
        let inlined = list.len();

        if list.len() < n {
            let handle = src.read_handle()?;
            Self::read_remainder(&codec, &witness, n, handle, transport, &mut list, log_level)?;
        }

        if log_level.batches() {
            tracing::debug!(count = n, inlined, witness = %witness, "list slice read");
        }

        Ok(Self {
            list: Arc::new(list),
            codec: Arc::new(codec),
            inline_count_limit: None,
        })
    }

    fn read_remainder(
        codec: &C,
        witness: &TypeTag,
        n: usize,
        handle: HandleRef,
        transport: &dyn Transport,
        list: &mut Vec<C::Item>,
        log_level: SliceLogLevel,
    ) -> Result<(), SliceError> {
        while list.len() < n {
            let start = list.len();
            let reply = transport.transact(handle, FETCH_REMAINDER, fetch_request(start))?;
            let mut reply = ParcelReader::new(reply);
            let more = read_run(codec, witness, n, &mut reply, list, log_level)?;

            if log_level.batches() {
                tracing::debug!(
                    %handle,
                    start,
                    received = list.len() - start,
                    more,
                    "remainder batch read"
                );
            }

            if list.len() < n && (!more || list.len() == start) {
                tracing::warn!(
                    %handle,
                    expected = n,
                    received = list.len(),
                    "remainder exhausted before list was complete"
                );
                return Err(SliceError::Truncated {
                    expected: n,
                    received: list.len(),
                });
            }
        }
        Ok(())
    }
}
