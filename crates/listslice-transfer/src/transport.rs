//! Bounded request/response channel.
//!
//! A `Transport` hosts responders behind numeric handles and carries
//! transactions to them: register a responder, send one request, get one
//! reply. Timeouts and retries, if any, belong to the transport
//! implementation, not to the slice layer.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use dashmap::DashMap;
use listslice_core::{HandleRef, Parcel, ParcelReader, SliceConfig};

use crate::error::{ChannelError, SliceError};

/// Server side of a handle.
///
/// Invoked out of band, possibly from several threads at once. Replies
/// must depend only on the request, never on previous calls.
pub trait Responder: Send + Sync {
    fn on_transact(
        &self,
        code: u32,
        request: &mut ParcelReader,
        reply: &mut Parcel,
    ) -> Result<(), SliceError>;
}

/// A size-bounded request/response channel.
pub trait Transport: Send + Sync {
    /// Host a responder. It stays reachable until the returned
    /// `Registration` is dropped.
    fn register(&self, responder: Arc<dyn Responder>) -> Registration;

    /// Send `request` to the responder behind `handle` and wait for its reply.
    fn transact(&self, handle: HandleRef, code: u32, request: Bytes) -> Result<Bytes, SliceError>;

    /// Largest message, request or reply, the channel will carry.
    fn max_message_size(&self) -> usize;
}

// ── Registration ──────────────────────────────────────────────────────────────

/// Keeps a registered responder alive. Dropping it unregisters the handle;
/// later transactions against it fail with `ChannelError::UnknownHandle`.
pub struct Registration {
    handle: HandleRef,
    release: Option<Box<dyn FnOnce(HandleRef) + Send>>,
}

impl Registration {
    pub fn new(handle: HandleRef, release: impl FnOnce(HandleRef) + Send + 'static) -> Self {
        Self {
            handle,
            release: Some(Box::new(release)),
        }
    }

    pub fn handle(&self) -> HandleRef {
        self.handle
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.handle);
        }
    }
}

// ── LocalTransport ────────────────────────────────────────────────────────────

/// In-process transport. Responders live in a shared handle table;
/// transactions call them directly on the caller's thread.
#[derive(Clone)]
pub struct LocalTransport {
    inner: Arc<HandleTable>,
}

struct HandleTable {
    responders: DashMap<HandleRef, Arc<dyn Responder>>,
    next_handle: AtomicU32,
    max_reply_size: usize,
}

impl LocalTransport {
    /// Create a transport that rejects replies larger than `max_reply_size`.
    pub fn new(max_reply_size: usize) -> Self {
        Self {
            inner: Arc::new(HandleTable {
                responders: DashMap::new(),
                next_handle: AtomicU32::new(1),
                max_reply_size,
            }),
        }
    }

    pub fn from_config(config: &SliceConfig) -> Self {
        Self::new(config.max_ipc_size)
    }

    pub fn max_reply_size(&self) -> usize {
        self.inner.max_reply_size
    }

    /// Number of responders currently registered.
    pub fn live_handles(&self) -> usize {
        self.inner.responders.len()
    }
}

impl Transport for LocalTransport {
    fn register(&self, responder: Arc<dyn Responder>) -> Registration {
        let handle = HandleRef(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        self.inner.responders.insert(handle, responder);

        let table: Weak<HandleTable> = Arc::downgrade(&self.inner);
        Registration::new(handle, move |handle| {
            if let Some(table) = table.upgrade() {
                if table.responders.remove(&handle).is_some() {
                    tracing::trace!(%handle, "responder released");
                }
            }
        })
    }

    fn transact(&self, handle: HandleRef, code: u32, request: Bytes) -> Result<Bytes, SliceError> {
        // Clone out of the table so no shard lock is held while the
        // responder runs.
        let responder = self
            .inner
            .responders
            .get(&handle)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ChannelError::UnknownHandle(handle))?;

        let mut request = ParcelReader::new(request);
        let mut reply = Parcel::new();
        responder.on_transact(code, &mut request, &mut reply)?;

        let size = reply.data_size();
        if size > self.inner.max_reply_size {
            tracing::warn!(
                %handle,
                size,
                max = self.inner.max_reply_size,
                "reply exceeds channel ceiling"
            );
            return Err(ChannelError::ReplyTooLarge {
                size,
                max: self.inner.max_reply_size,
            }
            .into());
        }

        Ok(reply.freeze())
    }

    fn max_message_size(&self) -> usize {
        self.max_reply_size()
    }
}
