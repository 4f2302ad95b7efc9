//! In-process paired transport.
//!
//! Two [`MemoryTransport`] endpoints created by [`MemoryTransport::pair`]
//! deliver each other's sends as [`TransportEvent::MessageReceived`]. Every
//! endpoint also records what it was asked to send and can be told to fail,
//! which makes it the transport of choice for tests and demos.
//!
//! # Example
//!
//! ```ignore
//! use watch_bridge::transport::MemoryTransport;
//!
//! let ((phone, phone_events), (watch, watch_events)) = MemoryTransport::pair();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::{event_channel, BoxFuture, EventReceiver, EventSender, Transport, TransportEvent};
use crate::error::{BridgeError, Result};
use crate::protocol::RawMessage;
use crate::session::ActivationState;

struct Endpoint {
    supported: AtomicBool,
    reachable: AtomicBool,
    activated: AtomicBool,
    send_failure: Mutex<Option<String>>,
    sent: Mutex<Vec<RawMessage>>,
    events: EventSender,
}

impl Endpoint {
    fn new(events: EventSender) -> Self {
        Self {
            supported: AtomicBool::new(true),
            reachable: AtomicBool::new(true),
            activated: AtomicBool::new(false),
            send_failure: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            events,
        }
    }

    fn emit(&self, event: TransportEvent) {
        // Receiver gone means nobody is listening; nothing to notify.
        let _ = self.events.send(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One endpoint of an in-process transport.
///
/// Cheap to clone; clones share the same endpoint.
#[derive(Clone)]
pub struct MemoryTransport {
    local: Arc<Endpoint>,
    peer: Option<Weak<Endpoint>>,
}

impl MemoryTransport {
    /// Create an unpaired endpoint. Sends succeed and are only recorded.
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = event_channel();
        let transport = Self {
            local: Arc::new(Endpoint::new(tx)),
            peer: None,
        };
        (transport, rx)
    }

    /// Create two connected endpoints, each with its own event receiver.
    pub fn pair() -> ((Self, EventReceiver), (Self, EventReceiver)) {
        let (a_tx, a_rx) = event_channel();
        let (b_tx, b_rx) = event_channel();
        let a = Arc::new(Endpoint::new(a_tx));
        let b = Arc::new(Endpoint::new(b_tx));

        let a_transport = Self {
            peer: Some(Arc::downgrade(&b)),
            local: a,
        };
        let b_transport = Self {
            peer: Some(Arc::downgrade(&a_transport.local)),
            local: b,
        };
        ((a_transport, a_rx), (b_transport, b_rx))
    }

    /// Pretend the platform does (not) support this transport.
    pub fn set_supported(&self, supported: bool) {
        self.local.supported.store(supported, Ordering::Release);
    }

    /// Override local reachability.
    pub fn set_reachable(&self, reachable: bool) {
        self.local.reachable.store(reachable, Ordering::Release);
    }

    /// Make every following send fail with `detail`, or clear with `None`.
    pub fn fail_sends(&self, detail: Option<&str>) {
        *lock(&self.local.send_failure) = detail.map(str::to_string);
    }

    /// Messages this endpoint was asked to send, failed ones included.
    pub fn sent(&self) -> Vec<RawMessage> {
        lock(&self.local.sent).clone()
    }

    /// Number of send invocations.
    pub fn send_count(&self) -> usize {
        lock(&self.local.sent).len()
    }

    /// Inject an inbound message as if the peer had sent it.
    pub fn deliver(&self, message: RawMessage) {
        self.local.emit(TransportEvent::MessageReceived(message));
    }

    /// Tear the session down: emits `BecameInactive` then `Deactivated`.
    pub fn deactivate(&self) {
        self.local.activated.store(false, Ordering::Release);
        self.local.emit(TransportEvent::BecameInactive);
        self.local.emit(TransportEvent::Deactivated);
    }

    fn peer(&self) -> Option<Result<Arc<Endpoint>>> {
        self.peer.as_ref().map(|weak| {
            weak.upgrade()
                .ok_or_else(|| BridgeError::TransmissionFailed("peer endpoint dropped".into()))
        })
    }

    fn try_send(&self, message: RawMessage) -> Result<()> {
        lock(&self.local.sent).push(message.clone());

        if let Some(detail) = lock(&self.local.send_failure).clone() {
            return Err(BridgeError::TransmissionFailed(detail));
        }

        let peer = match self.peer() {
            None => return Ok(()),
            Some(peer) => peer?,
        };

        if !self.local.reachable.load(Ordering::Acquire) || !peer.activated.load(Ordering::Acquire)
        {
            return Err(BridgeError::TransmissionFailed("peer not reachable".into()));
        }

        peer.events
            .send(TransportEvent::MessageReceived(message))
            .map_err(|_| BridgeError::TransmissionFailed("peer session closed".into()))
    }
}

impl Transport for MemoryTransport {
    fn is_supported(&self) -> bool {
        self.local.supported.load(Ordering::Acquire)
    }

    fn activate(&self) {
        if !self.is_supported() {
            self.local.emit(TransportEvent::ActivationComplete {
                state: ActivationState::NotActivated,
                error: Some("transport not supported".into()),
            });
            return;
        }

        self.local.activated.store(true, Ordering::Release);
        self.local.emit(TransportEvent::ActivationComplete {
            state: ActivationState::Activated,
            error: None,
        });
    }

    fn is_reachable(&self) -> bool {
        if !self.local.reachable.load(Ordering::Acquire) {
            return false;
        }
        match self.peer() {
            None => true,
            Some(Ok(peer)) => peer.activated.load(Ordering::Acquire),
            Some(Err(_)) => false,
        }
    }

    fn send(&self, message: RawMessage) -> BoxFuture<'static, Result<()>> {
        let result = self.try_send(message);
        Box::pin(async move { result })
    }
}
