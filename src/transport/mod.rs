//! Transport module - the session contract the bridge drives.
//!
//! A [`Transport`] is the native messaging API of the platform seen from
//! the bridge: it can be activated, it transmits untyped maps, and it
//! reports lifecycle changes and inbound messages as [`TransportEvent`]s on
//! an event channel created with [`event_channel`].
//!
//! Implementations:
//! - [`MemoryTransport`] - in-process paired endpoints, for tests and demos
//! - [`StreamTransport`] - framed MsgPack over any `AsyncRead + AsyncWrite`

mod memory;
mod stream;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::RawMessage;
use crate::session::ActivationState;

pub use memory::MemoryTransport;
pub use stream::StreamTransport;

/// Boxed future for transport results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sending half of a transport event channel.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a transport event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create a transport event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Notifications delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Activation finished, successfully or not.
    ActivationComplete {
        /// State the transport settled in.
        state: ActivationState,
        /// Platform error detail, if activation failed.
        error: Option<String>,
    },
    /// The session stopped accepting sends and is about to deactivate.
    BecameInactive,
    /// The session is deactivated.
    Deactivated,
    /// A message arrived from the peer.
    MessageReceived(RawMessage),
}

/// The native session API of the platform.
///
/// Methods may be called concurrently from any task.
pub trait Transport: Send + Sync + 'static {
    /// Whether this device supports the transport at all.
    fn is_supported(&self) -> bool;

    /// Begin activation. Completion arrives as
    /// [`TransportEvent::ActivationComplete`].
    fn activate(&self);

    /// Best-effort peer liveness.
    fn is_reachable(&self) -> bool;

    /// Transmit a message to the peer.
    ///
    /// Resolves once the message has been handed off. There is no delivery
    /// acknowledgement; an `Err` means transmission failed.
    fn send(&self, message: RawMessage) -> BoxFuture<'static, Result<()>>;
}
