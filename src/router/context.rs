//! Context passed to inbound handlers.
//!
//! Carries the tag that selected the handler and, when the router runs
//! inside a bridge, the dispatcher back to the peer so a handler can reply.

use crate::dispatcher::OutboundDispatcher;
use crate::error::{BridgeError, Result};
use crate::protocol::{Message, Method};

/// Context for one inbound message.
///
/// `Clone` and safe to move into spawned tasks.
#[derive(Clone)]
pub struct InboundContext {
    method: Method,
    dispatcher: Option<OutboundDispatcher>,
}

impl InboundContext {
    /// Context whose replies go through `dispatcher`.
    pub fn new(method: Method, dispatcher: OutboundDispatcher) -> Self {
        Self {
            method,
            dispatcher: Some(dispatcher),
        }
    }

    /// Context without a session (for testing handlers in isolation).
    pub fn detached(method: Method) -> Self {
        Self {
            method,
            dispatcher: None,
        }
    }

    /// The tag of the message being handled.
    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Dispatcher towards the peer, if attached.
    pub fn dispatcher(&self) -> Option<&OutboundDispatcher> {
        self.dispatcher.as_ref()
    }

    /// Send a message back to the peer.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` for a detached context, otherwise whatever the
    /// dispatcher reports.
    pub async fn reply(&self, message: Message) -> Result<()> {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.call(message).await,
            None => Err(BridgeError::SessionUnavailable(
                "handler context has no session".into(),
            )),
        }
    }
}
