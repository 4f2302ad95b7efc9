//! Typed call surface towards the peer.
//!
//! [`OutboundDispatcher`] is stateless: each call builds one [`Message`],
//! hands it to the [`SessionManager`] and reports the outcome. There is no
//! retry and no local state to roll back on failure.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::Message;
use crate::session::SessionManager;

/// Outbound calls to the paired device.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct OutboundDispatcher {
    session: Arc<SessionManager>,
}

impl OutboundDispatcher {
    /// Create a dispatcher over a session.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Ask the peer to increment its counter.
    pub async fn increment(&self) -> Result<()> {
        tracing::debug!("increment() called");
        self.call(Message::Increment).await
    }

    /// Ask the peer to decrement its counter.
    pub async fn decrement(&self) -> Result<()> {
        tracing::debug!("decrement() called");
        self.call(Message::Decrement).await
    }

    /// Ask the peer to overwrite its counter with `value`.
    ///
    /// `value` is opaque payload; no bounds are checked here.
    pub async fn set_value(&self, value: i64) -> Result<()> {
        tracing::debug!("set_value({}) called", value);
        self.call(Message::SetCount(value)).await
    }

    /// Send an already-built message.
    pub async fn call(&self, message: Message) -> Result<()> {
        let result = self.session.transmit(message).await;
        if let Err(ref e) = result {
            tracing::warn!("Failed to send {} to peer: {}", message.method(), e);
        }
        result
    }

    /// The session this dispatcher sends through.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::ActivationState;
    use crate::transport::MemoryTransport;
    use serde_json::json;

    fn activated() -> (OutboundDispatcher, MemoryTransport) {
        let (transport, _events) = MemoryTransport::new();
        let session = Arc::new(SessionManager::new(Arc::new(transport.clone())));
        session.activate().unwrap();
        session.on_activation_complete(ActivationState::Activated, None);
        (OutboundDispatcher::new(session), transport)
    }

    fn inactive() -> (OutboundDispatcher, MemoryTransport) {
        let (transport, _events) = MemoryTransport::new();
        let session = Arc::new(SessionManager::new(Arc::new(transport.clone())));
        (OutboundDispatcher::new(session), transport)
    }

    #[tokio::test]
    async fn test_increment_sends_bare_tag() {
        let (dispatcher, transport) = activated();
        dispatcher.increment().await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(serde_json::Value::Object(sent[0].clone()), json!({"method": "increment"}));
        assert!(!sent[0].contains_key("data"));
    }

    #[tokio::test]
    async fn test_decrement_sends_bare_tag() {
        let (dispatcher, transport) = activated();
        dispatcher.decrement().await.unwrap();

        assert_eq!(transport.sent(), vec![Message::Decrement.encode()]);
    }

    #[tokio::test]
    async fn test_set_value_sends_payload() {
        let (dispatcher, transport) = activated();
        dispatcher.set_value(42).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            serde_json::Value::Object(sent[0].clone()),
            json!({"method": "setCount", "data": 42})
        );
    }

    #[tokio::test]
    async fn test_inactive_session_never_sends() {
        let (dispatcher, transport) = inactive();

        for result in [
            dispatcher.increment().await,
            dispatcher.decrement().await,
            dispatcher.set_value(7).await,
        ] {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::SessionUnavailable);
        }
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_to_caller() {
        let (dispatcher, transport) = activated();
        transport.fail_sends(Some("not paired"));

        let err = dispatcher.set_value(-1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransmissionFailed);
        assert_eq!(transport.send_count(), 1);
    }
}
