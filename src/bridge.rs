//! Bridge builder and event loop.
//!
//! [`BridgeBuilder`] collects handlers, then [`BridgeBuilder::start`] wires
//! the pieces around a single session:
//! 1. Wrap the transport in a [`SessionManager`]
//! 2. Build the [`OutboundDispatcher`] and the [`InboundRouter`]
//! 3. Spawn the event loop (lifecycle → session, messages → router)
//! 4. Activate the session
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use watch_bridge::{Bridge, CounterListener, Result};
//! use watch_bridge::transport::MemoryTransport;
//!
//! struct App;
//!
//! impl CounterListener for App {
//!     async fn on_remote_increment(&self) -> Result<()> { Ok(()) }
//!     async fn on_remote_decrement(&self) -> Result<()> { Ok(()) }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ((phone, phone_events), _watch) = MemoryTransport::pair();
//!     let bridge = Bridge::builder()
//!         .counter(Arc::new(App))
//!         .start(phone, phone_events);
//!
//!     bridge.wait_activated().await?;
//!     bridge.dispatcher().set_value(42).await
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::dispatcher::OutboundDispatcher;
use crate::error::Result;
use crate::protocol::{Message, Method};
use crate::router::{HandlerRegistry, HandlerResult, InboundContext, InboundRouter};
use crate::session::SessionManager;
use crate::transport::{EventReceiver, Transport, TransportEvent};

/// Local business logic notified of counter changes made on the peer.
pub trait CounterListener: Send + Sync + 'static {
    /// The peer incremented its counter.
    fn on_remote_increment(&self) -> impl Future<Output = Result<()>> + Send;

    /// The peer decremented its counter.
    fn on_remote_decrement(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Builder for configuring and starting a [`Bridge`].
pub struct BridgeBuilder {
    registry: HandlerRegistry,
    config: BridgeConfig,
}

impl BridgeBuilder {
    /// Create a new bridge builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: BridgeConfig::default(),
        }
    }

    /// Register a handler for an inbound method.
    pub fn handle<F, Fut>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(Message, InboundContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(method, handler);
        self
    }

    /// Route inbound `increment` / `decrement` to `listener`.
    ///
    /// The outcome is only logged; the peer never learns whether the local
    /// side applied the change.
    pub fn counter<L: CounterListener>(self, listener: Arc<L>) -> Self {
        let on_increment = listener.clone();
        let on_decrement = listener;

        self.handle(Method::Increment, move |_message, _ctx| {
            let listener = on_increment.clone();
            async move {
                listener.on_remote_increment().await?;
                tracing::info!("Increment relayed to app");
                Ok(())
            }
        })
        .handle(Method::Decrement, move |_message, _ctx| {
            let listener = on_decrement.clone();
            async move {
                listener.on_remote_decrement().await?;
                tracing::info!("Decrement relayed to app");
                Ok(())
            }
        })
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of concurrently running inbound handlers.
    ///
    /// When this limit is reached, new messages are dropped with a warning.
    /// Default: 256
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.config.max_concurrent_handlers = limit;
        self
    }

    /// Wire everything around `transport` and activate the session.
    ///
    /// Never fails: an unsupported transport is logged and recorded on the
    /// session, and every outbound call then fails with
    /// `SessionUnavailable`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T: Transport>(self, transport: T, events: EventReceiver) -> Bridge {
        let session = Arc::new(SessionManager::new(Arc::new(transport)));
        let dispatcher = OutboundDispatcher::new(session.clone());
        let router = Arc::new(InboundRouter::with_capacity(
            self.registry,
            dispatcher.clone(),
            self.config.max_concurrent_handlers,
        ));

        let event_task = tokio::spawn(event_loop(events, session.clone(), router.clone()));

        if let Err(e) = session.activate() {
            tracing::debug!("Bridge started without an active session: {}", e);
        }

        Bridge {
            session,
            dispatcher,
            router,
            event_task,
        }
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running bridge.
///
/// Dropping it stops the event loop; inbound messages are no longer routed.
pub struct Bridge {
    session: Arc<SessionManager>,
    dispatcher: OutboundDispatcher,
    router: Arc<InboundRouter>,
    event_task: JoinHandle<()>,
}

impl Bridge {
    /// Create a new bridge builder.
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Typed calls towards the peer.
    pub fn dispatcher(&self) -> &OutboundDispatcher {
        &self.dispatcher
    }

    /// The session shared by all components.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The inbound router.
    pub fn router(&self) -> &Arc<InboundRouter> {
        &self.router
    }

    /// Wait for the initial activation to finish.
    pub async fn wait_activated(&self) -> Result<()> {
        self.session.wait_activated().await
    }

    /// Stop the event loop and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.event_task.abort();
        let _ = (&mut self.event_task).await;
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

/// Route transport events until the transport's event channel closes.
async fn event_loop(
    mut events: EventReceiver,
    session: Arc<SessionManager>,
    router: Arc<InboundRouter>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::ActivationComplete { state, error } => {
                session.on_activation_complete(state, error)
            }
            TransportEvent::BecameInactive => session.on_became_inactive(),
            TransportEvent::Deactivated => session.on_deactivated(),
            TransportEvent::MessageReceived(raw) => {
                // Rejections are logged and counted by the router. Awaiting
                // keeps handler start order equal to delivery order.
                let _ = router.on_message(raw).await;
            }
        }
    }
    tracing::debug!("Transport event channel closed");
}
