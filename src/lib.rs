//! # watch-bridge
//!
//! Bidirectional message bridge between a host application and its paired
//! companion device.
//!
//! The bridge relays counter commands (`increment`, `decrement`,
//! `setCount`) across an unreliable, asynchronous session and translates
//! between the typed call surface of the local application and the untyped
//! key-value maps the peer speaks.
//!
//! ## Architecture
//!
//! - **[`SessionManager`]**: owns the transport session and its activation state
//! - **[`OutboundDispatcher`]**: typed calls → tagged messages → transport
//! - **[`InboundRouter`]**: untyped messages → tag lookup → local handlers
//! - **[`protocol`]**: tag vocabulary and payload shapes shared by both directions
//!
//! Delivery is best effort: an inactive or unreachable session makes a send
//! fail, nothing is queued or retried.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use watch_bridge::{Bridge, CounterListener, Result};
//! use watch_bridge::transport::MemoryTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ((phone, phone_events), _watch) = MemoryTransport::pair();
//!     let bridge = Bridge::builder()
//!         .counter(Arc::new(MyApp::default()))
//!         .start(phone, phone_events);
//!
//!     bridge.wait_activated().await?;
//!     bridge.dispatcher().increment().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

mod bridge;

pub use bridge::{Bridge, BridgeBuilder, CounterListener};
pub use config::BridgeConfig;
pub use dispatcher::OutboundDispatcher;
pub use error::{BridgeError, ErrorKind, Result};
pub use protocol::{Message, Method};
pub use router::{InboundContext, InboundRouter};
pub use session::{ActivationState, SessionManager};
