//! Handler registry keyed by method tag.
//!
//! The registry is filled while building a bridge and is read-only
//! afterwards; the router only ever looks handlers up.
//!
//! # Example
//!
//! ```ignore
//! use watch_bridge::protocol::{Message, Method};
//! use watch_bridge::router::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(Method::SetCount, |message: Message, _ctx| async move {
//!     println!("peer set count to {:?}", message.payload());
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;

use super::InboundContext;
use crate::error::Result;
use crate::protocol::{Message, Method};
use crate::transport::BoxFuture;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle a decoded inbound message.
    fn call(&self, message: Message, ctx: InboundContext) -> BoxFuture<'static, HandlerResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F, Fut>
where
    F: Fn(Message, InboundContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Message, InboundContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Wrap a closure.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(Message, InboundContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, message: Message, ctx: InboundContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(message, ctx))
    }
}

/// Registry mapping method tags to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Method, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for `method`, replacing any previous handler.
    pub fn register<F, Fut>(&mut self, method: Method, handler: F)
    where
        F: Fn(Message, InboundContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(method, Box::new(FnHandler::new(handler)));
    }

    /// Register a boxed handler for `method`, replacing any previous handler.
    pub fn register_handler(&mut self, method: Method, handler: Box<dyn Handler>) {
        if self.handlers.insert(method, handler).is_some() {
            tracing::debug!("Replaced handler for {}", method);
        }
    }

    /// Look up the handler for `method`.
    pub fn get(&self, method: Method) -> Option<&dyn Handler> {
        self.handlers.get(&method).map(|h| h.as_ref())
    }

    /// Whether `method` has a handler.
    pub fn contains(&self, method: Method) -> bool {
        self.handlers.contains_key(&method)
    }

    /// Methods with a registered handler.
    pub fn methods(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
