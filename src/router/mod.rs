//! Inbound routing - decode, look up, dispatch.
//!
//! [`InboundRouter::on_message`] is the session's message-received
//! callback. For every raw message it:
//! 1. decodes the tag (`DecodeError` if missing or mistyped)
//! 2. resolves it against the vocabulary and the registry (`UnknownMethod`)
//! 3. spawns the handler future and waits until it first suspends
//!
//! Rejected messages are logged and counted, never propagated to the
//! transport. Handler futures run concurrently, bounded by a semaphore, so a
//! slow or failing handler cannot hold up the next message. Handlers start in
//! delivery order; once suspended, they complete in any order.

mod context;
mod registry;

use std::future::{poll_fn, Future};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::config::DEFAULT_MAX_CONCURRENT_HANDLERS;
use crate::dispatcher::OutboundDispatcher;
use crate::error::{BridgeError, ErrorKind, Result};
use crate::protocol::{Envelope, RawMessage};

pub use context::InboundContext;
pub use registry::{FnHandler, Handler, HandlerRegistry, HandlerResult};

/// Snapshot of router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Messages handed to a handler.
    pub dispatched: u64,
    /// Messages rejected as malformed.
    pub decode_errors: u64,
    /// Messages with an unrecognized or unhandled tag.
    pub unknown_methods: u64,
    /// Handler futures that resolved to an error.
    pub handler_failures: u64,
    /// Messages dropped because the worker pool was full.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    decode_errors: AtomicU64,
    unknown_methods: AtomicU64,
    handler_failures: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_methods: self.unknown_methods.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Demultiplexer for inbound messages.
pub struct InboundRouter {
    registry: HandlerRegistry,
    dispatcher: OutboundDispatcher,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl InboundRouter {
    /// Create a router with the default worker pool bound.
    pub fn new(registry: HandlerRegistry, dispatcher: OutboundDispatcher) -> Self {
        Self::with_capacity(registry, dispatcher, DEFAULT_MAX_CONCURRENT_HANDLERS)
    }

    /// Create a router allowing at most `max_concurrent_handlers` running handlers.
    ///
    /// Limits above [`Semaphore::MAX_PERMITS`] are clamped to it.
    pub fn with_capacity(
        registry: HandlerRegistry,
        dispatcher: OutboundDispatcher,
        max_concurrent_handlers: usize,
    ) -> Self {
        let permits = max_concurrent_handlers.min(Semaphore::MAX_PERMITS);
        Self {
            registry,
            dispatcher,
            semaphore: Arc::new(Semaphore::new(permits)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Handle one raw message from the transport.
    ///
    /// Resolves once the handler has run up to its first suspension point,
    /// so handlers start in delivery order when calls are awaited in
    /// sequence. Returns the handle of the task driving the rest of the
    /// handler. The error is for observability only; callers on the
    /// transport side ignore it.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn on_message(&self, raw: RawMessage) -> Result<JoinHandle<()>> {
        let message = match Envelope::decode(&raw).and_then(Envelope::into_message) {
            Ok(message) => message,
            Err(e) => {
                self.record_rejection(&e, &raw);
                return Err(e);
            }
        };

        let method = message.method();
        let handler = match self.registry.get(method) {
            Some(handler) => handler,
            None => {
                let e = BridgeError::UnknownMethod(format!("no handler registered for {}", method));
                self.record_rejection(&e, &raw);
                return Err(e);
            }
        };

        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                Counters::bump(&self.counters.dropped);
                tracing::warn!("Handler capacity reached, dropping {} from peer", method);
                return Err(BridgeError::HandlerCapacity(method.to_string()));
            }
        };

        let ctx = InboundContext::new(method, self.dispatcher.clone());
        let mut fut = handler.call(message, ctx);
        Counters::bump(&self.counters.dispatched);

        let (started_tx, started_rx) = oneshot::channel();
        let mut started_tx = Some(started_tx);
        let counters = self.counters.clone();
        let task = tokio::spawn(async move {
            // Permit is held until this task completes
            let _permit = permit;

            let outcome = poll_fn(|cx| {
                let poll = fut.as_mut().poll(cx);
                if let Some(tx) = started_tx.take() {
                    let _ = tx.send(());
                }
                poll
            })
            .await;

            match outcome {
                Ok(()) => tracing::debug!("{} from peer handled", method),
                Err(e) => {
                    Counters::bump(&counters.handler_failures);
                    tracing::warn!("Handler for {} failed: {}", method, e);
                }
            }
        });

        // Err only if the handler panicked on its first poll
        let _ = started_rx.await;
        Ok(task)
    }

    /// Current counters.
    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }

    /// The (immutable) handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Handler slots currently free.
    pub fn available_capacity(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn record_rejection(&self, error: &BridgeError, raw: &RawMessage) {
        match error.kind() {
            ErrorKind::UnknownMethod => {
                Counters::bump(&self.counters.unknown_methods);
                tracing::warn!("Unknown method received: {}", error);
            }
            _ => {
                Counters::bump(&self.counters.decode_errors);
                tracing::error!("Invalid message from peer: {} ({:?})", error, raw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Message, Method};
    use crate::session::{ActivationState, SessionManager};
    use crate::transport::MemoryTransport;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn raw(value: Value) -> RawMessage {
        match value {
            Value::Object(map) => map,
            other => panic!("test fixture must be an object, got {other}"),
        }
    }

    fn dispatcher() -> (OutboundDispatcher, MemoryTransport) {
        let (transport, _events) = MemoryTransport::new();
        let session = Arc::new(SessionManager::new(Arc::new(transport.clone())));
        session.activate().unwrap();
        session.on_activation_complete(ActivationState::Activated, None);
        (OutboundDispatcher::new(session), transport)
    }

    /// Registry recording every handled message; `decrement` fails.
    fn recording_registry(log: Arc<Mutex<Vec<Message>>>) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        for method in [Method::Increment, Method::SetCount] {
            let log = log.clone();
            registry.register(method, move |message, _ctx| {
                log.lock().unwrap().push(message);
                async { Ok(()) }
            });
        }
        let log_failing = log.clone();
        registry.register(Method::Decrement, move |message, _ctx| {
            log_failing.lock().unwrap().push(message);
            async { Err(BridgeError::downstream("app rejected decrement")) }
        });
        registry
    }

    fn router() -> (InboundRouter, Arc<Mutex<Vec<Message>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, _transport) = dispatcher();
        (InboundRouter::new(recording_registry(log.clone()), dispatcher), log)
    }

    #[tokio::test]
    async fn test_dispatches_to_matching_handler() {
        let (router, log) = router();

        router.on_message(raw(json!({"method": "increment"}))).await.unwrap().await.unwrap();
        router
            .on_message(raw(json!({"method": "setCount", "data": -5})))
            .await
            .unwrap()
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![Message::Increment, Message::SetCount(-5)]);
        assert_eq!(router.stats().dispatched, 2);
    }

    #[tokio::test]
    async fn test_missing_method_invokes_nothing() {
        let (router, log) = router();

        let err = router.on_message(raw(json!({"data": 1}))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);

        let err = router.on_message(raw(json!({"method": ["increment"]}))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(router.stats().decode_errors, 2);
        assert_eq!(router.stats().dispatched, 0);
    }

    #[tokio::test]
    async fn test_unknown_tag_invokes_nothing() {
        let (router, log) = router();

        let err = router.on_message(raw(json!({"method": "reset"}))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownMethod);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(router.stats().unknown_methods, 1);
    }

    #[tokio::test]
    async fn test_unregistered_tag_is_unknown_method() {
        let (dispatcher, _transport) = dispatcher();
        let mut registry = HandlerRegistry::new();
        registry.register(Method::Increment, |_msg, _ctx| async { Ok(()) });
        let router = InboundRouter::new(registry, dispatcher);

        let err = router.on_message(Message::SetCount(3).encode()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownMethod);
        assert_eq!(router.stats().unknown_methods, 1);
    }

    #[tokio::test]
    async fn test_set_count_without_data_is_decode_error() {
        let (router, log) = router();

        let err = router.on_message(raw(json!({"method": "setCount"}))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_handler_does_not_poison_router() {
        let (router, log) = router();

        router.on_message(Message::Decrement.encode()).await.unwrap().await.unwrap();
        router.on_message(Message::Increment.encode()).await.unwrap().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec![Message::Decrement, Message::Increment]);
        let stats = router.stats();
        assert_eq!(stats.handler_failures, 1);
        assert_eq!(stats.dispatched, 2);
    }

    #[tokio::test]
    async fn test_near_simultaneous_messages_keep_delivery_order() {
        let (router, log) = router();

        let first = router.on_message(Message::Increment.encode()).await.unwrap();
        let second = router.on_message(Message::Decrement.encode()).await.unwrap();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec![Message::Increment, Message::Decrement]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deferred_handler_bodies_start_in_delivery_order() {
        let (dispatcher, _transport) = dispatcher();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut registry = HandlerRegistry::new();
        for method in [Method::Increment, Method::Decrement] {
            let log = log.clone();
            registry.register(method, move |message, _ctx| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(message);
                    tokio::task::yield_now().await;
                    Ok(())
                }
            });
        }
        let router = InboundRouter::new(registry, dispatcher);

        for _ in 0..200 {
            log.lock().unwrap().clear();
            let first = router.on_message(Message::Increment.encode()).await.unwrap();
            let second = router.on_message(Message::Decrement.encode()).await.unwrap();
            first.await.unwrap();
            second.await.unwrap();
            assert_eq!(*log.lock().unwrap(), vec![Message::Increment, Message::Decrement]);
        }
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_clamped() {
        let (dispatcher, _transport) = dispatcher();
        let router = InboundRouter::with_capacity(HandlerRegistry::new(), dispatcher, usize::MAX);
        assert_eq!(router.available_capacity(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn test_slow_handler_does_not_block_next_message() {
        let (dispatcher, _transport) = dispatcher();
        let gate = Arc::new(Notify::new());
        let done = Arc::new(Mutex::new(Vec::new()));

        let mut registry = HandlerRegistry::new();
        {
            let gate = gate.clone();
            let done = done.clone();
            registry.register(Method::Increment, move |_msg, _ctx| {
                let gate = gate.clone();
                let done = done.clone();
                async move {
                    gate.notified().await;
                    done.lock().unwrap().push(Method::Increment);
                    Ok(())
                }
            });
        }
        {
            let done = done.clone();
            registry.register(Method::Decrement, move |_msg, _ctx| {
                let done = done.clone();
                async move {
                    done.lock().unwrap().push(Method::Decrement);
                    Ok(())
                }
            });
        }
        let router = InboundRouter::new(registry, dispatcher);

        let slow = router.on_message(Message::Increment.encode()).await.unwrap();
        router.on_message(Message::Decrement.encode()).await.unwrap().await.unwrap();
        assert_eq!(*done.lock().unwrap(), vec![Method::Decrement]);

        gate.notify_one();
        slow.await.unwrap();
        assert_eq!(*done.lock().unwrap(), vec![Method::Decrement, Method::Increment]);
    }

    #[tokio::test]
    async fn test_full_pool_drops_message() {
        let (dispatcher, _transport) = dispatcher();
        let gate = Arc::new(Notify::new());

        let mut registry = HandlerRegistry::new();
        {
            let gate = gate.clone();
            registry.register(Method::Increment, move |_msg, _ctx| {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok(())
                }
            });
        }
        let router = InboundRouter::with_capacity(registry, dispatcher, 1);

        let busy = router.on_message(Message::Increment.encode()).await.unwrap();
        assert_eq!(router.available_capacity(), 0);

        let err = router.on_message(Message::Increment.encode()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandlerCapacity);
        assert_eq!(router.stats().dropped, 1);

        gate.notify_one();
        busy.await.unwrap();
        assert_eq!(router.available_capacity(), 1);
    }

    #[tokio::test]
    async fn test_handler_can_reply_to_peer() {
        let (dispatcher, transport) = dispatcher();
        let mut registry = HandlerRegistry::new();
        registry.register(Method::Increment, |_msg, ctx: InboundContext| async move {
            ctx.reply(Message::SetCount(1)).await
        });
        let router = InboundRouter::new(registry, dispatcher);

        router.on_message(Message::Increment.encode()).await.unwrap().await.unwrap();
        assert_eq!(transport.sent(), vec![Message::SetCount(1).encode()]);
    }
}
