//! Paired Counter - a phone and a watch relaying counter commands.
//!
//! This demo demonstrates:
//! - Wiring two bridges over an in-process [`MemoryTransport`] pair
//! - Routing inbound `increment` / `decrement` to a [`CounterListener`]
//! - Issuing typed calls with the dispatcher and observing failures
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=watch_bridge=debug cargo run --example paired_counter
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use watch_bridge::transport::MemoryTransport;
use watch_bridge::{logging, Bridge, CounterListener, Message, Method, Result};

/// Phone-side counter shown in the UI.
#[derive(Default)]
struct PhoneCounter {
    value: AtomicI64,
}

impl CounterListener for PhoneCounter {
    async fn on_remote_increment(&self) -> Result<()> {
        let value = self.value.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("phone counter is now {}", value);
        Ok(())
    }

    async fn on_remote_decrement(&self) -> Result<()> {
        let value = self.value.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::info!("phone counter is now {}", value);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let ((phone_t, phone_events), (watch_t, watch_events)) = MemoryTransport::pair();

    let phone_counter = Arc::new(PhoneCounter::default());
    let phone = Bridge::builder()
        .counter(phone_counter.clone())
        .start(phone_t, phone_events);

    let watch_value = Arc::new(AtomicI64::new(0));
    let set_value = watch_value.clone();
    let watch = Bridge::builder()
        .handle(Method::SetCount, move |message: Message, _ctx| {
            if let Some(n) = message.payload() {
                set_value.store(n, Ordering::SeqCst);
                tracing::info!("watch counter set to {}", n);
            }
            async { Ok(()) }
        })
        .start(watch_t.clone(), watch_events);

    phone.wait_activated().await?;
    watch.wait_activated().await?;

    // Phone pushes its value to the watch
    phone.dispatcher().set_value(10).await?;

    // Watch buttons pressed
    watch.dispatcher().increment().await?;
    watch.dispatcher().increment().await?;
    watch.dispatcher().decrement().await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    tracing::info!(
        "phone = {}, watch = {}",
        phone_counter.value.load(Ordering::SeqCst),
        watch_value.load(Ordering::SeqCst)
    );

    // The watch goes away: sends fail, nothing is queued
    watch_t.deactivate();
    tokio::time::sleep(Duration::from_millis(10)).await;
    if let Err(e) = phone.dispatcher().set_value(11).await {
        tracing::warn!("as expected, relay failed: {}", e);
    }

    phone.shutdown().await;
    watch.shutdown().await;
    Ok(())
}
