//! Session lifecycle.
//!
//! [`SessionManager`] owns the one transport session of the process and
//! tracks its activation state:
//!
//! ```text
//!                 activate()                  complete
//! NotActivated ──────────────> Activating ──────────────> Activated
//!      ▲                        ▲    │                        │
//!      │    complete with error │    │                        │ inactive /
//!      └────────────────────────┼────┘                        │ deactivated
//!                               │ activate()                  ↓
//!                               └──────────────────────── Deactivated
//! ```
//!
//! Lifecycle callbacks only update state and log. `Deactivated` is never
//! left on its own; the host must call [`SessionManager::activate`] again.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::error::{BridgeError, Result};
use crate::protocol::Message;
use crate::transport::Transport;

/// Activation state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationState {
    NotActivated,
    Activating,
    Activated,
    Deactivated,
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationState::NotActivated => "not activated",
            ActivationState::Activating => "activating",
            ActivationState::Activated => "activated",
            ActivationState::Deactivated => "deactivated",
        };
        f.write_str(name)
    }
}

/// Owner of the transport session.
///
/// Constructed once and shared by reference (`Arc`) between the dispatcher,
/// the router and the lifecycle event loop.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    state: watch::Sender<ActivationState>,
    unsupported: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl SessionManager {
    /// Wrap a transport. Nothing happens until [`activate`](Self::activate).
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(ActivationState::NotActivated);
        Self {
            transport,
            state,
            unsupported: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    /// Start activation.
    ///
    /// Idempotent while activating or activated. From `NotActivated` or
    /// `Deactivated` it moves to `Activating` and asks the transport to
    /// activate.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` if the transport is unsupported. The failure is
    /// also recorded; every later [`transmit`](Self::transmit) fails fast.
    pub fn activate(&self) -> Result<()> {
        if !self.transport.is_supported() {
            self.unsupported.store(true, Ordering::Release);
            self.record_error("transport not supported on this device");
            tracing::error!("Session transport is not supported on this device");
            return Err(BridgeError::SessionUnavailable(
                "transport not supported on this device".into(),
            ));
        }
        self.unsupported.store(false, Ordering::Release);

        let started = self.state.send_if_modified(|state| match state {
            ActivationState::NotActivated | ActivationState::Deactivated => {
                *state = ActivationState::Activating;
                true
            }
            ActivationState::Activating | ActivationState::Activated => false,
        });

        if started {
            tracing::info!("Activating session");
            self.transport.activate();
        } else {
            tracing::debug!("Session already {}", self.state());
        }
        Ok(())
    }

    /// Transport finished activating.
    pub fn on_activation_complete(&self, state: ActivationState, error: Option<String>) {
        match error {
            Some(ref detail) => {
                tracing::error!("Session activation error: {}", detail);
                self.record_error(detail);
            }
            None if state == ActivationState::Activated => self.clear_error(),
            None => {}
        }
        tracing::info!("Session activated with state: {}", state);
        self.state.send_replace(state);
    }

    /// Transport stopped accepting sends.
    pub fn on_became_inactive(&self) {
        tracing::warn!("Session did become inactive");
        self.state.send_replace(ActivationState::Deactivated);
    }

    /// Transport deactivated.
    pub fn on_deactivated(&self) {
        tracing::warn!("Session did deactivate");
        self.state.send_replace(ActivationState::Deactivated);
    }

    /// Current activation state.
    pub fn state(&self) -> ActivationState {
        *self.state.borrow()
    }

    /// Whether sends are currently valid.
    pub fn is_activated(&self) -> bool {
        !self.unsupported.load(Ordering::Acquire) && self.state() == ActivationState::Activated
    }

    /// Best-effort peer liveness as reported by the transport.
    pub fn is_reachable(&self) -> bool {
        self.transport.is_reachable()
    }

    /// Whether the last activation attempt found the transport unsupported.
    pub fn is_unsupported(&self) -> bool {
        self.unsupported.load(Ordering::Acquire)
    }

    /// Last recorded activation failure.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Watch activation state changes.
    pub fn subscribe(&self) -> watch::Receiver<ActivationState> {
        self.state.subscribe()
    }

    /// Wait until the session leaves `Activating`.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` unless the session ends up `Activated`.
    pub async fn wait_activated(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        loop {
            if self.is_unsupported() {
                return Err(self.unavailable());
            }

            let state = *rx.borrow_and_update();
            match state {
                ActivationState::Activated => return Ok(()),
                ActivationState::Activating => {}
                ActivationState::NotActivated | ActivationState::Deactivated => {
                    return Err(self.unavailable())
                }
            }

            if rx.changed().await.is_err() {
                return Err(self.unavailable());
            }
        }
    }

    /// Send a message to the peer.
    ///
    /// Fails fast with `SessionUnavailable` without touching the transport
    /// when the session is not activated. Otherwise hands the encoded message
    /// to the transport once; any transport error becomes
    /// `TransmissionFailed`.
    pub async fn transmit(&self, message: Message) -> Result<()> {
        if !self.is_activated() {
            return Err(self.unavailable());
        }

        match self.transport.send(message.encode()).await {
            Ok(()) => Ok(()),
            Err(e @ BridgeError::TransmissionFailed(_)) => Err(e),
            Err(e) => Err(BridgeError::TransmissionFailed(e.to_string())),
        }
    }

    fn unavailable(&self) -> BridgeError {
        if self.is_unsupported() {
            return BridgeError::SessionUnavailable("transport not supported on this device".into());
        }
        BridgeError::SessionUnavailable(format!("session {}", self.state()))
    }

    fn record_error(&self, detail: &str) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(detail.to_string());
    }

    fn clear_error(&self) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
