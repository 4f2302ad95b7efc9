//! Error types for watch-bridge.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Transport unsupported, not yet activated, or deactivated.
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// The transport reported a send error.
    #[error("Transmission failed: {0}")]
    TransmissionFailed(String),

    /// Malformed inbound message (missing or mistyped `method` / `data`).
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Well-formed message whose tag has no recognized method or handler.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A local collaborator reported failure while handling a relayed call.
    #[error("Downstream call failed: {0}")]
    Downstream(String),

    /// Inbound worker pool is full, message dropped.
    #[error("Handler capacity reached: {0}")]
    HandlerCapacity(String),

    /// I/O error on a stream transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Rejected local setup, e.g. a malformed log filter.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stream transport writer has shut down.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SessionUnavailable,
    TransmissionFailed,
    DecodeError,
    UnknownMethod,
    Downstream,
    HandlerCapacity,
    InvalidConfig,
    Io,
    Codec,
    ConnectionClosed,
}

impl BridgeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionUnavailable(_) => ErrorKind::SessionUnavailable,
            Self::TransmissionFailed(_) => ErrorKind::TransmissionFailed,
            Self::DecodeError(_) => ErrorKind::DecodeError,
            Self::UnknownMethod(_) => ErrorKind::UnknownMethod,
            Self::Downstream(_) => ErrorKind::Downstream,
            Self::HandlerCapacity(_) => ErrorKind::HandlerCapacity,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::MsgPackEncode(_) | Self::MsgPackDecode(_) => ErrorKind::Codec,
            Self::ConnectionClosed => ErrorKind::ConnectionClosed,
        }
    }

    /// Build a [`BridgeError::Downstream`] from any displayable error.
    pub fn downstream(detail: impl std::fmt::Display) -> Self {
        Self::Downstream(detail.to_string())
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
