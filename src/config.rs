//! Bridge configuration.
//!
//! All fields have defaults, so a partial JSON document (or none at all) is
//! a valid configuration.
//!
//! ```
//! use watch_bridge::BridgeConfig;
//!
//! let config = BridgeConfig::from_json(r#"{"max_concurrent_handlers": 8}"#).unwrap();
//! assert_eq!(config.max_concurrent_handlers, 8);
//! assert_eq!(config.stream.channel_capacity, 1024);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default maximum concurrent inbound handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Default stream writer queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default stream read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bound of the inbound worker pool. Messages beyond it are dropped.
    pub max_concurrent_handlers: usize,
    /// Settings for [`StreamTransport`](crate::transport::StreamTransport).
    pub stream: StreamConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            stream: StreamConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Byte-stream transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Writer queue capacity.
    pub channel_capacity: usize,
    /// Largest accepted inbound frame payload, in bytes.
    pub max_frame_size: u32,
    /// Size of the read buffer.
    pub read_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_concurrent_handlers, DEFAULT_MAX_CONCURRENT_HANDLERS);
        assert_eq!(config.stream.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.stream.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.stream.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(BridgeConfig::from_json("{}").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_nested_override() {
        let config = BridgeConfig::from_json(r#"{"stream": {"max_frame_size": 512}}"#).unwrap();
        assert_eq!(config.stream.max_frame_size, 512);
        assert_eq!(config.stream.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.max_concurrent_handlers, DEFAULT_MAX_CONCURRENT_HANDLERS);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(BridgeConfig::from_json(r#"{"max_concurrent_handlers": "many"}"#).is_err());
    }
}
