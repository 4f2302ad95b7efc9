//! Method tags.
//!
//! Tags are plain strings on the wire. Only the three below are recognized;
//! anything else decodes fine as an [`Envelope`](super::Envelope) and is
//! rejected later as an unknown method.

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Key holding the method tag.
pub const METHOD_KEY: &str = "method";

/// Key holding the payload of payload-bearing tags.
pub const DATA_KEY: &str = "data";

/// The closed set of methods understood by both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Bump the counter by one.
    Increment,
    /// Lower the counter by one.
    Decrement,
    /// Overwrite the counter; carries an integer in `data`.
    SetCount,
}

impl Method {
    /// All recognized methods.
    pub const ALL: [Method; 3] = [Method::Increment, Method::Decrement, Method::SetCount];

    /// Wire tag for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Increment => "increment",
            Method::Decrement => "decrement",
            Method::SetCount => "setCount",
        }
    }

    /// Whether messages with this tag carry a `data` value.
    #[inline]
    pub fn has_payload(&self) -> bool {
        matches!(self, Method::SetCount)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = BridgeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == tag)
            .ok_or_else(|| BridgeError::UnknownMethod(tag.to_string()))
    }
}
