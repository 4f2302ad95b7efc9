//! Protocol module - tag vocabulary, message shapes, and stream framing.
//!
//! This module is the single source of truth for what travels between the
//! two paired processes:
//! - [`Method`] - the closed tag vocabulary (`increment`, `decrement`, `setCount`)
//! - [`Message`] - the typed form of a wire message after decoding
//! - [`RawMessage`] - the untyped key-value map the transports carry
//! - [`FrameBuffer`] - length-prefixed framing for byte-stream transports

mod frame;
mod message;
mod method;

pub use frame::{build_frame, FrameBuffer, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
pub use message::{Envelope, Message, RawMessage};
pub use method::{Method, DATA_KEY, METHOD_KEY};
