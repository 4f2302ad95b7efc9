//! Codec module - serialization of wire messages for byte-stream transports.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`, so maps stay maps)
//!
//! In-process transports hand [`RawMessage`](crate::protocol::RawMessage)
//! values over directly and never touch a codec.
//!
//! # Example
//!
//! ```
//! use watch_bridge::codec::MsgPackCodec;
//! use watch_bridge::protocol::Message;
//!
//! let bytes = MsgPackCodec::encode_message(&Message::SetCount(-3).encode()).unwrap();
//! let raw = MsgPackCodec::decode_message(&bytes).unwrap();
//! assert_eq!(Message::decode(&raw).unwrap(), Message::SetCount(-3));
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
