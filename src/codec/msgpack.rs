//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`, never `to_vec`: the peer expects struct-as-map
//! encoding, and a [`RawMessage`] must arrive as a map for
//! [`Envelope::decode`](crate::protocol::Envelope::decode) to find `method`.

use crate::error::Result;
use crate::protocol::RawMessage;

/// MessagePack codec for wire messages.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Encode an untyped wire message.
    #[inline]
    pub fn encode_message(message: &RawMessage) -> Result<Vec<u8>> {
        Self::encode(message)
    }

    /// Decode an untyped wire message.
    ///
    /// Fails if the payload is not a MsgPack map with string keys.
    #[inline]
    pub fn decode_message(bytes: &[u8]) -> Result<RawMessage> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use serde_json::{json, Value};

    #[test]
    fn test_message_round_trip() {
        for message in [Message::Increment, Message::Decrement, Message::SetCount(-42)] {
            let bytes = MsgPackCodec::encode_message(&message.encode()).unwrap();
            let raw = MsgPackCodec::decode_message(&bytes).unwrap();
            assert_eq!(Message::decode(&raw).unwrap(), message);
        }
    }

    #[test]
    fn test_encodes_as_map() {
        let bytes = MsgPackCodec::encode_message(&Message::SetCount(1).encode()).unwrap();

        // 0x82 = fixmap with 2 entries
        assert_eq!(bytes[0], 0x82, "Expected fixmap, got {:02X}", bytes[0]);
    }

    #[test]
    fn test_unknown_keys_survive() {
        let Value::Object(raw) = json!({"method": "increment", "origin": "watch"}) else {
            unreachable!()
        };
        let bytes = MsgPackCodec::encode_message(&raw).unwrap();
        let decoded = MsgPackCodec::decode_message(&bytes).unwrap();
        assert_eq!(decoded.get("origin"), Some(&json!("watch")));
    }

    #[test]
    fn test_non_map_payload_rejected() {
        let bytes = MsgPackCodec::encode(&vec![1, 2, 3]).unwrap();
        assert!(MsgPackCodec::decode_message(&bytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(MsgPackCodec::decode_message(b"not valid msgpack").is_err());
    }
}
