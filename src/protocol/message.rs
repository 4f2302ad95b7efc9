//! Typed messages and their untyped wire form.
//!
//! The peer speaks untyped key-value maps, so [`RawMessage`] stays an open
//! map. Everything past [`Message::decode`] works with the closed [`Message`]
//! enum instead.
//!
//! Decoding happens in two stages so that a well-formed message with an
//! unrecognized tag is distinguishable from a malformed one:
//!
//! 1. [`Envelope::decode`] extracts `method` as a string (`DecodeError` otherwise)
//! 2. [`Envelope::into_message`] resolves the tag (`UnknownMethod`) and
//!    extracts `data` where the tag requires it (`DecodeError`)
//!
//! # Example
//!
//! ```
//! use watch_bridge::protocol::Message;
//!
//! let raw = Message::SetCount(42).encode();
//! assert_eq!(serde_json::Value::Object(raw.clone()), serde_json::json!({"method": "setCount", "data": 42}));
//! assert_eq!(Message::decode(&raw).unwrap(), Message::SetCount(42));
//! ```

use serde_json::Value;

use super::method::{Method, DATA_KEY, METHOD_KEY};
use crate::error::{BridgeError, Result};

/// Untyped key-value map as carried by the transport.
pub type RawMessage = serde_json::Map<String, Value>;

/// A decoded wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Increment,
    Decrement,
    SetCount(i64),
}

impl Message {
    /// The tag this message travels under.
    pub fn method(&self) -> Method {
        match self {
            Message::Increment => Method::Increment,
            Message::Decrement => Method::Decrement,
            Message::SetCount(_) => Method::SetCount,
        }
    }

    /// Integer payload, present only for `setCount`.
    pub fn payload(&self) -> Option<i64> {
        match self {
            Message::SetCount(n) => Some(*n),
            Message::Increment | Message::Decrement => None,
        }
    }

    /// Encode into `{"method": tag}` or `{"method": tag, "data": n}`.
    pub fn encode(&self) -> RawMessage {
        let mut raw = RawMessage::new();
        raw.insert(
            METHOD_KEY.to_string(),
            Value::String(self.method().as_str().to_string()),
        );
        if let Some(n) = self.payload() {
            raw.insert(DATA_KEY.to_string(), Value::from(n));
        }
        raw
    }

    /// Decode an untyped map into a typed message.
    ///
    /// # Errors
    ///
    /// - `DecodeError` if `method` is missing or not a string, or if `data`
    ///   is missing or not an integer for `setCount`
    /// - `UnknownMethod` if the tag is not part of the vocabulary
    pub fn decode(raw: &RawMessage) -> Result<Self> {
        Envelope::decode(raw)?.into_message()
    }
}

/// A message whose tag has been extracted but not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The raw `method` string.
    pub tag: String,
    /// The raw `data` value, if any.
    pub data: Option<Value>,
}

impl Envelope {
    /// Extract `method` (and `data`, untouched) from an untyped map.
    pub fn decode(raw: &RawMessage) -> Result<Self> {
        let tag = match raw.get(METHOD_KEY) {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(BridgeError::DecodeError(format!(
                    "`{}` must be a string, got {}",
                    METHOD_KEY,
                    type_name(other)
                )))
            }
            None => {
                return Err(BridgeError::DecodeError(format!(
                    "missing `{}` key",
                    METHOD_KEY
                )))
            }
        };

        Ok(Self {
            tag,
            data: raw.get(DATA_KEY).cloned(),
        })
    }

    /// Resolve the tag against the vocabulary.
    pub fn method(&self) -> Result<Method> {
        self.tag.parse()
    }

    /// Resolve the tag and extract the payload the tag requires.
    ///
    /// A `data` key on a tag that takes no payload is ignored.
    pub fn into_message(self) -> Result<Message> {
        match self.method()? {
            Method::Increment => Ok(Message::Increment),
            Method::Decrement => Ok(Message::Decrement),
            Method::SetCount => match self.data {
                Some(ref value) => value.as_i64().map(Message::SetCount).ok_or_else(|| {
                    BridgeError::DecodeError(format!(
                        "`{}` for setCount must be an integer, got {}",
                        DATA_KEY, value
                    ))
                }),
                None => Err(BridgeError::DecodeError(format!(
                    "setCount requires `{}`",
                    DATA_KEY
                ))),
            },
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn raw(value: Value) -> RawMessage {
        match value {
            Value::Object(map) => map,
            other => panic!("test fixture must be an object, got {other}"),
        }
    }

    #[test]
    fn test_encode_increment_has_no_data_key() {
        let encoded = Message::Increment.encode();
        assert_eq!(encoded, raw(json!({"method": "increment"})));
        assert!(!encoded.contains_key(DATA_KEY));
    }

    #[test]
    fn test_encode_set_count() {
        assert_eq!(
            Message::SetCount(42).encode(),
            raw(json!({"method": "setCount", "data": 42}))
        );
    }

    #[test]
    fn test_round_trip_all_tags() {
        let samples = [
            Message::Increment,
            Message::Decrement,
            Message::SetCount(0),
            Message::SetCount(-7),
            Message::SetCount(i64::MIN),
            Message::SetCount(i64::MAX),
        ];
        for message in samples {
            assert_eq!(Message::decode(&message.encode()).unwrap(), message);
        }
    }

    #[test]
    fn test_missing_method_is_decode_error() {
        let err = Message::decode(&raw(json!({"data": 1}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);

        let err = Message::decode(&RawMessage::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn test_mistyped_method_is_decode_error() {
        let err = Message::decode(&raw(json!({"method": 3}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn test_unknown_tag_decodes_envelope_but_not_message() {
        let input = raw(json!({"method": "reset"}));

        let envelope = Envelope::decode(&input).unwrap();
        assert_eq!(envelope.tag, "reset");

        let err = envelope.into_message().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownMethod);
    }

    #[test]
    fn test_set_count_requires_integer_data() {
        let missing = Message::decode(&raw(json!({"method": "setCount"}))).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::DecodeError);

        let text = Message::decode(&raw(json!({"method": "setCount", "data": "42"}))).unwrap_err();
        assert_eq!(text.kind(), ErrorKind::DecodeError);

        let float = Message::decode(&raw(json!({"method": "setCount", "data": 4.5}))).unwrap_err();
        assert_eq!(float.kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn test_stray_data_on_increment_is_ignored() {
        let decoded = Message::decode(&raw(json!({"method": "increment", "data": 9}))).unwrap();
        assert_eq!(decoded, Message::Increment);
    }
}
