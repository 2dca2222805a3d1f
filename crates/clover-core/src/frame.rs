//! Websocket wire frames.
//!
//! Every frame is a JSON object with an integer discriminant `t`. Outbound
//! frames carry the request type plus arbitrary fields; inbound frames are
//! either a broadcast (`msg`) or an acknowledgement (`serverAck`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, CloverError};
use crate::message::ChatMessage;

/// Request type reserved for keepalive pings.
pub const PING_REQUEST: i64 = 8;

/// Inbound message-type tags the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A chat message pushed to every subscriber.
    Message,
    /// Outcome of a specific request, keyed by `seqId`.
    Ack,
}

impl EventType {
    pub const fn code(self) -> i64 {
        match self {
            Self::Message => 1,
            Self::Ack => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Message),
            2 => Some(Self::Ack),
            _ => None,
        }
    }
}

/// An outbound request frame: `{"t": <type>, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub t: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OutboundRequest {
    pub fn new(request_type: i64) -> Self {
        Self {
            t: request_type,
            fields: Map::new(),
        }
    }

    /// Build from a field map. A `t` key in `fields` is dropped; the
    /// discriminant always comes from `request_type`.
    pub fn from_fields(request_type: i64, mut fields: Map<String, Value>) -> Self {
        fields.remove("t");
        Self {
            t: request_type,
            fields,
        }
    }

    /// The keepalive frame.
    pub fn ping() -> Self {
        Self::new(PING_REQUEST)
    }

    /// Add a field. `t` is reserved and ignored here.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "t" {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn to_text(&self) -> Result<String, CloverError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The `serverAck` block of an acknowledgement frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAck {
    #[serde(rename = "seqId")]
    pub seq_id: i64,
    #[serde(rename = "apiCode", default)]
    pub api_code: i64,
    /// Everything else the server put in the block (e.g. `data`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerAck {
    pub fn is_success(&self) -> bool {
        self.api_code == 0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// The block as a JSON object, `seqId` and `apiCode` included.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object = self.extra.clone();
        object.insert("seqId".into(), self.seq_id.into());
        object.insert("apiCode".into(), self.api_code.into());
        object
    }

    /// `Ok(self)` for `apiCode == 0`, otherwise the decoded API error.
    pub fn into_result(self) -> Result<Self, CloverError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CloverError::Api(ApiError::from_object(&self.to_object())))
        }
    }
}

/// A decoded inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Broadcast(ChatMessage),
    Acknowledgement(ServerAck),
    /// A `t` this client does not know; ignored by the dispatcher.
    Other(i64),
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self, CloverError> {
        let mut value: Value = serde_json::from_str(text)?;
        let t = value
            .get("t")
            .and_then(Value::as_i64)
            .ok_or_else(|| CloverError::BadResponse("frame has no integer `t`".into()))?;

        match EventType::from_code(t) {
            Some(EventType::Message) => {
                let msg = take_field(&mut value, "msg")?;
                Ok(Self::Broadcast(serde_json::from_value(msg)?))
            }
            Some(EventType::Ack) => {
                let ack = take_field(&mut value, "serverAck")?;
                Ok(Self::Acknowledgement(serde_json::from_value(ack)?))
            }
            None => Ok(Self::Other(t)),
        }
    }
}

fn take_field(value: &mut Value, key: &str) -> Result<Value, CloverError> {
    value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| CloverError::BadResponse(format!("frame is missing `{key}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_keeps_discriminant_and_fields() {
        let req = OutboundRequest::new(5).with("foo", "bar").with("seqId", 42);
        let text = req.to_text().unwrap();
        let back: OutboundRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, req);
        assert_eq!(back.t, 5);
        assert_eq!(back.fields.len(), 2);
    }

    #[test]
    fn t_field_cannot_be_overridden() {
        let fields = json!({"t": 99, "a": 1}).as_object().unwrap().clone();
        let req = OutboundRequest::from_fields(3, fields).with("t", 100);
        let value: Value = serde_json::from_str(&req.to_text().unwrap()).unwrap();
        assert_eq!(value, json!({"t": 3, "a": 1}));
    }

    #[test]
    fn ping_frame() {
        assert_eq!(OutboundRequest::ping().to_text().unwrap(), r#"{"t":8}"#);
    }

    #[test]
    fn decode_ack() {
        let text = r#"{"t":2,"serverAck":{"seqId":42,"apiCode":0,"data":"ok"}}"#;
        let InboundFrame::Acknowledgement(ack) = InboundFrame::decode(text).unwrap() else {
            panic!("expected ack");
        };
        assert_eq!(ack.seq_id, 42);
        assert!(ack.is_success());
        assert_eq!(ack.get("data"), Some(&json!("ok")));
        assert_eq!(
            Value::Object(ack.to_object()),
            json!({"seqId": 42, "apiCode": 0, "data": "ok"})
        );
    }

    #[test]
    fn failed_ack_into_api_error() {
        let ack: ServerAck = serde_json::from_value(json!({"seqId": 1, "apiCode": 7})).unwrap();
        let err = ack.into_result().unwrap_err();
        assert_eq!(err.api_code(), Some(7));
    }

    #[test]
    fn decode_broadcast() {
        let text = r#"{"t":1,"msg":{"messageId":"m1","threadId":"th","uid":9,"content":"hi"}}"#;
        let InboundFrame::Broadcast(msg) = InboundFrame::decode(text).unwrap() else {
            panic!("expected broadcast");
        };
        assert_eq!(msg.message_id.as_deref(), Some("m1"));
        assert_eq!(msg.content.as_deref(), Some("hi"));
    }

    #[test]
    fn unknown_type_is_other() {
        assert_eq!(
            InboundFrame::decode(r#"{"t":77,"x":1}"#).unwrap(),
            InboundFrame::Other(77)
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(InboundFrame::decode("not json").is_err());
        assert!(InboundFrame::decode(r#"{"x":1}"#).is_err());
        assert!(InboundFrame::decode(r#"{"t":2}"#).is_err());
    }
}
