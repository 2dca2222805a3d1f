//! The chat message carried by broadcast frames.
//!
//! Only the envelope fields common to every message kind are typed; the rest
//! of the object is preserved in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_are_kept() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "messageId": "m",
            "type": 1,
            "createdTime": 1700000000,
            "richFormat": {"v": 1}
        }))
        .unwrap();
        assert_eq!(msg.kind, Some(1));
        assert_eq!(msg.created_time, Some(1700000000));
        assert_eq!(msg.extra["richFormat"]["v"], 1);
    }
}
