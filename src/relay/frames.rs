//! Wire frames exchanged over the `/ws` socket.

use serde::{Deserialize, Serialize};

use crate::db::{Message, UserId};

/// Client → server. Any `id` or `timestamp` the client sends is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

impl ClientMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message {
        message: Message,
        direction: Direction,
    },
    UserStatus {
        user_id: UserId,
        username: String,
        online: bool,
    },
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn message_frame_shape() {
        let frame = ServerFrame::Message {
            message: Message {
                id: 7,
                sender_id: 1,
                receiver_id: 2,
                content: "hi".to_owned(),
                timestamp: datetime!(2024-05-01 12:00:00 UTC),
            },
            direction: Direction::Incoming,
        };

        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, json!({
            "type": "message",
            "message": {
                "id": 7,
                "sender_id": 1,
                "receiver_id": 2,
                "content": "hi",
                "timestamp": "2024-05-01T12:00:00Z",
            },
            "direction": "incoming",
        }));
    }

    #[test]
    fn status_frame_shape() {
        let frame = ServerFrame::UserStatus { user_id: 3, username: "charlie".to_owned(), online: false };
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "user_status", "user_id": 3, "username": "charlie", "online": false}));
    }

    #[test]
    fn client_supplied_id_and_timestamp_are_ignored() {
        let msg = ClientMessage::decode(
            br#"{"id":99,"timestamp":"yesterday","sender_id":1,"receiver_id":2,"content":"hi"}"#,
        )
        .unwrap();
        assert_eq!((msg.sender_id, msg.receiver_id, msg.content.as_str()), (1, 2, "hi"));
    }

    #[test]
    fn missing_receiver_does_not_decode() {
        assert!(ClientMessage::decode(br#"{"sender_id":1,"content":"hi"}"#).is_err());
    }
}
