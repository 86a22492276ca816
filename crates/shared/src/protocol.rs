//! Push protocol: inbound frame classification and outbound room commands.
//!
//! Every frame on the wire is a JSON object `{"type": ..., "data": ...}`,
//! optionally carrying an `id` and a `ts`. Outbound commands use the same
//! shape through [`WsEnvelope`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{Notification, UserId};

/// Inbound frame kinds.
pub const NOTIFICATION_CREATED: &str = "notification_created";
pub const NOTIFICATION_UPDATED: &str = "notification_updated";
pub const SYSTEM_NOTIFICATION: &str = "system_notification";
pub const CONNECTION_CONFIRMED: &str = "connection_confirmed";
pub const ROOM_JOINED: &str = "room_joined";
pub const ROOM_LEFT: &str = "room_left";
pub const AUTH_ERROR: &str = "auth_error";
pub const CONNECT_ERROR: &str = "connect_error";

/// Name of the per-user room notifications are fanned out to.
pub fn room_name(user_id: UserId) -> String {
    format!("user_{}", user_id)
}

/// Envelope for outbound commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsEnvelope<T> {
    pub id: String,
    #[serde(flatten)]
    pub payload: T,
    pub ts: DateTime<Utc>,
}

impl<T> WsEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            ts: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom {
        #[serde(rename = "userId")]
        user_id: UserId,
        room: String,
    },
    LeaveRoom {
        #[serde(rename = "userId")]
        user_id: UserId,
        room: String,
    },
}

impl ClientCommand {
    pub fn join(user_id: UserId) -> Self {
        ClientCommand::JoinRoom {
            user_id,
            room: room_name(user_id),
        }
    }

    pub fn leave(user_id: UserId) -> Self {
        ClientCommand::LeaveRoom {
            user_id,
            room: room_name(user_id),
        }
    }
}

/// An inbound frame before its payload has been interpreted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
}

impl InboundFrame {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            id: None,
            ts: None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Server events the client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    NotificationCreated(Notification),
    NotificationUpdated(Notification),
    SystemNotification(Notification),
    ConnectionConfirmed { user_id: Option<UserId> },
    RoomJoined { room: Option<String> },
    RoomLeft { room: Option<String> },
    AuthError { message: String },
    ConnectError { message: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmedData {
    #[serde(default)]
    user_id: Option<UserId>,
}

#[derive(Deserialize)]
struct RoomData {
    #[serde(default)]
    room: Option<String>,
}

impl ServerEvent {
    /// Parse and classify a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Self::from_frame(InboundFrame::parse(raw)?)
    }

    pub fn from_frame(frame: InboundFrame) -> Result<Self, ProtocolError> {
        let InboundFrame { kind, data, .. } = frame;
        let event = match kind.as_str() {
            NOTIFICATION_CREATED => ServerEvent::NotificationCreated(payload(&kind, data)?),
            NOTIFICATION_UPDATED => ServerEvent::NotificationUpdated(payload(&kind, data)?),
            SYSTEM_NOTIFICATION => ServerEvent::SystemNotification(payload(&kind, data)?),
            CONNECTION_CONFIRMED => {
                let data: Option<ConfirmedData> = optional_payload(&kind, data)?;
                ServerEvent::ConnectionConfirmed {
                    user_id: data.and_then(|d| d.user_id),
                }
            }
            ROOM_JOINED => ServerEvent::RoomJoined {
                room: room_of(&kind, data)?,
            },
            ROOM_LEFT => ServerEvent::RoomLeft {
                room: room_of(&kind, data)?,
            },
            AUTH_ERROR => ServerEvent::AuthError {
                message: message_of(data),
            },
            CONNECT_ERROR => ServerEvent::ConnectError {
                message: message_of(data),
            },
            _ => return Err(ProtocolError::UnknownKind(kind)),
        };
        Ok(event)
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn optional_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    data: serde_json::Value,
) -> Result<Option<T>, ProtocolError> {
    if data.is_null() {
        return Ok(None);
    }
    payload(kind, data).map(Some)
}

fn room_of(kind: &str, data: serde_json::Value) -> Result<Option<String>, ProtocolError> {
    if let serde_json::Value::String(room) = data {
        return Ok(Some(room));
    }
    let data: Option<RoomData> = optional_payload(kind, data)?;
    Ok(data.and_then(|d| d.room))
}

/// Error frames carry either a bare string or `{"message": ...}`.
fn message_of(data: serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| serde_json::Value::Object(map).to_string()),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_notification_frames() {
        let raw = r#"{"type":"notification_created","data":{"id":7,"isRead":false,"createdAt":"2024-05-01T10:00:00Z","title":"New sample"}}"#;
        match ServerEvent::parse(raw).unwrap() {
            ServerEvent::NotificationCreated(n) => {
                assert_eq!(n.id, 7);
                assert_eq!(n.fields["title"], "New sample");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lifecycle_frames_tolerate_missing_data() {
        assert_eq!(
            ServerEvent::parse(r#"{"type":"connection_confirmed"}"#).unwrap(),
            ServerEvent::ConnectionConfirmed { user_id: None }
        );
        assert_eq!(
            ServerEvent::parse(r#"{"type":"connection_confirmed","data":{"userId":42}}"#).unwrap(),
            ServerEvent::ConnectionConfirmed { user_id: Some(42) }
        );
        assert_eq!(
            ServerEvent::parse(r#"{"type":"room_joined","data":"user_42"}"#).unwrap(),
            ServerEvent::RoomJoined {
                room: Some("user_42".into())
            }
        );
        assert_eq!(
            ServerEvent::parse(r#"{"type":"auth_error","data":{"message":"jwt expired"}}"#).unwrap(),
            ServerEvent::AuthError {
                message: "jwt expired".into()
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ServerEvent::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ServerEvent::parse(r#"{"type":"typing","data":{}}"#),
            Err(ProtocolError::UnknownKind(k)) if k == "typing"
        ));
        assert!(matches!(
            ServerEvent::parse(r#"{"type":"notification_updated","data":{"id":"x"}}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn join_command_wire_shape() {
        let envelope = WsEnvelope::new(ClientCommand::join(42));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "join_room");
        assert_eq!(value["data"], json!({"userId": 42, "room": "user_42"}));
        assert!(value["id"].is_string());
    }
}
