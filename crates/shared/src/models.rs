//! Shared data models for the notification feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a signed-in user (also the `receiverId` of their notifications).
pub type UserId = i64;

// --- Notifications ---

/// A notification record as delivered by push or by the REST list endpoint.
///
/// Only the fields the delivery engine relies on are typed; everything else
/// (task references, titles, sender, ...) is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique and stable across transports.
    pub id: i64,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Notification {
    pub fn new(id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            is_read: false,
            created_at,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Created,
    Updated,
    System,
}

/// A notification change published to subscribers.
///
/// Push and poll produce the same shape, so consumers cannot tell the origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub payload: Notification,
    pub received_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, payload: Notification) -> Self {
        Self {
            kind,
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn created(payload: Notification) -> Self {
        Self::new(NotificationKind::Created, payload)
    }

    pub fn updated(payload: Notification) -> Self {
        Self::new(NotificationKind::Updated, payload)
    }

    pub fn system(payload: Notification) -> Self {
        Self::new(NotificationKind::System, payload)
    }
}

// --- Connection status ---

/// Error text reported when neither push nor poll can reach the server.
pub const UNREACHABLE: &str = "unreachable";

/// Push connection status as rendered by the UI.
///
/// Fields are private so `connected` and `connecting` can never both be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    connected: bool,
    connecting: bool,
    error: Option<String>,
}

impl ConnectionStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    /// A handshake is in flight. `last_error` is kept while retrying.
    pub fn connecting(last_error: Option<String>) -> Self {
        Self {
            connected: false,
            connecting: true,
            error: last_error,
        }
    }

    pub fn connected() -> Self {
        Self {
            connected: true,
            connecting: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            connecting: false,
            error: Some(error.into()),
        }
    }

    pub fn unreachable() -> Self {
        Self::failed(UNREACHABLE)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

// --- Poll query ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Desc => "desc",
            SortOrder::Asc => "asc",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desc" => Ok(SortOrder::Desc),
            "asc" => Ok(SortOrder::Asc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Filters for the REST notification list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQuery {
    pub receiver_id: UserId,
    pub sort_order: SortOrder,
    pub is_read: Option<bool>,
    pub task_type: Option<String>,
}

impl NotificationQuery {
    pub fn for_user(receiver_id: UserId) -> Self {
        Self {
            receiver_id,
            sort_order: SortOrder::Desc,
            is_read: None,
            task_type: None,
        }
    }

    /// Query parameters in the order the list endpoint documents them.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("sortOrder", self.sort_order.as_str().to_string())];
        if let Some(is_read) = self.is_read {
            pairs.push(("isRead", is_read.to_string()));
        }
        if let Some(task_type) = &self.task_type {
            pairs.push(("taskType", task_type.clone()));
        }
        pairs.push(("receiverId", self.receiver_id.to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_keeps_domain_fields() {
        let json = r#"{"id":3,"isRead":false,"createdAt":"2024-05-01T10:00:00Z","title":"Sample 12 validated","taskType":"validation"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, 3);
        assert_eq!(n.fields["title"], "Sample 12 validated");

        let back = serde_json::to_value(&n).unwrap();
        assert_eq!(back["taskType"], "validation");
        assert_eq!(back["isRead"], false);
    }

    #[test]
    fn status_constructors_never_connect_and_connect_at_once() {
        for status in [
            ConnectionStatus::idle(),
            ConnectionStatus::connecting(Some("timeout".into())),
            ConnectionStatus::connected(),
            ConnectionStatus::failed("boom"),
            ConnectionStatus::unreachable(),
        ] {
            assert!(!(status.is_connected() && status.is_connecting()));
        }
        assert_eq!(ConnectionStatus::unreachable().error(), Some(UNREACHABLE));
    }

    #[test]
    fn query_pairs_skip_unset_filters() {
        let mut query = NotificationQuery::for_user(42);
        assert_eq!(
            query.to_pairs(),
            vec![("sortOrder", "desc".to_string()), ("receiverId", "42".to_string())]
        );

        query.is_read = Some(false);
        query.task_type = Some("analysis".into());
        let keys: Vec<_> = query.to_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["sortOrder", "isRead", "taskType", "receiverId"]);
    }
}
