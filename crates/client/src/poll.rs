//! Poll fallback: REST list fetches turned into notification events.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use labnotify_shared::{Notification, NotificationEvent, NotificationQuery};
use serde::Deserialize;

use crate::api_client::ApiClient;
use crate::credential::Credential;
use crate::error::FetchError;

/// REST boundary used while polling.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn fetch(
        &self,
        query: &NotificationQuery,
        credential: &Credential,
    ) -> Result<Vec<Notification>, FetchError>;
}

pub const NOTIFICATIONS_PATH: &str = "/api/notifications";

/// The list endpoint answers with either a bare array or `{"data": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NotificationPage {
    List(Vec<Notification>),
    Wrapped { data: Vec<Notification> },
}

impl NotificationPage {
    fn into_vec(self) -> Vec<Notification> {
        match self {
            NotificationPage::List(list) => list,
            NotificationPage::Wrapped { data } => data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestNotificationSource {
    api: ApiClient,
}

impl RestNotificationSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl NotificationSource for RestNotificationSource {
    async fn fetch(
        &self,
        query: &NotificationQuery,
        credential: &Credential,
    ) -> Result<Vec<Notification>, FetchError> {
        let page: NotificationPage = self
            .api
            .get_json(NOTIFICATIONS_PATH, &query.to_pairs(), credential.token())
            .await?;
        Ok(page.into_vec())
    }
}

/// Remembers the last version of every record seen through either transport
/// and reports only what changed.
#[derive(Debug, Default)]
pub struct PollTracker {
    seen: HashMap<i64, Notification>,
}

impl PollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version delivered by push so the next poll does not repeat it.
    pub fn observe(&mut self, notification: &Notification) {
        self.seen.insert(notification.id, notification.clone());
    }

    /// Events for new or changed records, oldest first so that prepending
    /// them leaves the newest on top.
    ///
    /// `fetched` is the full list, so records missing from it are forgotten.
    pub fn diff(&mut self, mut fetched: Vec<Notification>) -> Vec<NotificationEvent> {
        fetched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let present: HashSet<i64> = fetched.iter().map(|n| n.id).collect();
        self.seen.retain(|id, _| present.contains(id));

        let mut events = Vec::new();
        for notification in fetched {
            let event = match self.seen.get(&notification.id) {
                None => NotificationEvent::created(notification.clone()),
                Some(previous) if *previous != notification => {
                    NotificationEvent::updated(notification.clone())
                }
                Some(_) => continue,
            };
            self.seen.insert(notification.id, notification);
            events.push(event);
        }
        events
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
