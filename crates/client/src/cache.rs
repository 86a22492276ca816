//! Merge contract between notification events and the local read-model.
//!
//! The read-model is the single writer of its list; the engine only proposes
//! two operations: insert-if-absent and replace-by-id. Both are idempotent,
//! so the same record arriving through push and poll never duplicates a row.

use std::sync::Arc;

use labnotify_shared::{Notification, NotificationEvent, NotificationKind};
use parking_lot::Mutex;

use crate::dispatcher::{EventDispatcher, Subscription};

/// The host's notification list, as far as merging is concerned.
pub trait ReadModel {
    fn contains(&self, id: i64) -> bool;

    /// Insert at the front (newest first).
    fn prepend(&mut self, notification: Notification);

    /// Replace the entry with the same id. Returns false if there is none.
    fn replace(&mut self, notification: Notification) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// Already present; a duplicate delivery.
    Ignored,
}

/// Apply one event to the read-model.
///
/// `Created` and `System` insert if absent; `Updated` replaces by id and
/// falls back to inserting when the record was never seen.
pub fn merge<M: ReadModel + ?Sized>(model: &mut M, event: &NotificationEvent) -> MergeOutcome {
    let notification = event.payload.clone();
    match event.kind {
        NotificationKind::Created | NotificationKind::System => {
            if model.contains(notification.id) {
                MergeOutcome::Ignored
            } else {
                model.prepend(notification);
                MergeOutcome::Inserted
            }
        }
        NotificationKind::Updated => {
            if model.replace(notification.clone()) {
                MergeOutcome::Replaced
            } else {
                model.prepend(notification);
                MergeOutcome::Inserted
            }
        }
    }
}

/// Unread count derived from the full set; never tracked incrementally.
pub fn count_unread<'a>(notifications: impl IntoIterator<Item = &'a Notification>) -> usize {
    notifications.into_iter().filter(|n| !n.is_read).count()
}

/// In-memory read-model: newest first, one entry per id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NotificationStore {
    notifications: Vec<Notification>,
    /// Whether a full list has been loaded from the REST API.
    is_loaded: bool,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn get(&self, id: i64) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn unread_count(&self) -> usize {
        count_unread(&self.notifications)
    }

    pub fn apply(&mut self, event: &NotificationEvent) -> MergeOutcome {
        merge(self, event)
    }

    /// Replace the whole list (initial load). Later duplicates of an id are dropped.
    pub fn set_history(&mut self, mut notifications: Vec<Notification>) {
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let mut seen = std::collections::HashSet::new();
        notifications.retain(|n| seen.insert(n.id));
        self.notifications = notifications;
        self.is_loaded = true;
    }

    /// Local read receipt. Returns false if the id is unknown.
    pub fn mark_read(&mut self, id: i64) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.notifications {
            n.is_read = true;
        }
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
        self.is_loaded = false;
    }
}

impl ReadModel for NotificationStore {
    fn contains(&self, id: i64) -> bool {
        self.notifications.iter().any(|n| n.id == id)
    }

    fn prepend(&mut self, notification: Notification) {
        self.notifications.insert(0, notification);
    }

    fn replace(&mut self, notification: Notification) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == notification.id) {
            Some(slot) => {
                *slot = notification;
                true
            }
            None => false,
        }
    }
}

/// Keep `model` in sync with a dispatcher's notification channel.
pub fn attach<M>(model: Arc<Mutex<M>>, dispatcher: &EventDispatcher) -> Subscription
where
    M: ReadModel + Send + 'static,
{
    dispatcher.subscribe_notifications(move |event| {
        let outcome = merge(&mut *model.lock(), event);
        crate::log_debug!("merged notification {} ({:?})", event.payload.id, outcome);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn note(id: i64, minute: u32) -> Notification {
        Notification::new(id, Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap())
    }

    #[test]
    fn duplicate_created_is_ignored() {
        let mut store = NotificationStore::new();
        let event = NotificationEvent::created(note(7, 0));
        assert_eq!(store.apply(&event), MergeOutcome::Inserted);
        assert_eq!(store.apply(&event), MergeOutcome::Ignored);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(7).unwrap().id, 7);
    }

    #[test]
    fn updates_replace_and_insert_when_unknown() {
        let mut store = NotificationStore::new();
        store.apply(&NotificationEvent::created(note(1, 0)));

        let updated = note(1, 0).read().with_field("title", "Analysis done");
        assert_eq!(store.apply(&NotificationEvent::updated(updated.clone())), MergeOutcome::Replaced);
        assert_eq!(store.get(1), Some(&updated));

        assert_eq!(store.apply(&NotificationEvent::updated(note(2, 1))), MergeOutcome::Inserted);
        assert_eq!(store.notifications()[0].id, 2);
    }

    #[test]
    fn late_created_does_not_revert_an_update() {
        let mut store = NotificationStore::new();
        let updated = note(5, 0).read();
        store.apply(&NotificationEvent::updated(updated.clone()));
        store.apply(&NotificationEvent::created(note(5, 0)));
        assert_eq!(store.get(5), Some(&updated));
    }

    #[test]
    fn interleavings_keep_one_row_per_id_and_latest_update() {
        // Deterministic pseudo-random interleaving of push/poll deliveries.
        let mut seed: u64 = 0x5eed;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as u32
        };

        for _ in 0..50 {
            let mut store = NotificationStore::new();
            let mut latest = std::collections::HashMap::new();
            for step in 0..40 {
                let id = i64::from(next() % 6);
                let event = if next() % 2 == 0 {
                    NotificationEvent::created(note(id, 0))
                } else {
                    NotificationEvent::updated(note(id, 0).with_field("rev", step))
                };
                if event.kind == NotificationKind::Updated {
                    latest.insert(id, event.payload.clone());
                } else {
                    latest.entry(id).or_insert_with(|| event.payload.clone());
                }
                store.apply(&event);
            }

            let mut ids: Vec<_> = store.notifications().iter().map(|n| n.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), store.len());
            for (id, expected) in &latest {
                assert_eq!(store.get(*id), Some(expected));
            }
        }
    }

    #[test]
    fn unread_is_recomputed_from_the_set() {
        let mut store = NotificationStore::new();
        store.set_history(vec![note(1, 0), note(2, 1).read(), note(1, 0), note(3, 2)]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.notifications()[0].id, 3);
        assert_eq!(store.unread_count(), 2);

        store.apply(&NotificationEvent::created(note(3, 2)));
        assert_eq!(store.unread_count(), 2);
        store.mark_read(1);
        assert_eq!(store.unread_count(), 1);
        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn attached_store_follows_dispatcher() {
        let dispatcher = EventDispatcher::new();
        let store = Arc::new(Mutex::new(NotificationStore::new()));
        let _sub = attach(store.clone(), &dispatcher);

        dispatcher.publish_notification(&NotificationEvent::created(note(7, 0)));
        dispatcher.publish_notification(&NotificationEvent::created(note(7, 0)));
        assert_eq!(store.lock().len(), 1);
    }
}
