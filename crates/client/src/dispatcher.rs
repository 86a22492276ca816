//! Publish/subscribe hub between the session task and its consumers.
//!
//! Two channels exist: connection status and notification events. Delivery is
//! synchronous and in subscription order. A subscriber that panics is logged
//! and skipped; the remaining subscribers still receive the event.
//!
//! The subscriber list is snapshotted before delivery and the lock released,
//! so callbacks may subscribe or unsubscribe (themselves or others) freely.
//! A subscriber removed mid-delivery is not called for the rest of that event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use labnotify_shared::{ConnectionStatus, NotificationEvent};
use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    ConnectionStatus,
    Notification,
}

impl Channel {
    fn name(&self) -> &'static str {
        match self {
            Channel::ConnectionStatus => "connectionStatus",
            Channel::Notification => "notification",
        }
    }
}

struct Topic<T> {
    channel: Channel,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> Topic<T> {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn is_live(&self, id: u64) -> bool {
        self.subscribers.lock().iter().any(|(sid, _)| *sid == id)
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|(sid, _)| *sid != id);
    }

    fn publish(&self, event: &T) -> usize {
        let snapshot: Vec<(u64, Callback<T>)> = self.subscribers.lock().clone();
        let mut delivered = 0;
        for (id, callback) in snapshot {
            if !self.is_live(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    crate::log_error!(
                        "subscriber {} on '{}' panicked; continuing delivery",
                        id,
                        self.channel.name()
                    );
                }
            }
        }
        delivered
    }
}

struct Inner {
    next_id: AtomicU64,
    closed: AtomicBool,
    status: Topic<ConnectionStatus>,
    notifications: Topic<NotificationEvent>,
}

impl Inner {
    fn remove(&self, channel: Channel, id: u64) {
        match channel {
            Channel::ConnectionStatus => self.status.remove(id),
            Channel::Notification => self.notifications.remove(id),
        }
    }
}

/// Event hub owned by one session. Cheap to clone.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("status_subscribers", &self.subscriber_count(Channel::ConnectionStatus))
            .field("notification_subscribers", &self.subscriber_count(Channel::Notification))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                status: Topic::new(Channel::ConnectionStatus),
                notifications: Topic::new(Channel::Notification),
            }),
        }
    }

    pub fn subscribe_status(
        &self,
        callback: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_to(&self.inner.status, Arc::new(callback))
    }

    pub fn subscribe_notifications(
        &self,
        callback: impl Fn(&NotificationEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_to(&self.inner.notifications, Arc::new(callback))
    }

    fn subscribe_to<T>(&self, topic: &Topic<T>, callback: Callback<T>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if self.is_closed() {
            return Subscription::inert(topic.channel, id);
        }
        topic.subscribers.lock().push((id, callback));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            channel: topic.channel,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Deliver a status update. Returns how many subscribers were called successfully.
    pub fn publish_status(&self, status: &ConnectionStatus) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.inner.status.publish(status)
    }

    /// Deliver a notification event. Returns how many subscribers were called successfully.
    pub fn publish_notification(&self, event: &NotificationEvent) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.inner.notifications.publish(event)
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::ConnectionStatus => self.inner.status.subscribers.lock().len(),
            Channel::Notification => self.inner.notifications.subscribers.lock().len(),
        }
    }

    /// Drop every subscriber and ignore all later publishes and subscriptions.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.status.subscribers.lock().clear();
        self.inner.notifications.subscribers.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

/// Handle returned by a subscribe call. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    inner: Weak<Inner>,
    channel: Channel,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    fn inert(channel: Channel, id: u64) -> Self {
        Self {
            inner: Weak::new(),
            channel,
            id,
            active: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Idempotent; safe to call from inside a callback.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.channel, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
