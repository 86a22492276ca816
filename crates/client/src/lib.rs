//! Labnotify client - real-time notification delivery
//!
//! Delivers a signed-in user's notifications over a push channel
//! (WebSocket or SSE), falling back to REST polling when push is
//! unavailable, and merges both streams into one duplicate-free list.

pub mod api_client;
pub mod cache;
pub mod client;
pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod poll;
pub mod retry;
pub mod room;
pub mod session;
pub mod transport;

pub use api_client::ApiClient;
pub use cache::{attach, merge, MergeOutcome, NotificationStore, ReadModel};
pub use client::NotificationClient;
pub use config::{ConfigError, NotifyConfig, TransportKind};
pub use credential::Credential;
pub use dispatcher::{Channel, EventDispatcher, Subscription};
pub use error::{ConnectError, FetchError, SendError};
pub use poll::{NotificationSource, PollTracker, RestNotificationSource};
pub use retry::{CloseReason, ReconnectPolicy};
pub use session::{ConnectionBadge, DeliveryMode, Session, SessionHandle, SessionSnapshot};
pub use transport::{PushTransport, TransportEvent};

pub use labnotify_shared as shared;
