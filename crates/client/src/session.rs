//! A signed-in user's delivery session: the push/poll fallback coordinator.
//!
//! One tokio task per session owns the transport, the retry state, the room
//! coordinator and the poll tracker. Every timer is a deadline stored in the
//! [`Delivery`] state, so ending the task clears them all and a timer that
//! belongs to another mode cannot exist.
//!
//! ```text
//!                 handshake ok                      drop (retry in budget)
//!  Recovering ──────────────────► Push(Open) ─────────────────► Push(Retrying)
//!   ▲  poll armed                  poll inert  ◄──────────────── handshake ok
//!   │                                  │ auth                      │ give up
//!   │ probe timer                      ▼                           ▼
//!   └──────────────────────────────── Poll ◄────────────────────────┘
//!                                    poll armed
//! ```
//!
//! Poll cadence stays authoritative until push is confirmed open.

use std::sync::Arc;
use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use labnotify_shared::{
    ConnectionStatus, NotificationEvent, NotificationQuery, ServerEvent, UserId, UNREACHABLE,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::api_client::ApiClient;
use crate::config::NotifyConfig;
use crate::credential::Credential;
use crate::dispatcher::EventDispatcher;
use crate::poll::{NotificationSource, PollTracker, RestNotificationSource};
use crate::retry::{CloseReason, RetryDecision, RetryState};
use crate::room::RoomCoordinator;
use crate::transport::{self, PushTransport, TransportEvent};

/// Lower bound on the poll and probe periods.
const MIN_TIMER_PERIOD: Duration = Duration::from_secs(1);

/// Which mechanism currently drives freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Push is open; the poll timer does not exist.
    Push,
    /// Poll timer drives cadence; push may be probed later.
    Poll,
    /// Poll timer drives cadence while a push handshake is being attempted.
    Recovering,
    /// Session torn down.
    Stopped,
}

impl DeliveryMode {
    pub fn is_polling(&self) -> bool {
        matches!(self, DeliveryMode::Poll | DeliveryMode::Recovering)
    }
}

/// Badge the UI renders for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionBadge {
    Live,
    Connecting,
    Polling,
    Offline,
}

/// Point-in-time view of a session, observable through [`SessionHandle::watch`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub mode: DeliveryMode,
    pub status: ConnectionStatus,
    /// Poll timer armed.
    pub polling: bool,
    /// Times the poll timer went from inert to armed.
    pub poll_activations: u32,
    pub connect_attempts: u32,
    pub fetches: u32,
    pub last_fetch_failed: bool,
}

impl SessionSnapshot {
    pub fn badge(&self) -> ConnectionBadge {
        if self.status.is_connected() {
            ConnectionBadge::Live
        } else if self.status.is_connecting() {
            ConnectionBadge::Connecting
        } else if self.polling && !self.last_fetch_failed && self.status.error() != Some(UNREACHABLE) {
            ConnectionBadge::Polling
        } else {
            ConnectionBadge::Offline
        }
    }
}

#[derive(Debug)]
enum SessionCommand {
    Refresh,
    UpdateCredential(Credential),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushLink {
    Open,
    Retrying { at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Push(PushLink),
    Poll {
        next_poll: Option<Instant>,
        next_probe: Option<Instant>,
    },
    Recovering {
        next_poll: Option<Instant>,
        retry_at: Instant,
        /// A single recovery probe rather than a budgeted reconnect.
        probe: bool,
    },
    Stopped,
}

impl Delivery {
    fn mode(&self) -> DeliveryMode {
        match self {
            Delivery::Push(_) => DeliveryMode::Push,
            Delivery::Poll { .. } => DeliveryMode::Poll,
            Delivery::Recovering { .. } => DeliveryMode::Recovering,
            Delivery::Stopped => DeliveryMode::Stopped,
        }
    }

    fn next_poll(&self) -> Option<Instant> {
        match self {
            Delivery::Poll { next_poll, .. } | Delivery::Recovering { next_poll, .. } => *next_poll,
            Delivery::Push(_) | Delivery::Stopped => None,
        }
    }

    fn is_push_open(&self) -> bool {
        matches!(self, Delivery::Push(PushLink::Open))
    }

    /// Earliest pending deadline. On ties the handshake wins over the poll
    /// tick and the poll tick over the probe.
    fn next_timer(&self) -> Option<(Instant, Timer)> {
        let candidates = match *self {
            Delivery::Push(PushLink::Retrying { at }) => [(Some(at), Timer::Connect), (None, Timer::Poll)],
            Delivery::Recovering {
                next_poll, retry_at, ..
            } => [(Some(retry_at), Timer::Connect), (next_poll, Timer::Poll)],
            Delivery::Poll {
                next_poll,
                next_probe,
            } => [(next_poll, Timer::Poll), (next_probe, Timer::Probe)],
            Delivery::Push(PushLink::Open) | Delivery::Stopped => return None,
        };
        candidates
            .into_iter()
            .filter_map(|(at, timer)| at.map(|at| (at, timer)))
            .min_by_key(|(at, _)| *at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Connect,
    Poll,
    Probe,
}

enum Wake {
    Command(Option<SessionCommand>),
    Transport(TransportEvent),
    Timer(Option<Timer>),
}

#[derive(Debug, Default)]
struct Stats {
    poll_activations: u32,
    connect_attempts: u32,
    fetches: u32,
    last_fetch_failed: bool,
}

/// Entry point for starting a session.
pub struct Session;

impl Session {
    pub fn builder(config: NotifyConfig, user_id: UserId, credential: Credential) -> SessionBuilder {
        SessionBuilder {
            config,
            user_id,
            credential,
            transport: None,
            source: None,
            dispatcher: None,
        }
    }
}

pub struct SessionBuilder {
    config: NotifyConfig,
    user_id: UserId,
    credential: Credential,
    transport: Option<Box<dyn PushTransport>>,
    source: Option<Arc<dyn NotificationSource>>,
    dispatcher: Option<EventDispatcher>,
}

impl SessionBuilder {
    pub fn transport(mut self, transport: Box<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn source(mut self, source: Arc<dyn NotificationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Dispatcher to publish on. Subscribe before calling [`start`](Self::start)
    /// to see the very first status change.
    pub fn dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Spawn the session task. Must be called within a tokio runtime.
    pub fn start(self) -> SessionHandle {
        let SessionBuilder {
            config,
            user_id,
            credential,
            transport,
            source,
            dispatcher,
        } = self;

        let transport = transport.unwrap_or_else(|| transport::from_config(&config));
        let source = source.unwrap_or_else(|| {
            Arc::new(RestNotificationSource::new(ApiClient::with_timeout(
                config.api_base_url.clone(),
                config.handshake_timeout,
            )))
        });
        let dispatcher = dispatcher.unwrap_or_default();

        let initial = SessionSnapshot {
            mode: DeliveryMode::Poll,
            status: ConnectionStatus::idle(),
            polling: false,
            poll_activations: 0,
            connect_attempts: 0,
            fetches: 0,
            last_fetch_failed: false,
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (control_tx, control_rx) = unbounded();

        let task = SessionTask {
            retry: RetryState::new(&config.reconnect),
            config,
            user_id,
            credential,
            transport,
            source,
            dispatcher: dispatcher.clone(),
            room: RoomCoordinator::new(),
            tracker: PollTracker::new(),
            delivery: Delivery::Poll {
                next_poll: None,
                next_probe: None,
            },
            status: ConnectionStatus::idle(),
            last_error: None,
            push_failed: false,
            auth_rejected: false,
            stats: Stats::default(),
            state: state_tx,
        };

        SessionHandle {
            user_id,
            dispatcher,
            control: control_tx,
            state: state_rx,
            task: Some(tokio::spawn(task.run(control_rx))),
        }
    }
}

struct SessionTask {
    config: NotifyConfig,
    user_id: UserId,
    credential: Credential,
    transport: Box<dyn PushTransport>,
    source: Arc<dyn NotificationSource>,
    dispatcher: EventDispatcher,
    room: RoomCoordinator,
    tracker: PollTracker,
    retry: RetryState,
    delivery: Delivery,
    status: ConnectionStatus,
    last_error: Option<String>,
    /// The most recent push attempt failed.
    push_failed: bool,
    /// The credential was refused; no probing until it is replaced.
    auth_rejected: bool,
    stats: Stats,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionTask {
    async fn run(mut self, mut control: UnboundedReceiver<SessionCommand>) {
        crate::log_info!("starting notification session for user {}", self.user_id);
        self.enter_initial().await;

        loop {
            let (deadline, timer) = match self.delivery.next_timer() {
                Some((at, timer)) => (at, Some(timer)),
                None => (Instant::now() + Duration::from_secs(3600), None),
            };
            let listening = self.delivery.is_push_open() && self.transport.is_open();

            let wake = tokio::select! {
                biased;
                command = control.next() => Wake::Command(command),
                event = self.transport.next_event(), if listening => Wake::Transport(event),
                _ = sleep_until(deadline), if timer.is_some() => Wake::Timer(timer),
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(SessionCommand::Shutdown)) => break,
                Wake::Command(Some(SessionCommand::Refresh)) => self.refresh().await,
                Wake::Command(Some(SessionCommand::UpdateCredential(credential))) => {
                    self.update_credential(credential)
                }
                Wake::Transport(event) => self.on_transport_event(event).await,
                Wake::Timer(Some(Timer::Connect)) => self.attempt_push().await,
                Wake::Timer(Some(Timer::Poll)) => self.poll_once().await,
                Wake::Timer(Some(Timer::Probe)) => self.start_probe().await,
                Wake::Timer(None) => {}
            }
        }

        self.teardown().await;
    }

    async fn enter_initial(&mut self) {
        let now = Instant::now();
        // Record the join intent; it is sent once push opens.
        self.room.join(self.user_id, self.transport.as_mut(), false).await;

        let next_poll = self.activate_polling(now);
        self.delivery = if self.config.push_enabled {
            Delivery::Recovering {
                next_poll,
                retry_at: now,
                probe: false,
            }
        } else {
            Delivery::Poll {
                next_poll,
                next_probe: None,
            }
        };
        if !self.config.push_enabled && !self.config.fallback_enabled {
            crate::log_warn!("push and fallback are both disabled; no notifications will be delivered");
        }
        self.publish_snapshot();
    }

    fn activate_polling(&mut self, now: Instant) -> Option<Instant> {
        if !self.config.fallback_enabled {
            return None;
        }
        self.stats.poll_activations += 1;
        crate::log_info!(
            "poll fallback active (every {}s)",
            self.config.poll_interval.as_secs()
        );
        Some(now)
    }

    async fn attempt_push(&mut self) {
        self.stats.connect_attempts += 1;
        self.set_status(ConnectionStatus::connecting(self.last_error.clone()));

        let result = self.transport.connect(&self.credential, self.user_id).await;
        match result {
            Ok(()) => self.on_open().await,
            Err(e) => {
                crate::log_warn!("push handshake failed (retry {}): {}", self.retry.attempt, e);
                self.on_push_failure(e.close_reason());
            }
        }
    }

    async fn on_open(&mut self) {
        let previous = self.delivery.mode();
        self.retry.reset(&self.config.reconnect);
        self.last_error = None;
        self.push_failed = false;
        self.auth_rejected = false;
        self.delivery = Delivery::Push(PushLink::Open);

        if previous == DeliveryMode::Push {
            crate::log_info!("push reconnected for user {}", self.user_id);
        } else {
            crate::log_info!("push connected for user {}; poll timer stopped", self.user_id);
        }
        self.set_status(ConnectionStatus::connected());
        self.room.on_open(self.transport.as_mut()).await;
    }

    fn on_push_failure(&mut self, reason: CloseReason) {
        self.room.on_closed();
        self.push_failed = true;
        let error = reason.describe();
        self.last_error = Some(error.clone());
        let now = Instant::now();

        if reason.is_auth() {
            crate::log_warn!("push credential rejected, falling back: {}", error);
            self.auth_rejected = true;
            self.set_status(ConnectionStatus::failed(error));
            self.fall_back();
            return;
        }

        if let Delivery::Recovering {
            next_poll,
            probe: true,
            ..
        } = self.delivery
        {
            crate::log_debug!("push probe failed: {}", error);
            self.delivery = Delivery::Poll {
                next_poll,
                next_probe: Some(now + self.probe_period()),
            };
            self.set_status(ConnectionStatus::failed(error));
            return;
        }

        match self.config.reconnect.next_action(&self.retry, &reason) {
            RetryDecision::Retry { delay } => {
                self.retry.advance(delay);
                let at = now + delay;
                self.delivery = match self.delivery {
                    Delivery::Recovering { next_poll, .. } => Delivery::Recovering {
                        next_poll,
                        retry_at: at,
                        probe: false,
                    },
                    _ => Delivery::Push(PushLink::Retrying { at }),
                };
                crate::log_info!(
                    "push retry {}/{} in {}ms",
                    self.retry.attempt,
                    self.config.reconnect.max_attempts,
                    delay.as_millis()
                );
                self.set_status(ConnectionStatus::connecting(Some(error)));
            }
            RetryDecision::GiveUp => {
                crate::log_warn!(
                    "giving up on push after {} retries: {}",
                    self.retry.attempt,
                    error
                );
                self.set_status(ConnectionStatus::failed(error));
                self.fall_back();
            }
        }
    }

    /// Switch to poll mode. The poll timer is armed only when coming from push;
    /// in the poll family it is already running on its own cadence.
    fn fall_back(&mut self) {
        let now = Instant::now();
        let next_poll = match self.delivery {
            Delivery::Poll { next_poll, .. } | Delivery::Recovering { next_poll, .. } => next_poll,
            Delivery::Push(_) | Delivery::Stopped => self.activate_polling(now),
        };
        let next_probe = (self.config.push_enabled && !self.auth_rejected)
            .then(|| now + self.probe_period());
        if next_poll.is_none() {
            crate::log_warn!("push unavailable and poll fallback disabled");
        }
        self.delivery = Delivery::Poll {
            next_poll,
            next_probe,
        };
        self.publish_snapshot();
    }

    async fn start_probe(&mut self) {
        if let Delivery::Poll { next_poll, .. } = self.delivery {
            crate::log_debug!("probing push while polling");
            self.delivery = Delivery::Recovering {
                next_poll,
                retry_at: Instant::now(),
                probe: true,
            };
            self.attempt_push().await;
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(raw) => self.on_message(&raw).await,
            TransportEvent::Closed(reason) => {
                let reason = match reason {
                    CloseReason::Client => CloseReason::Server,
                    other => other,
                };
                crate::log_warn!("push connection lost: {}", reason.describe());
                self.on_push_failure(reason);
            }
        }
    }

    async fn on_message(&mut self, raw: &str) {
        let event = match ServerEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                crate::log_warn!("dropping push frame: {}", e);
                return;
            }
        };

        match event {
            ServerEvent::NotificationCreated(n) => self.deliver(NotificationEvent::created(n)),
            ServerEvent::NotificationUpdated(n) => self.deliver(NotificationEvent::updated(n)),
            ServerEvent::SystemNotification(n) => self.deliver(NotificationEvent::system(n)),
            ServerEvent::ConnectionConfirmed { .. } => {
                crate::log_debug!("connection confirmed again; ignoring");
            }
            ServerEvent::RoomJoined { room } => self.room.on_joined(room),
            ServerEvent::RoomLeft { room } => self.room.on_left(room),
            ServerEvent::AuthError { message } => {
                self.transport.disconnect().await;
                self.on_push_failure(CloseReason::Auth(message));
            }
            ServerEvent::ConnectError { message } => {
                self.transport.disconnect().await;
                self.on_push_failure(CloseReason::Transport(message));
            }
        }
    }

    fn deliver(&mut self, event: NotificationEvent) {
        self.tracker.observe(&event.payload);
        self.dispatcher.publish_notification(&event);
    }

    fn poll_period(&self) -> Duration {
        self.config.poll_interval.max(MIN_TIMER_PERIOD)
    }

    fn probe_period(&self) -> Duration {
        self.config.probe_interval.max(MIN_TIMER_PERIOD)
    }

    fn query(&self) -> NotificationQuery {
        NotificationQuery {
            receiver_id: self.user_id,
            sort_order: self.config.sort_order,
            is_read: self.config.is_read,
            task_type: self.config.task_type.clone(),
        }
    }

    async fn poll_once(&mut self) {
        self.stats.fetches += 1;
        let query = self.query();
        let result = self.source.fetch(&query, &self.credential).await;

        match result {
            Ok(list) => {
                self.stats.last_fetch_failed = false;
                let events = self.tracker.diff(list);
                crate::log_debug!("poll returned {} change(s)", events.len());
                for event in &events {
                    self.dispatcher.publish_notification(event);
                }
                if self.status.error() == Some(UNREACHABLE) {
                    let status = self.resting_status();
                    self.set_status(status);
                }
            }
            Err(e) => {
                self.stats.last_fetch_failed = true;
                crate::log_warn!(
                    "poll failed, next attempt in {}s: {}",
                    self.config.poll_interval.as_secs(),
                    e
                );
                if !self.transport.is_open() && (self.push_failed || !self.config.push_enabled) {
                    self.set_status(ConnectionStatus::unreachable());
                }
            }
        }

        let next = Instant::now() + self.poll_period();
        match &mut self.delivery {
            Delivery::Poll { next_poll, .. } | Delivery::Recovering { next_poll, .. } => {
                if next_poll.is_some() {
                    *next_poll = Some(next);
                }
            }
            Delivery::Push(_) | Delivery::Stopped => {}
        }
        self.publish_snapshot();
    }

    /// Status matching the current delivery state, without transient errors.
    fn resting_status(&self) -> ConnectionStatus {
        match self.delivery {
            Delivery::Push(PushLink::Open) => ConnectionStatus::connected(),
            Delivery::Push(PushLink::Retrying { .. }) | Delivery::Recovering { probe: false, .. } => {
                ConnectionStatus::connecting(self.last_error.clone())
            }
            _ => match &self.last_error {
                Some(error) => ConnectionStatus::failed(error.clone()),
                None => ConnectionStatus::idle(),
            },
        }
    }

    async fn refresh(&mut self) {
        if self.delivery.next_poll().is_some() {
            self.poll_once().await;
        } else {
            crate::log_debug!("refresh ignored: poll fallback is not active");
        }
    }

    fn update_credential(&mut self, credential: Credential) {
        self.credential = credential;
        self.auth_rejected = false;
        if !self.config.push_enabled {
            return;
        }

        let now = Instant::now();
        self.delivery = match self.delivery {
            // Picked up identically on the next reconnect.
            Delivery::Push(PushLink::Open) => Delivery::Push(PushLink::Open),
            Delivery::Push(PushLink::Retrying { .. }) => {
                self.retry.reset(&self.config.reconnect);
                Delivery::Push(PushLink::Retrying { at: now })
            }
            Delivery::Poll { next_poll, .. } | Delivery::Recovering { next_poll, .. } => {
                self.retry.reset(&self.config.reconnect);
                Delivery::Recovering {
                    next_poll,
                    retry_at: now,
                    probe: false,
                }
            }
            Delivery::Stopped => Delivery::Stopped,
        };
        crate::log_info!("credential updated for user {}", self.user_id);
        self.publish_snapshot();
    }

    async fn teardown(&mut self) {
        let push_active = self.delivery.is_push_open();
        self.room.leave(self.transport.as_mut(), push_active).await;
        self.transport.disconnect().await;
        self.delivery = Delivery::Stopped;
        self.set_status(ConnectionStatus::idle());
        crate::log_info!("notification session for user {} closed", self.user_id);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if status != self.status {
            self.status = status;
            self.dispatcher.publish_status(&self.status);
        }
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.state.send_replace(SessionSnapshot {
            mode: self.delivery.mode(),
            status: self.status.clone(),
            polling: self.delivery.next_poll().is_some(),
            poll_activations: self.stats.poll_activations,
            connect_attempts: self.stats.connect_attempts,
            fetches: self.stats.fetches,
            last_fetch_failed: self.stats.last_fetch_failed,
        });
    }
}

/// Owner's handle on a running session.
///
/// Dropping the handle closes the dispatcher and tells the task to stop; the
/// detached task still leaves the room and disconnects. Use
/// [`shutdown`](Self::shutdown) to wait for that to finish.
pub struct SessionHandle {
    user_id: UserId,
    dispatcher: EventDispatcher,
    control: UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn mode(&self) -> DeliveryMode {
        self.state.borrow().mode
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status.clone()
    }

    pub fn badge(&self) -> ConnectionBadge {
        self.state.borrow().badge()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Fetch immediately if the poll fallback is active.
    pub fn refresh(&self) -> bool {
        self.control.unbounded_send(SessionCommand::Refresh).is_ok()
    }

    /// Replace the credential; push is retried with a fresh budget unless it is open.
    pub fn update_credential(&self, credential: Credential) -> bool {
        self.control
            .unbounded_send(SessionCommand::UpdateCredential(credential))
            .is_ok()
    }

    /// Unsubscribe everyone, leave the room, disconnect and wait for the task.
    ///
    /// Subscribers are dropped before this returns its first poll, so no
    /// callback runs after teardown starts.
    pub async fn shutdown(mut self) {
        self.dispatcher.close();
        let _ = self.control.unbounded_send(SessionCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    crate::log_error!("session task for user {} panicked", self.user_id);
                }
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.dispatcher.close();
        let Some(task) = self.task.take() else {
            return;
        };
        // A closed control queue means the task has already ended.
        if self.control.unbounded_send(SessionCommand::Shutdown).is_err() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("user_id", &self.user_id)
            .field("snapshot", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    #[test]
    fn push_open_has_no_timer() {
        assert_eq!(Delivery::Push(PushLink::Open).next_timer(), None);
        assert_eq!(Delivery::Push(PushLink::Open).next_poll(), None);
    }

    #[test]
    fn handshake_wins_ties_with_poll() {
        let now = Instant::now();
        let delivery = Delivery::Recovering {
            next_poll: Some(now),
            retry_at: now,
            probe: false,
        };
        assert_eq!(delivery.next_timer(), Some((now, Timer::Connect)));
    }

    #[test]
    fn poll_picks_earliest_deadline() {
        let poll = at(30);
        let probe = at(10);
        let delivery = Delivery::Poll {
            next_poll: Some(poll),
            next_probe: Some(probe),
        };
        assert_eq!(delivery.next_timer(), Some((probe, Timer::Probe)));

        let delivery = Delivery::Poll {
            next_poll: None,
            next_probe: None,
        };
        assert_eq!(delivery.next_timer(), None);
    }

    #[test]
    fn badge_follows_status_and_polling() {
        let mut snapshot = SessionSnapshot {
            mode: DeliveryMode::Push,
            status: ConnectionStatus::connected(),
            polling: false,
            poll_activations: 0,
            connect_attempts: 1,
            fetches: 0,
            last_fetch_failed: false,
        };
        assert_eq!(snapshot.badge(), ConnectionBadge::Live);

        snapshot.mode = DeliveryMode::Poll;
        snapshot.status = ConnectionStatus::failed("connection closed by server");
        snapshot.polling = true;
        assert_eq!(snapshot.badge(), ConnectionBadge::Polling);

        snapshot.status = ConnectionStatus::unreachable();
        assert_eq!(snapshot.badge(), ConnectionBadge::Offline);

        snapshot.status = ConnectionStatus::connecting(None);
        assert_eq!(snapshot.badge(), ConnectionBadge::Connecting);
    }
}
