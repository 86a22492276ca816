#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use labnotify_client::retry::{CloseReason, ReconnectPolicy};
use labnotify_client::shared::{ApiError, ClientCommand, Notification, NotificationQuery, UserId};
use labnotify_client::{
    ConnectError, Credential, FetchError, NotificationSource, NotifyConfig, PushTransport, SendError,
    TransportEvent,
};
use parking_lot::Mutex;

/// Short timers so paused-clock tests stay readable.
pub fn config() -> NotifyConfig {
    NotifyConfig {
        poll_interval: Duration::from_secs(30),
        probe_interval: Duration::from_secs(60),
        reconnect: ReconnectPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            cap_delay: None,
        },
        ..NotifyConfig::default()
    }
}

pub fn note(id: i64) -> Notification {
    Notification::new(id, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
}

pub fn frame(kind: &str, id: i64) -> TransportEvent {
    let raw = serde_json::json!({
        "type": kind,
        "data": { "id": id, "isRead": false, "createdAt": "2024-05-01T09:00:00Z" },
    });
    TransportEvent::Message(raw.to_string())
}

pub fn refused() -> Result<(), ConnectError> {
    Err(ConnectError::Transport("connection refused".into()))
}

pub fn rejected() -> Result<(), ConnectError> {
    Err(ConnectError::Auth("invalid token".into()))
}

/// Let the session task run until it is waiting on its next timer.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[derive(Default)]
struct TransportState {
    script: VecDeque<Result<(), ConnectError>>,
    default_connect: Option<Result<(), ConnectError>>,
    connects: u32,
    disconnects: u32,
    tokens: Vec<String>,
    sent: Vec<ClientCommand>,
}

/// Test-side controls for a [`ScriptedTransport`].
#[derive(Clone)]
pub struct TransportControl {
    state: Arc<Mutex<TransportState>>,
    inbound: UnboundedSender<TransportEvent>,
}

impl TransportControl {
    /// Results for the next connects, in order.
    pub fn script(&self, results: impl IntoIterator<Item = Result<(), ConnectError>>) {
        self.state.lock().script.extend(results);
    }

    /// Result once the script is exhausted (default: success).
    pub fn otherwise(&self, result: Result<(), ConnectError>) {
        self.state.lock().default_connect = Some(result);
    }

    pub fn push(&self, event: TransportEvent) {
        let _ = self.inbound.unbounded_send(event);
    }

    pub fn drop_connection(&self) {
        self.push(TransportEvent::Closed(CloseReason::Server));
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().disconnects
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().tokens.clone()
    }

    pub fn sent(&self) -> Vec<ClientCommand> {
        self.state.lock().sent.clone()
    }
}

/// In-memory push transport driven by a [`TransportControl`].
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
    inbound: UnboundedReceiver<TransportEvent>,
    open: bool,
}

pub fn scripted() -> (Box<dyn PushTransport>, TransportControl) {
    let state = Arc::new(Mutex::new(TransportState::default()));
    let (tx, rx) = unbounded();
    let transport = ScriptedTransport {
        state: state.clone(),
        inbound: rx,
        open: false,
    };
    (Box::new(transport), TransportControl { state, inbound: tx })
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn connect(&mut self, credential: &Credential, _user_id: UserId) -> Result<(), ConnectError> {
        if self.open {
            return Ok(());
        }
        let result = {
            let mut state = self.state.lock();
            state.connects += 1;
            state.tokens.push(credential.token().to_string());
            match state.script.pop_front() {
                Some(result) => result,
                None => state.default_connect.clone().unwrap_or(Ok(())),
            }
        };
        self.open = result.is_ok();
        result
    }

    async fn next_event(&mut self) -> TransportEvent {
        if !self.open {
            return TransportEvent::Closed(CloseReason::Client);
        }
        match self.inbound.next().await {
            Some(TransportEvent::Closed(reason)) => {
                self.open = false;
                TransportEvent::Closed(reason)
            }
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), SendError> {
        if !self.open {
            return Err(SendError("not connected".into()));
        }
        self.state.lock().sent.push(command);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.open {
            self.state.lock().disconnects += 1;
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Default)]
struct SourceState {
    list: Vec<Notification>,
    failing: bool,
    fetches: u32,
    queries: Vec<NotificationQuery>,
}

/// REST stand-in returning a fixed list, or failing.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_list(&self, list: Vec<Notification>) {
        self.state.lock().list = list;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    pub fn fetches(&self) -> u32 {
        self.state.lock().fetches
    }

    pub fn queries(&self) -> Vec<NotificationQuery> {
        self.state.lock().queries.clone()
    }

    pub fn shared(&self) -> Arc<dyn NotificationSource> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    async fn fetch(
        &self,
        query: &NotificationQuery,
        _credential: &Credential,
    ) -> Result<Vec<Notification>, FetchError> {
        let mut state = self.state.lock();
        state.fetches += 1;
        state.queries.push(query.clone());
        if state.failing {
            return Err(ApiError::Network("connection refused".into()));
        }
        Ok(state.list.clone())
    }
}
