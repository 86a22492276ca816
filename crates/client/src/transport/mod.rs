//! Push transports.
//!
//! A transport owns exactly one underlying connection and never reconnects on
//! its own; the session decides when to try again.
//!
//! ```text
//!   connect(credential, user) ──► handshake + server ack ──► open
//!                                                             │
//!        next_event() ◄── Message(raw) ◄──────────────────────┤
//!        next_event() ◄── Closed(reason) ◄── server / auth / io
//!        disconnect() ──► idle (idempotent)
//! ```

use async_trait::async_trait;
use labnotify_shared::{ClientCommand, UserId};

use crate::config::{NotifyConfig, TransportKind};
use crate::credential::Credential;
use crate::error::{ConnectError, SendError};
use crate::retry::CloseReason;

mod sse;
mod websocket;

pub use sse::SseTransport;
pub use websocket::WsTransport;

/// What an open transport produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A raw application frame (JSON text).
    Message(String),
    /// The connection is gone; the transport is idle again.
    Closed(CloseReason),
}

#[async_trait]
pub trait PushTransport: Send {
    /// Open the connection and wait for the server to acknowledge it.
    ///
    /// A no-op when already open. The credential is attached the same way on
    /// every call.
    async fn connect(&mut self, credential: &Credential, user_id: UserId) -> Result<(), ConnectError>;

    /// Next inbound event. Returns `Closed(Client)` immediately when not open.
    ///
    /// Must be cancel safe: it is polled inside `select!`.
    async fn next_event(&mut self) -> TransportEvent;

    async fn send(&mut self, command: ClientCommand) -> Result<(), SendError>;

    /// Close and return to idle. Idempotent.
    async fn disconnect(&mut self);

    fn is_open(&self) -> bool;
}

/// Build the transport selected by the configuration.
pub fn from_config(config: &NotifyConfig) -> Box<dyn PushTransport> {
    match config.transport {
        TransportKind::WebSocket => Box::new(WsTransport::new(config.push_url(), config.handshake_timeout)),
        TransportKind::Sse => Box::new(SseTransport::new(config.push_url(), config.handshake_timeout)),
    }
}
