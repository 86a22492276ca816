//! Engine error taxonomy.
//!
//! - [`ConnectError`]: push handshake failed (auth is terminal, transport is retryable)
//! - [`ProtocolError`]: a push frame could not be understood; dropped
//! - [`FetchError`]: a poll request failed; retried on the next tick

use thiserror::Error;

use crate::retry::CloseReason;

pub use labnotify_shared::ProtocolError;

/// Poll failures reuse the shared REST error type.
pub type FetchError = labnotify_shared::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectError {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            ConnectError::Auth(msg) => CloseReason::Auth(msg.clone()),
            ConnectError::Transport(msg) => CloseReason::Transport(msg.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("send failed: {0}")]
pub struct SendError(pub String);
