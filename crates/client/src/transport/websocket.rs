//! WebSocket transport using tokio-tungstenite.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use labnotify_shared::{ClientCommand, ServerEvent, UserId, WsEnvelope};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{PushTransport, TransportEvent};
use crate::credential::Credential;
use crate::error::{ConnectError, SendError};
use crate::retry::CloseReason;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close codes servers use to refuse a credential.
const AUTH_CLOSE_CODES: [u16; 3] = [1008, 4001, 4003];

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct WsTransport {
    url: String,
    handshake_timeout: Duration,
    stream: Option<WsStream>,
    /// Frames that arrived before the server confirmed the connection.
    pending: VecDeque<String>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            handshake_timeout,
            stream: None,
            pending: VecDeque::new(),
        }
    }

    /// Endpoint URL with the credential and user attached as query parameters.
    fn handshake_url(&self, token: &str, user_id: UserId) -> Result<url::Url, ConnectError> {
        let mut url = url::Url::parse(&self.url)
            .map_err(|e| ConnectError::Transport(format!("invalid push url '{}': {}", self.url, e)))?;
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("userId", &user_id.to_string());
        Ok(url)
    }

    async fn handshake(&mut self, url: url::Url) -> Result<WsStream, ConnectError> {
        let (mut stream, _response) = connect_async(url.as_str()).await.map_err(classify_error)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match ServerEvent::parse(text.as_str()) {
                    Ok(ServerEvent::ConnectionConfirmed { .. }) => return Ok(stream),
                    Ok(ServerEvent::AuthError { message }) => return Err(ConnectError::Auth(message)),
                    Ok(ServerEvent::ConnectError { message }) => {
                        return Err(ConnectError::Transport(message))
                    }
                    _ => self.pending.push_back(text.as_str().to_owned()),
                },
                Some(Ok(Message::Close(frame))) => {
                    return Err(match close_reason(frame.as_ref()) {
                        CloseReason::Auth(msg) => ConnectError::Auth(msg),
                        _ => ConnectError::Transport("closed during handshake".to_string()),
                    });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ConnectError::Transport(e.to_string())),
                None => return Err(ConnectError::Transport("closed during handshake".to_string())),
            }
        }
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&mut self, credential: &Credential, user_id: UserId) -> Result<(), ConnectError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let url = self.handshake_url(credential.usable_token()?, user_id)?;
        self.pending.clear();

        crate::log_debug!("opening websocket to {}", self.url);
        let timeout = self.handshake_timeout;
        match tokio::time::timeout(timeout, self.handshake(url)).await {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ConnectError::Transport(format!(
                "handshake timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn next_event(&mut self) -> TransportEvent {
        if let Some(raw) = self.pending.pop_front() {
            return TransportEvent::Message(raw);
        }
        let Some(stream) = self.stream.as_mut() else {
            return TransportEvent::Closed(CloseReason::Client);
        };

        let reason = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return TransportEvent::Message(text.as_str().to_owned());
                }
                Some(Ok(Message::Close(frame))) => break close_reason(frame.as_ref()),
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => continue,
                Some(Err(e)) => break CloseReason::Transport(e.to_string()),
                None => break CloseReason::Server,
            }
        };
        self.stream = None;
        TransportEvent::Closed(reason)
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), SendError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(SendError("websocket is not open".to_string()));
        };
        let json = serde_json::to_string(&WsEnvelope::new(command))
            .map_err(|e| SendError(format!("serialize failed: {}", e)))?;
        crate::log_debug!("sending {}", json);
        stream
            .send(Message::text(json))
            .await
            .map_err(|e| SendError(e.to_string()))
    }

    async fn disconnect(&mut self) {
        self.pending.clear();
        if let Some(mut stream) = self.stream.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, stream.close(None)).await.is_err() {
                crate::log_debug!("websocket close handshake timed out");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

fn classify_error(error: tungstenite::Error) -> ConnectError {
    match &error {
        tungstenite::Error::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            ConnectError::Auth(format!("handshake refused with HTTP {}", response.status().as_u16()))
        }
        _ => ConnectError::Transport(error.to_string()),
    }
}

fn close_reason(frame: Option<&CloseFrame>) -> CloseReason {
    match frame {
        Some(frame) if AUTH_CLOSE_CODES.contains(&u16::from(frame.code)) => {
            let reason = frame.reason.as_str();
            CloseReason::Auth(if reason.is_empty() {
                format!("closed with code {}", u16::from(frame.code))
            } else {
                reason.to_string()
            })
        }
        _ => CloseReason::Server,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn handshake_url_carries_token_and_user() {
        let transport = WsTransport::new("ws://lab.local/notifications", Duration::from_secs(1));
        let url = transport.handshake_url("a b", 42).unwrap();
        assert_eq!(url.as_str(), "ws://lab.local/notifications?token=a+b&userId=42");
    }

    #[test]
    fn invalid_url_is_a_transport_error() {
        let transport = WsTransport::new("not a url", Duration::from_secs(1));
        assert!(matches!(
            transport.handshake_url("t", 1),
            Err(ConnectError::Transport(_))
        ));
    }

    #[test]
    fn auth_close_codes_are_classified() {
        let frame = CloseFrame {
            code: CloseCode::from(4001),
            reason: "token expired".into(),
        };
        assert_eq!(close_reason(Some(&frame)), CloseReason::Auth("token expired".into()));

        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };
        assert_eq!(close_reason(Some(&frame)), CloseReason::Server);
        assert_eq!(close_reason(None), CloseReason::Server);
    }
}
