//! Server-sent events transport.
//!
//! SSE is one-way: the stream URL already scopes delivery to the user, so
//! room commands are accepted and dropped. Each SSE event is rewritten into
//! the same `{"type", "data"}` frame shape the WebSocket carries.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use labnotify_shared::{ApiError, ClientCommand, UserId};
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use super::{PushTransport, TransportEvent};
use crate::credential::Credential;
use crate::error::{ConnectError, SendError};
use crate::retry::CloseReason;

type ByteStream = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

pub struct SseTransport {
    url: String,
    client: reqwest::Client,
    handshake_timeout: Duration,
    stream: Option<ByteStream>,
    /// Bytes received but not yet split into complete events.
    buffer: Vec<u8>,
}

impl SseTransport {
    pub fn new(url: impl Into<String>, handshake_timeout: Duration) -> Self {
        // No overall timeout: the event stream stays open indefinitely.
        let client = match reqwest::Client::builder().connect_timeout(handshake_timeout).build() {
            Ok(client) => client,
            Err(e) => {
                crate::log_warn!("event stream client unavailable, using defaults: {}", e);
                reqwest::Client::new()
            }
        };
        Self {
            url: url.into(),
            client,
            handshake_timeout,
            stream: None,
            buffer: Vec::new(),
        }
    }

    fn stream_url(&self, user_id: UserId) -> Result<url::Url, ConnectError> {
        let mut url = url::Url::parse(&self.url)
            .map_err(|e| ConnectError::Transport(format!("invalid push url '{}': {}", self.url, e)))?;
        url.query_pairs_mut().append_pair("userId", &user_id.to_string());
        Ok(url)
    }

    /// Pop the next complete event block from the buffer.
    fn take_block(&mut self) -> Option<String> {
        let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
        Some(String::from_utf8_lossy(&block[..end]).into_owned())
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn connect(&mut self, credential: &Credential, user_id: UserId) -> Result<(), ConnectError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let token = credential.usable_token()?;
        let url = self.stream_url(user_id)?;
        self.buffer.clear();

        crate::log_debug!("opening event stream to {}", self.url);
        let request = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        let response = match tokio::time::timeout(self.handshake_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ConnectError::Transport(e.to_string())),
            Err(_) => {
                return Err(ConnectError::Transport(format!(
                    "handshake timed out after {}ms",
                    self.handshake_timeout.as_millis()
                )))
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = tokio::time::timeout(self.handshake_timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(match ApiError::from_status(status, &body) {
                ApiError::Unauthorized { message, .. } => ConnectError::Auth(message),
                other => ConnectError::Transport(other.to_string()),
            });
        }

        self.stream = Some(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
        );
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.stream.is_none() {
            return TransportEvent::Closed(CloseReason::Client);
        }

        let reason = loop {
            if let Some(block) = self.take_block() {
                if let Some(raw) = frame_from_block(&block) {
                    return TransportEvent::Message(raw);
                }
                continue;
            }
            let Some(stream) = self.stream.as_mut() else {
                return TransportEvent::Closed(CloseReason::Client);
            };
            let next = stream.next().await;
            match next {
                Some(Ok(chunk)) => self.push_chunk(&chunk),
                Some(Err(e)) => break CloseReason::Transport(e.to_string()),
                None => break CloseReason::Server,
            }
        };
        self.stream = None;
        self.buffer.clear();
        TransportEvent::Closed(reason)
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), SendError> {
        if self.stream.is_none() {
            return Err(SendError("event stream is not open".to_string()));
        }
        crate::log_debug!("event stream is receive-only; {:?} is implied by the stream url", command);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stream = None;
        self.buffer.clear();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Turn one SSE event block into a JSON frame.
///
/// Named events become `{"type": <event>, "data": <data>}`; unnamed
/// (`message`) events are expected to already be a full frame.
fn frame_from_block(block: &str) -> Option<String> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    let data = data.join("\n");
    match event {
        None | Some("message") => Some(data),
        Some(kind) => {
            let payload = serde_json::from_str::<serde_json::Value>(&data)
                .unwrap_or(serde_json::Value::String(data));
            Some(serde_json::json!({ "type": kind, "data": payload }).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_events_are_wrapped() {
        let raw = frame_from_block("event: notification_created\ndata: {\"id\":7}").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "notification_created");
        assert_eq!(value["data"]["id"], 7);
    }

    #[test]
    fn unnamed_events_pass_through_and_comments_are_ignored() {
        let raw = frame_from_block(": keepalive\ndata: {\"type\":\"room_joined\"}").unwrap();
        assert_eq!(raw, "{\"type\":\"room_joined\"}");
        assert_eq!(frame_from_block(": keepalive"), None);
    }

    #[test]
    fn blocks_split_across_chunks() {
        let mut transport = SseTransport::new("http://lab.local/events", Duration::from_secs(1));
        transport.push_chunk(b"event: auth_error\r\ndata: \"exp");
        assert_eq!(transport.take_block(), None);
        transport.push_chunk(b"ired\"\r\n\r\nevent: x");
        let block = transport.take_block().unwrap();
        assert_eq!(block, "event: auth_error\ndata: \"expired\"");
        assert_eq!(transport.buffer, b"event: x");
    }
}
