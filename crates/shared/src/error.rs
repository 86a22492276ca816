//! Shared error types including RFC7807 Problem Details.

use serde::Deserialize;
use thiserror::Error;

/// RFC7807 Problem Details (application/problem+json)
///
/// The notification API answers failed requests with this envelope; only the
/// human-readable parts are needed client side.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    pub type_url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Attempt to parse an RFC7807 (or RFC7807-ish) JSON body into a user-facing message.
/// Prefers `detail`, falls back to `title`.
pub fn try_problem_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ProblemDetails>(body).ok()?;
    if let Some(detail) = parsed.detail {
        if !detail.trim().is_empty() {
            return Some(detail);
        }
    }
    if !parsed.title.trim().is_empty() {
        return Some(parsed.title);
    }
    None
}

/// REST error type, used for poll fetch failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    /// 401/403: the bearer credential was refused.
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// Classify a non-success response, preferring the problem detail text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = try_problem_detail(body).unwrap_or_else(|| body.to_string());
        match status {
            401 | 403 => ApiError::Unauthorized { status, message },
            _ => ApiError::Http {
                status,
                body: message,
            },
        }
    }
}

/// A push frame that could not be understood. Dropped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unknown frame type '{0}'")]
    UnknownKind(String),
    #[error("invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_detail_prefers_detail_then_title() {
        let body = r#"{"type":"about:blank","title":"Unauthorized","status":401,"detail":"token expired"}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("token expired"));

        let body = r#"{"title":"Forbidden","detail":"  "}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("Forbidden"));

        assert_eq!(try_problem_detail("<html>"), None);
    }

    #[test]
    fn status_classification() {
        let err = ApiError::from_status(401, r#"{"title":"Unauthorized","detail":"token expired"}"#);
        assert_eq!(
            err,
            ApiError::Unauthorized {
                status: 401,
                message: "token expired".into()
            }
        );

        let err = ApiError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
    }
}
