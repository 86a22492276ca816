//! Engine configuration, read once from the environment at startup.

use std::time::Duration;

use labnotify_shared::SortOrder;
use thiserror::Error;

use crate::retry::ReconnectPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which push transport to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    WebSocket,
    Sse,
}

/// Delivery engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyConfig {
    /// Push endpoint base, e.g. `ws://lab.example.org` (or `https://` for SSE).
    pub push_base_url: String,
    /// Namespace/path appended to the push base.
    pub push_namespace: String,
    /// REST base for the poll fallback.
    pub api_base_url: String,
    pub transport: TransportKind,
    pub poll_interval: Duration,
    /// Minimum gap between push recovery probes while polling.
    pub probe_interval: Duration,
    pub handshake_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub push_enabled: bool,
    pub fallback_enabled: bool,
    pub sort_order: SortOrder,
    pub is_read: Option<bool>,
    pub task_type: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            push_base_url: "ws://localhost:3000".to_string(),
            push_namespace: "/notifications".to_string(),
            api_base_url: "http://localhost:3000".to_string(),
            transport: TransportKind::WebSocket,
            poll_interval: Duration::from_secs(30),
            probe_interval: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            push_enabled: true,
            fallback_enabled: true,
            sort_order: SortOrder::Desc,
            is_read: None,
            task_type: None,
        }
    }
}

impl NotifyConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables (all optional):
    /// - `LABNOTIFY_PUSH_URL`, `LABNOTIFY_PUSH_NAMESPACE`, `LABNOTIFY_API_URL`
    /// - `LABNOTIFY_TRANSPORT`: "websocket" | "sse"
    /// - `LABNOTIFY_POLL_INTERVAL_MS`, `LABNOTIFY_PROBE_INTERVAL_MS`, `LABNOTIFY_HANDSHAKE_TIMEOUT_MS`
    /// - `LABNOTIFY_MAX_RECONNECT_ATTEMPTS`, `LABNOTIFY_BASE_DELAY_MS`, `LABNOTIFY_CAP_DELAY_MS`
    /// - `LABNOTIFY_PUSH_ENABLED`, `LABNOTIFY_FALLBACK_ENABLED`: true/false
    /// - `LABNOTIFY_SORT_ORDER`, `LABNOTIFY_IS_READ`, `LABNOTIFY_TASK_TYPE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let transport = match get("LABNOTIFY_TRANSPORT") {
            None => defaults.transport,
            Some(raw) => match raw.to_lowercase().as_str() {
                "websocket" | "ws" => TransportKind::WebSocket,
                "sse" => TransportKind::Sse,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "LABNOTIFY_TRANSPORT",
                        value: raw,
                        reason: "expected 'websocket' or 'sse'".to_string(),
                    })
                }
            },
        };

        let reconnect = ReconnectPolicy {
            max_attempts: parse_or(
                &get,
                "LABNOTIFY_MAX_RECONNECT_ATTEMPTS",
                defaults.reconnect.max_attempts,
            )?,
            base_delay: millis_or(&get, "LABNOTIFY_BASE_DELAY_MS", defaults.reconnect.base_delay)?,
            cap_delay: match get("LABNOTIFY_CAP_DELAY_MS") {
                None => defaults.reconnect.cap_delay,
                Some(_) => Some(millis_or(&get, "LABNOTIFY_CAP_DELAY_MS", Duration::ZERO)?),
            },
        };

        let sort_order = match get("LABNOTIFY_SORT_ORDER") {
            None => defaults.sort_order,
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "LABNOTIFY_SORT_ORDER",
                value: raw,
                reason,
            })?,
        };

        let is_read = match get("LABNOTIFY_IS_READ") {
            None => None,
            Some(_) => Some(bool_or(&get, "LABNOTIFY_IS_READ", false)?),
        };

        Ok(Self {
            push_base_url: get("LABNOTIFY_PUSH_URL").unwrap_or(defaults.push_base_url),
            push_namespace: get("LABNOTIFY_PUSH_NAMESPACE").unwrap_or(defaults.push_namespace),
            api_base_url: get("LABNOTIFY_API_URL").unwrap_or(defaults.api_base_url),
            transport,
            poll_interval: positive_millis_or(&get, "LABNOTIFY_POLL_INTERVAL_MS", defaults.poll_interval)?,
            probe_interval: positive_millis_or(
                &get,
                "LABNOTIFY_PROBE_INTERVAL_MS",
                defaults.probe_interval,
            )?,
            handshake_timeout: positive_millis_or(
                &get,
                "LABNOTIFY_HANDSHAKE_TIMEOUT_MS",
                defaults.handshake_timeout,
            )?,
            reconnect,
            push_enabled: bool_or(&get, "LABNOTIFY_PUSH_ENABLED", defaults.push_enabled)?,
            fallback_enabled: bool_or(&get, "LABNOTIFY_FALLBACK_ENABLED", defaults.fallback_enabled)?,
            sort_order,
            is_read,
            task_type: get("LABNOTIFY_TASK_TYPE"),
        })
    }

    /// Full push endpoint URL (base + namespace).
    pub fn push_url(&self) -> String {
        let base = self.push_base_url.trim_end_matches('/');
        let path = self.push_namespace.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value: raw,
        }),
    }
}

fn millis_or(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(get, var, default_ms).map(Duration::from_millis)
}

/// Like [`millis_or`], but zero is rejected. Used for timer periods.
fn positive_millis_or(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let value = millis_or(get, var, default)?;
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            var,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn bool_or(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}
