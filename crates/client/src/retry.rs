//! Reconnection policy: exponential backoff with an attempt budget.
//!
//! The policy is pure. The session owns the [`RetryState`] and mutates it
//! between consultations; nothing here sleeps or touches a socket.

use std::time::Duration;

/// Why a push connection ended (or never opened).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed an established connection.
    Server,
    /// The credential was refused. Never retried.
    Auth(String),
    /// Handshake failure, timeout or IO error.
    Transport(String),
    /// We closed it ourselves.
    Client,
}

impl CloseReason {
    pub fn is_auth(&self) -> bool {
        matches!(self, CloseReason::Auth(_))
    }

    /// Text reported to the UI alongside the status.
    pub fn describe(&self) -> String {
        match self {
            CloseReason::Server => "connection closed by server".to_string(),
            CloseReason::Auth(msg) => format!("authentication failed: {}", msg),
            CloseReason::Transport(msg) => msg.clone(),
            CloseReason::Client => "closed".to_string(),
        }
    }
}

/// Attempt bookkeeping, reset on every successful connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub next_delay: Duration,
}

impl RetryState {
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempt: 0,
            next_delay: policy.base_delay,
        }
    }

    pub fn reset(&mut self, policy: &ReconnectPolicy) {
        *self = Self::new(policy);
    }

    /// Record a scheduled retry.
    pub fn advance(&mut self, delay: Duration) {
        self.attempt += 1;
        self.next_delay = delay;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Configuration for reconnect behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries allowed after the first failure before falling back.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay; `None` leaves it unbounded.
    pub cap_delay: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            cap_delay: None,
        }
    }
}

impl ReconnectPolicy {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        match self.cap_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    pub fn next_action(&self, state: &RetryState, reason: &CloseReason) -> RetryDecision {
        match reason {
            CloseReason::Auth(_) | CloseReason::Client => RetryDecision::GiveUp,
            _ if state.attempt >= self.max_attempts => RetryDecision::GiveUp,
            _ => RetryDecision::Retry {
                delay: self.delay_for_attempt(state.attempt),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> CloseReason {
        CloseReason::Transport("timeout".into())
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<_> = (0..5).map(|a| policy.delay_for_attempt(a).as_millis()).collect();
        assert_eq!(delays, [1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn cap_bounds_every_delay() {
        let policy = ReconnectPolicy {
            cap_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn budget_is_exhausted_after_max_attempts() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        let mut state = RetryState::new(&policy);
        let mut retries = 0;
        while let RetryDecision::Retry { delay } = policy.next_action(&state, &transport()) {
            state.advance(delay);
            retries += 1;
        }
        assert_eq!(retries, 3);
        assert_eq!(state.next_delay, Duration::from_secs(4));

        state.reset(&policy);
        assert_eq!(state, RetryState::new(&policy));
    }

    #[test]
    fn auth_gives_up_immediately() {
        let policy = ReconnectPolicy::default();
        let state = RetryState::new(&policy);
        assert_eq!(
            policy.next_action(&state, &CloseReason::Auth("expired".into())),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.next_action(&state, &CloseReason::Server),
            RetryDecision::Retry {
                delay: Duration::from_secs(1)
            }
        );
    }
}
