//! Reconnect policy and error classification
//!
//! Transport failures are never returned to callers; they are absorbed by the
//! reconnect loop in [`crate::realtime::ConnectionManager`], which draws its
//! delays from a [`Backoff`] built out of a [`ReconnectPolicy`]. Fetch failures
//! are logged with an [`ErrorCategory`] tag and leave cached state untouched.

use std::time::Duration;

/// Reconnect policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts per chain, `None` retries forever
    pub max_attempts: Option<u32>,

    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(1_000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectPolicy {
    /// Policy that gives up after `attempts` reconnects in a single chain.
    ///
    /// The default policy never gives up: a channel that stays broken keeps
    /// retrying at `max_delay`. Reach for this when the backend may be
    /// permanently unreachable.
    pub fn with_ceiling(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
            ..Default::default()
        }
    }

    /// Start a fresh delay chain for this policy
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.clone())
    }
}

/// Delay state for one reconnect chain.
///
/// Shared by every attempt of a chain and reset as soon as one of them is
/// acknowledged by the backend.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let next = policy.initial_delay;
        Self {
            policy,
            next,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt, or `None` once the ceiling is hit
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let delay = self.next.min(self.policy.max_delay);
        self.attempts += 1;

        let scaled = (delay.as_millis() as f64 * self.policy.backoff_multiplier).round() as u64;
        self.next = Duration::from_millis(scaled).min(self.policy.max_delay);

        Some(delay)
    }

    pub fn reset(&mut self) {
        self.next = self.policy.initial_delay;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Categorized error types for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient)
    Network,

    /// Timeout errors (transient)
    Timeout,

    /// Payload could not be decoded
    Decode,

    /// Configuration errors
    Configuration,

    /// Unknown errors
    Unknown,
}

impl ErrorCategory {
    /// Whether a later reload is likely to succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Decode => "decode",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// Categorize an error by walking its context chain
pub fn categorize_error(error: &anyhow::Error) -> ErrorCategory {
    for cause in error.chain() {
        if let Some(err) = cause.downcast_ref::<reqwest::Error>() {
            if err.is_timeout() {
                return ErrorCategory::Timeout;
            }
            if err.is_decode() {
                return ErrorCategory::Decode;
            }
            return ErrorCategory::Network;
        }
        if cause.is::<serde_json::Error>() {
            return ErrorCategory::Decode;
        }
    }

    let error_str = format!("{error:#}").to_lowercase();

    if error_str.contains("timeout") || error_str.contains("timed out") {
        ErrorCategory::Timeout
    } else if error_str.contains("network")
        || error_str.contains("connection")
        || error_str.contains("dns")
    {
        ErrorCategory::Network
    } else if error_str.contains("decode") || error_str.contains("invalid type") {
        ErrorCategory::Decode
    } else if error_str.contains("config") || error_str.contains("not configured") {
        ErrorCategory::Configuration
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(delays: &[Option<Duration>]) -> Vec<u64> {
        delays
            .iter()
            .map(|d| d.map(|d| d.as_millis() as u64).unwrap_or(0))
            .collect()
    }

    #[test]
    fn test_default_backoff_sequence() {
        let mut backoff = ReconnectPolicy::default().backoff();
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay()).collect();

        assert_eq!(
            millis(&delays),
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000]
        );
        assert_eq!(backoff.attempts(), 8);
    }

    #[test]
    fn test_backoff_reset_starts_over() {
        let mut backoff = ReconnectPolicy::default().backoff();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn test_ceiling_stops_chain() {
        let mut backoff = ReconnectPolicy::with_ceiling(2).backoff();

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_error_categorization() {
        let net_err = anyhow::anyhow!("connection refused");
        assert_eq!(categorize_error(&net_err), ErrorCategory::Network);

        let timeout_err = anyhow::anyhow!("request timed out");
        assert_eq!(categorize_error(&timeout_err), ErrorCategory::Timeout);

        let decode_err: anyhow::Error = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert_eq!(categorize_error(&decode_err), ErrorCategory::Decode);

        let config_err = anyhow::anyhow!("backend url not configured");
        assert_eq!(categorize_error(&config_err), ErrorCategory::Configuration);
    }

    #[test]
    fn test_transient() {
        assert!(ErrorCategory::Network.is_transient());
        assert!(!ErrorCategory::Decode.is_transient());
    }
}
