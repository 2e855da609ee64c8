//! LLM transport errors and retry policy.
//!
//! Errors are classified so the client knows which failures are worth
//! retrying (rate limits, 5xx, network) and which are final (4xx,
//! unparseable payloads). Retry never crosses the client boundary: the
//! orchestrator above observes one success or failure per call.

use std::time::Duration;
use thiserror::Error;

/// A failed call to the model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Provider-suggested wait, from the Retry-After header.
        retry_after: Option<Duration>,
    },

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("unparseable response: {message}")]
    Parse { message: String },
}

impl LlmError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => Self::RateLimited {
                message: body,
                retry_after,
            },
            400..=499 => Self::Client {
                status,
                message: body,
            },
            _ => Self::Server {
                status,
                message: body,
            },
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Whether retrying the same request can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network { .. }
        )
    }

    /// Delay before retry attempt `attempt` (0-based).
    ///
    /// Honors the provider's Retry-After when present; otherwise exponential
    /// backoff from a per-kind base, capped at one minute.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if let Self::RateLimited {
            retry_after: Some(wait),
            ..
        } = self
        {
            return *wait;
        }

        let base_secs: u64 = match self {
            Self::RateLimited { .. } => 5,
            Self::Server { .. } => 2,
            _ => 1,
        };
        let backoff = base_secs.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(backoff.min(60))
    }
}

/// Bounds on the retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Hard wall-clock budget for the whole call, retries included.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_elapsed: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Decide whether to retry after `error`, given the attempt number and
    /// time already spent.
    pub fn allows_retry(&self, error: &LlmError, attempt: u32, elapsed: Duration) -> bool {
        error.is_transient() && attempt < self.max_retries && elapsed < self.max_elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            LlmError::from_status(429, String::new(), None),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            LlmError::from_status(503, String::new(), None),
            LlmError::Server { status: 503, .. }
        ));
        assert!(matches!(
            LlmError::from_status(401, String::new(), None),
            LlmError::Client { status: 401, .. }
        ));
    }

    #[test]
    fn only_transient_kinds_retry() {
        let policy = RetryPolicy::default();
        let elapsed = Duration::from_secs(1);

        let rate = LlmError::from_status(429, String::new(), None);
        let auth = LlmError::from_status(401, String::new(), None);
        let parse = LlmError::parse("bad json");

        assert!(policy.allows_retry(&rate, 0, elapsed));
        assert!(!policy.allows_retry(&auth, 0, elapsed));
        assert!(!policy.allows_retry(&parse, 0, elapsed));
        // Attempt budget exhausted
        assert!(!policy.allows_retry(&rate, 3, elapsed));
        // Time budget exhausted
        assert!(!policy.allows_retry(&rate, 0, Duration::from_secs(600)));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let err = LlmError::network("connection reset");
        assert!(err.retry_delay(1) > err.retry_delay(0));
        assert!(err.retry_delay(10) <= Duration::from_secs(60));
    }

    #[test]
    fn retry_after_wins_over_backoff() {
        let err = LlmError::from_status(
            429,
            String::new(),
            Some(Duration::from_secs(30)),
        );
        assert_eq!(err.retry_delay(0), Duration::from_secs(30));
        assert_eq!(err.retry_delay(4), Duration::from_secs(30));
    }
}
