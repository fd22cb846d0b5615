/// Shared LLM transport types.
///
/// Defines the `LlmClient` trait implemented by every backend, the error type
/// they share, and the retry helper wrapping their HTTP calls.
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Errors that can occur when talking to an LLM backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Backend-specific errors (missing fields, error payloads)
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Required client setting is missing
    #[error("LLM client misconfigured: {0}")]
    Config(String),
}

impl LlmError {
    /// Classifies a transport error as a timeout or a generic network failure.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LlmError::Timeout(error)
        } else {
            LlmError::Network(error)
        }
    }
}

/// A rendered prompt: a system instruction plus the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// A text-completion backend.
///
/// This trait enables mocking in unit tests and lets the oracle stay agnostic
/// of the concrete provider.
pub trait LlmClient: Send + Sync {
    /// Sends the prompt and returns the raw model output.
    fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// Model or deployment name, for logs and result directories.
    fn model_name(&self) -> &str;
}

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubled on every further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Retries an operation with exponential backoff.
///
/// Only transient errors (HTTP 5xx, network errors, timeouts) are retried;
/// anything else is returned immediately. After the retries are exhausted the
/// last error is returned.
pub fn retry_with_backoff<F, T>(policy: RetryPolicy, mut f: F) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for retry in 0..policy.max_retries {
        let delay = policy.delay_for(retry);
        debug!(retry = retry + 1, delay_ms = delay.as_millis() as u64, error = %last_error, "Retrying LLM call");
        thread::sleep(delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Returns `true` for transient errors worth another attempt.
fn should_retry(error: &LlmError) -> bool {
    match error {
        LlmError::Network(_) | LlmError::Timeout(_) => true,
        LlmError::Http { status } => (500..600).contains(status),
        LlmError::Serialization(_)
        | LlmError::Api { .. }
        | LlmError::InvalidUrl(_)
        | LlmError::Config(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::error::Error;

    fn network_error() -> LlmError {
        LlmError::Network(
            reqwest::blocking::Client::new()
                .get("not-a-valid-url")
                .build()
                .unwrap_err(),
        )
    }

    fn fast(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn http_error_mentions_status() {
        let msg = LlmError::Http { status: 404 }.to_string();
        assert!(msg.contains("404"));
    }

    #[test]
    fn serialization_error_keeps_source() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err = LlmError::Serialization(json_error);
        assert!(err.source().is_some());
    }

    #[test]
    fn non_timeout_reqwest_errors_map_to_network() {
        let reqwest_error = reqwest::blocking::Client::new()
            .get("not-a-valid-url")
            .build()
            .unwrap_err();
        assert!(matches!(
            LlmError::from_reqwest(reqwest_error),
            LlmError::Network(_)
        ));
    }

    #[test]
    fn retry_succeeds_after_transient_network_error() {
        let attempts = Cell::new(0);
        let result = retry_with_backoff(fast(3), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 2 {
                Err(network_error())
            } else {
                Ok("success")
            }
        });
        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn retry_stops_after_configured_attempts() {
        let attempts = Cell::new(0);
        let result: Result<(), LlmError> = retry_with_backoff(fast(3), || {
            attempts.set(attempts.get() + 1);
            Err(LlmError::Http { status: 503 })
        });
        assert!(matches!(result, Err(LlmError::Http { status: 503 })));
        assert_eq!(attempts.get(), 4);
    }

    #[test]
    fn no_retry_on_client_errors() {
        let attempts = Cell::new(0);
        let result: Result<(), LlmError> = retry_with_backoff(fast(3), || {
            attempts.set(attempts.get() + 1);
            Err(LlmError::Http { status: 404 })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn no_retry_on_api_errors() {
        let attempts = Cell::new(0);
        let result: Result<(), LlmError> = retry_with_backoff(fast(3), || {
            attempts.set(attempts.get() + 1);
            Err(LlmError::Api {
                message: "model not found".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn disabled_policy_makes_single_attempt() {
        let attempts = Cell::new(0);
        let _: Result<(), LlmError> = retry_with_backoff(RetryPolicy::none(), || {
            attempts.set(attempts.get() + 1);
            Err(network_error())
        });
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn delays_double_per_retry() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }
}
