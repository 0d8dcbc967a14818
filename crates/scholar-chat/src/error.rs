//! Error types for the chat session.

use std::time::Duration;

/// Errors from the chat engine that reach the caller.
///
/// Answering failures are absorbed into the message log and never surface
/// here.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("no knowledge context loaded; sign in first")]
    NoContext,
}

/// Why a call to the answering service failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnsweringError {
    /// 401/403: bad API key or permissions.
    #[error("authentication with the answering service failed: {0}")]
    Auth(String),
    /// 429, optionally with a server-provided retry delay.
    #[error("rate limited by the answering service{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
    /// 404 on the model endpoint.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// Any other non-success status.
    #[error("answering service returned {status}: {message}")]
    Upstream { status: u16, message: String },
    /// Connection refused, DNS failure, reset.
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The body was not the JSON shape we expect.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The service answered but produced no usable text (blocked or empty).
    #[error("no answer was produced: {0}")]
    NoAnswer(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    }
}

impl AnsweringError {
    /// Whether repeating the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnsweringError::RateLimited { .. }
                | AnsweringError::Timeout(_)
                | AnsweringError::Network(_)
                | AnsweringError::Upstream { status: 500..=599, .. }
        )
    }

    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AnsweringError::Timeout(timeout)
        } else if err.is_decode() {
            AnsweringError::Malformed(err.to_string())
        } else {
            AnsweringError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(
            ChatError::NoContext.to_string(),
            "no knowledge context loaded; sign in first"
        );
        assert_eq!(
            ChatError::Configuration("missing API key".into()).to_string(),
            "configuration error: missing API key"
        );
    }

    #[test]
    fn test_no_context_display() {
        assert_eq!(
            ChatError::NoContext.to_string(),
            "no knowledge context loaded; sign in first"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = AnsweringError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "request timed out after 30s");
    }

    #[test]
    fn test_rate_limited_display() {
        let with = AnsweringError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(
            with.to_string(),
            "rate limited by the answering service (retry after 7s)"
        );
        let without = AnsweringError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(without.to_string(), "rate limited by the answering service");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AnsweringError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(AnsweringError::Network("x".into()).is_retryable());
        assert!(AnsweringError::RateLimited {
            retry_after_secs: None
        }
        .is_retryable());
        assert!(AnsweringError::Upstream {
            status: 503,
            message: "down".into()
        }
        .is_retryable());

        assert!(!AnsweringError::Auth("bad key".into()).is_retryable());
        assert!(!AnsweringError::Upstream {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!AnsweringError::Malformed("x".into()).is_retryable());
        assert!(!AnsweringError::NoAnswer("blocked".into()).is_retryable());
    }
}
