//! Poller error types.

use std::time::Duration;

use adgen_models::TargetError;
use thiserror::Error;

/// Result type for poller operations.
pub type PollResult<T> = Result<T, PollError>;

/// Errors raised while fetching status or reported when a session ends.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Status request cancelled")]
    Cancelled,

    #[error("Status request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Status endpoint returned {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid status response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Polling stopped after {attempts} consecutive errors: {last_error}")]
    ThresholdExceeded { attempts: u32, last_error: String },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl PollError {
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn threshold_exceeded(attempts: u32, last_error: &PollError) -> Self {
        Self::ThresholdExceeded {
            attempts,
            last_error: last_error.to_string(),
        }
    }

    /// Cancellation caused by teardown or supersession. Never counted or shown.
    pub fn is_silent(&self) -> bool {
        matches!(self, PollError::Cancelled)
    }

    /// Failures that are retried at the next tick and count toward the threshold.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PollError::Timeout(_)
                | PollError::RequestFailed { .. }
                | PollError::Network(_)
                | PollError::InvalidResponse(_)
        )
    }

    /// Programmer errors caught before any request is made.
    pub fn is_precondition(&self) -> bool {
        matches!(self, PollError::InvalidTarget(_) | PollError::Config(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::InvalidTarget(_) => "invalid_target",
            PollError::Cancelled => "cancelled",
            PollError::Timeout(_) => "timeout",
            PollError::RequestFailed { .. } => "http_error",
            PollError::Network(_) => "network",
            PollError::InvalidResponse(_) => "invalid_response",
            PollError::Config(_) => "config",
            PollError::ThresholdExceeded { .. } => "threshold",
            PollError::GenerationFailed(_) => "generation_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(PollError::Cancelled.is_silent());
        assert!(!PollError::Cancelled.is_transient());

        let timeout = PollError::Timeout(Duration::from_secs(10));
        assert!(timeout.is_transient());
        assert!(!timeout.is_silent());

        assert!(PollError::request_failed(503, "unavailable").is_transient());
        assert!(PollError::from(TargetError::Missing).is_precondition());
        assert!(!PollError::GenerationFailed("boom".into()).is_transient());
    }

    #[test]
    fn test_threshold_message_is_distinct_from_server_failure() {
        let last = PollError::request_failed(500, "internal");
        let threshold = PollError::threshold_exceeded(5, &last).to_string();
        let server = PollError::GenerationFailed("render crashed".into()).to_string();

        assert!(threshold.starts_with("Polling stopped after 5 consecutive errors"));
        assert!(threshold.contains("500"));
        assert!(server.starts_with("Generation failed:"));
    }
}
