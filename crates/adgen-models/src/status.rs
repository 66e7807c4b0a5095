//! Generation status models.
//!
//! The status endpoint speaks an open vocabulary of state strings. This module
//! is the one place where that vocabulary is mapped onto the three control
//! categories the poller acts on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State strings that mean the generation finished successfully.
const SUCCESS_STATES: &[&str] = &[
    "completed",
    "complete",
    "succeeded",
    "success",
    "done",
    "finished",
    "ready",
];

/// State strings that mean the generation finished with an error.
const FAILURE_STATES: &[&str] = &[
    "failed",
    "failure",
    "error",
    "errored",
    "cancelled",
    "canceled",
];

/// Fallback reason when the server reports failure without one.
pub const DEFAULT_FAILURE_REASON: &str = "Video generation failed";

/// Normalized generation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    /// Anything the server reports that is not a known terminal state
    #[default]
    InProgress,
    /// Generation finished successfully
    Succeeded,
    /// Generation finished with an error
    Failed,
}

impl GenerationState {
    /// Map a raw server state string onto a control category.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown values are treated as in progress.
    pub fn classify(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();

        if SUCCESS_STATES.contains(&normalized.as_str()) {
            GenerationState::Succeeded
        } else if FAILURE_STATES.contains(&normalized.as_str()) {
            GenerationState::Failed
        } else {
            GenerationState::InProgress
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::InProgress => "in_progress",
            GenerationState::Succeeded => "succeeded",
            GenerationState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Succeeded | GenerationState::Failed)
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status response body as returned by the status endpoint.
///
/// Only `state` is required. Field presence beyond that is not validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// Raw server state string
    #[serde(alias = "status")]
    pub state: String,
    /// Progress indicator, usually 0-100
    #[serde(
        default,
        alias = "progress",
        alias = "percent_complete",
        skip_serializing_if = "Option::is_none"
    )]
    pub percent_complete: Option<f64>,
    /// Human-readable failure reason
    #[serde(
        default,
        alias = "error",
        alias = "error_message",
        alias = "failure_reason",
        skip_serializing_if = "Option::is_none"
    )]
    pub failure_reason: Option<String>,
    /// Location of the rendered preview, once available
    #[serde(
        default,
        alias = "videoUrl",
        alias = "preview_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub preview_url: Option<String>,
}

impl StatusPayload {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            percent_complete: None,
            failure_reason: None,
            preview_url: None,
        }
    }

    pub fn with_progress(mut self, percent: f64) -> Self {
        self.percent_complete = Some(percent);
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }
}

/// Last observed generation status.
///
/// `percent_complete` and `failure_reason` are carried verbatim from the
/// payload; nothing here clamps or smooths them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Normalized state
    pub state: GenerationState,
    /// State string exactly as the server sent it
    pub raw_state: String,
    /// Progress indicator
    pub percent_complete: Option<f64>,
    /// Server-supplied failure reason
    pub failure_reason: Option<String>,
    /// Preview location, if the server sent one
    pub preview_url: Option<String>,
    /// When this status was received
    pub observed_at: DateTime<Utc>,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Failure reason to report, falling back to a generic message.
    pub fn failure_message(&self) -> String {
        match self.failure_reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => DEFAULT_FAILURE_REASON.to_string(),
        }
    }
}

impl From<StatusPayload> for Status {
    fn from(payload: StatusPayload) -> Self {
        Self {
            state: GenerationState::classify(&payload.state),
            raw_state: payload.state,
            percent_complete: payload.percent_complete,
            failure_reason: payload.failure_reason,
            preview_url: payload.preview_url,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_terminal_states() {
        assert_eq!(GenerationState::classify("completed"), GenerationState::Succeeded);
        assert_eq!(GenerationState::classify("COMPLETED"), GenerationState::Succeeded);
        assert_eq!(GenerationState::classify("  Ready "), GenerationState::Succeeded);
        assert_eq!(GenerationState::classify("failed"), GenerationState::Failed);
        assert_eq!(GenerationState::classify("Error"), GenerationState::Failed);
        assert_eq!(GenerationState::classify("canceled"), GenerationState::Failed);
    }

    #[test]
    fn test_classify_unknown_is_in_progress() {
        assert_eq!(GenerationState::classify("processing"), GenerationState::InProgress);
        assert_eq!(GenerationState::classify("queued"), GenerationState::InProgress);
        assert_eq!(GenerationState::classify("rendering_variations"), GenerationState::InProgress);
        assert_eq!(GenerationState::classify(""), GenerationState::InProgress);
        assert!(!GenerationState::InProgress.is_terminal());
    }

    #[test]
    fn test_payload_canonical_fields() {
        let payload: StatusPayload = serde_json::from_str(
            r#"{"state":"processing","percentComplete":40,"extra":{"ignored":true}}"#,
        )
        .unwrap();

        assert_eq!(payload.state, "processing");
        assert_eq!(payload.percent_complete, Some(40.0));
        assert!(payload.failure_reason.is_none());
    }

    #[test]
    fn test_payload_aliases() {
        let payload: StatusPayload = serde_json::from_str(
            r#"{"status":"failed","progress":12.5,"error":"render crashed","videoUrl":"https://cdn/x.mp4"}"#,
        )
        .unwrap();

        assert_eq!(payload.state, "failed");
        assert_eq!(payload.percent_complete, Some(12.5));
        assert_eq!(payload.failure_reason.as_deref(), Some("render crashed"));
        assert_eq!(payload.preview_url.as_deref(), Some("https://cdn/x.mp4"));
    }

    #[test]
    fn test_payload_requires_state() {
        let result: Result<StatusPayload, _> = serde_json::from_str(r#"{"percentComplete":10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_passes_values_through() {
        let status = Status::from(StatusPayload::new("Processing").with_progress(140.0));

        assert_eq!(status.state, GenerationState::InProgress);
        assert_eq!(status.raw_state, "Processing");
        assert_eq!(status.percent_complete, Some(140.0));
    }

    #[test]
    fn test_failure_message_fallback() {
        let with_reason = Status::from(StatusPayload::new("failed").with_failure_reason("quota"));
        assert_eq!(with_reason.failure_message(), "quota");

        let blank = Status::from(StatusPayload::new("failed").with_failure_reason("  "));
        assert_eq!(blank.failure_message(), DEFAULT_FAILURE_REASON);

        let missing = Status::from(StatusPayload::new("failed"));
        assert_eq!(missing.failure_message(), DEFAULT_FAILURE_REASON);
    }
}
