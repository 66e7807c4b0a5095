//! Structured session logging.

use adgen_models::{PollTarget, Status};
use tracing::{debug, error, info, warn, Span};

/// Logs poll session lifecycle events with the target attached.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    target_id: String,
    target_kind: &'static str,
    generation: u64,
}

impl SessionLogger {
    pub fn new(target: &PollTarget, generation: u64) -> Self {
        Self {
            target_id: target.id.clone(),
            target_kind: target.kind.as_str(),
            generation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            target_id = %self.target_id,
            target_kind = self.target_kind,
            generation = self.generation,
            "Poll session started: {}", message
        );
    }

    pub fn log_status(&self, attempt: u64, status: &Status) {
        debug!(
            target_id = %self.target_id,
            target_kind = self.target_kind,
            attempt,
            state = %status.raw_state,
            percent_complete = ?status.percent_complete,
            "Status received"
        );
    }

    pub fn log_warning(&self, attempt: u64, failures: u32, message: &str) {
        warn!(
            target_id = %self.target_id,
            target_kind = self.target_kind,
            attempt,
            consecutive_failures = failures,
            "Status request failed: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            target_id = %self.target_id,
            target_kind = self.target_kind,
            "Poll session failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            target_id = %self.target_id,
            target_kind = self.target_kind,
            "Poll session completed: {}", message
        );
    }

    pub fn log_stopped(&self, message: &str) {
        debug!(
            target_id = %self.target_id,
            target_kind = self.target_kind,
            generation = self.generation,
            "Poll session stopped: {}", message
        );
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn target_kind(&self) -> &str {
        self.target_kind
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "poll_session",
            target_id = %self.target_id,
            target_kind = self.target_kind,
            generation = self.generation
        )
    }
}
