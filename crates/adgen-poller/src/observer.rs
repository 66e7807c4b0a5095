//! Session callbacks.
//!
//! Every terminal outcome reaches the caller through exactly one of
//! [`PollObserver::on_success`] or [`PollObserver::on_error`] with
//! [`Severity::Fatal`]. Transient failures below the threshold are reported
//! with [`Severity::Warning`]. Silent cancellations are never reported.

use adgen_models::Status;

use crate::error::PollError;

/// How an error report affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Polling continues
    Warning,
    /// The session has ended
    Fatal,
}

impl Severity {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Severity::Fatal)
    }
}

/// Receives the outcome of a poll session.
///
/// Callbacks run on the session task and must not block.
pub trait PollObserver: Send + Sync {
    /// Every successfully fetched status, terminal or not.
    fn on_status(&self, _status: &Status) {}

    /// The target reached a terminal success state. Called at most once per
    /// session.
    fn on_success(&self, status: &Status);

    /// A failure was observed.
    fn on_error(&self, error: &PollError, severity: Severity);
}

type StatusCallback = Box<dyn Fn(&Status) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&PollError, Severity) + Send + Sync>;

/// Observer built from closures.
pub struct CallbackObserver {
    on_status: Option<StatusCallback>,
    on_success: StatusCallback,
    on_error: ErrorCallback,
}

impl CallbackObserver {
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: Fn(&Status) + Send + Sync + 'static,
        E: Fn(&PollError, Severity) + Send + Sync + 'static,
    {
        Self {
            on_status: None,
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        }
    }

    pub fn with_status<F>(mut self, on_status: F) -> Self
    where
        F: Fn(&Status) + Send + Sync + 'static,
    {
        self.on_status = Some(Box::new(on_status));
        self
    }
}

impl PollObserver for CallbackObserver {
    fn on_status(&self, status: &Status) {
        if let Some(callback) = &self.on_status {
            callback(status);
        }
    }

    fn on_success(&self, status: &Status) {
        (self.on_success)(status)
    }

    fn on_error(&self, error: &PollError, severity: Severity) {
        (self.on_error)(error, severity)
    }
}

impl std::fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("on_status", &self.on_status.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use adgen_models::StatusPayload;

    use super::*;

    #[test]
    fn test_callback_observer_dispatch() {
        let successes = Arc::new(AtomicU32::new(0));
        let fatal = Arc::new(AtomicU32::new(0));
        let statuses = Arc::new(AtomicU32::new(0));

        let observer = {
            let successes = Arc::clone(&successes);
            let fatal = Arc::clone(&fatal);
            let statuses = Arc::clone(&statuses);
            CallbackObserver::new(
                move |_| {
                    successes.fetch_add(1, Ordering::SeqCst);
                },
                move |_, severity| {
                    if severity.is_fatal() {
                        fatal.fetch_add(1, Ordering::SeqCst);
                    }
                },
            )
            .with_status(move |_| {
                statuses.fetch_add(1, Ordering::SeqCst);
            })
        };

        let status = Status::from(StatusPayload::new("completed"));
        observer.on_status(&status);
        observer.on_success(&status);
        observer.on_error(&PollError::Cancelled, Severity::Warning);
        observer.on_error(&PollError::GenerationFailed("x".into()), Severity::Fatal);

        assert_eq!(statuses.load(Ordering::SeqCst), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(fatal.load(Ordering::SeqCst), 1);
    }
}
