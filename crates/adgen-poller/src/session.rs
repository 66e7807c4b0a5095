//! Poll session controller.
//!
//! A session is one tokio task polling one target. It keeps at most one
//! status request in flight: a timer tick or refresh that arrives while a
//! request is outstanding cancels and drops that request before issuing the
//! next one.
//!
//! Cancellation tokens form a two-level tree. The binding owns the session
//! token; each request gets a child token owned by the session. Cancelling
//! the session token therefore also aborts the in-flight request.
//!
//! Observer callbacks run while holding the binding's dispatch gate, and
//! teardown bumps the gate under the same lock. Once teardown returns, no
//! callback from the old session can start or still be running.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use adgen_models::{GenerationState, PollTarget, Status};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::error::{PollError, PollResult};
use crate::failure::FailureTracker;
use crate::fetcher::StatusFetcher;
use crate::logging::SessionLogger;
use crate::metrics::{record_session_end, record_superseded};
use crate::observer::{PollObserver, Severity};

/// Session liveness as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionPhase {
    /// No session is polling
    #[default]
    Idle,
    /// A session is polling on its interval
    Polling,
    /// The target reported success
    Completed,
    /// The target reported failure, or the client gave up
    Failed,
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Polling)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Failed)
    }
}

/// Consumer-visible state of a binding.
#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    /// Bumped on every teardown; sessions only write while it matches theirs
    pub generation: u64,
    /// Target currently associated with the binding
    pub target: Option<PollTarget>,
    pub phase: SessionPhase,
    /// Latest successfully fetched status
    pub status: Option<Status>,
    /// A status request is in flight
    pub loading: bool,
    pub consecutive_failures: u32,
}

impl PollSnapshot {
    pub fn is_polling(&self) -> bool {
        self.phase.is_active()
    }
}

/// How a session schedules requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Fetch immediately, then on every interval tick
    Continuous,
    /// Fetch once and exit
    Once,
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Refresh,
}

/// Generation of the session currently allowed to report to the observer.
#[derive(Debug, Clone, Default)]
pub(crate) struct DispatchGate(Arc<Mutex<u64>>);

impl DispatchGate {
    /// Retire the current generation, running `retire` with the new one
    /// before the gate is released. Blocks while a callback is running.
    pub fn advance(&self, retire: impl FnOnce(u64)) {
        let mut current = self.lock();
        *current += 1;
        retire(*current);
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared pieces every session of a binding uses.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub fetcher: Arc<dyn StatusFetcher>,
    pub observer: Arc<dyn PollObserver>,
    pub snapshot: Arc<watch::Sender<PollSnapshot>>,
    pub gate: DispatchGate,
    pub interval: Duration,
}

/// Owner's handle to a running session.
pub(crate) struct SessionHandle {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn spawn(
        ctx: SessionContext,
        target: PollTarget,
        generation: u64,
        mode: SessionMode,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (commands, command_rx) = mpsc::unbounded_channel();

        let session = Session {
            logger: SessionLogger::new(&target, generation),
            target,
            generation,
            mode,
            ctx,
            cancel: cancel.clone(),
            commands: command_rx,
            tracker: FailureTracker::default(),
            attempts: 0,
        };
        let task = tokio::spawn(session.run());

        Self {
            cancel,
            commands,
            task,
        }
    }

    /// True while the session task has not exited.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Ask the session for an out-of-band fetch.
    pub fn refresh(&self) -> bool {
        self.is_running() && self.commands.send(SessionCommand::Refresh).is_ok()
    }

    /// Cancel the session and its in-flight request. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why the session loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Completed,
    Failed,
    ThresholdExceeded,
    /// One-shot fetch finished without a terminal state
    Settled,
    /// Torn down by the owner
    Cancelled,
}

impl SessionEnd {
    fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::Completed => "completed",
            SessionEnd::Failed => "failed",
            SessionEnd::ThresholdExceeded => "threshold_exceeded",
            SessionEnd::Settled => "settled",
            SessionEnd::Cancelled => "cancelled",
        }
    }
}

enum Flow {
    Continue,
    Stop(SessionEnd),
}

struct InFlight {
    cancel: CancellationToken,
    future: BoxFuture<'static, PollResult<Status>>,
}

struct Session {
    target: PollTarget,
    generation: u64,
    mode: SessionMode,
    ctx: SessionContext,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    tracker: FailureTracker,
    logger: SessionLogger,
    attempts: u64,
}

impl Session {
    async fn run(self) {
        let span = self.logger.create_span();
        self.poll_loop().instrument(span).await
    }

    async fn poll_loop(mut self) {
        let continuous = self.mode == SessionMode::Continuous;
        self.logger.log_start(if continuous {
            "polling"
        } else {
            "single refresh"
        });

        let mut ticker = time::interval(self.ctx.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: Option<InFlight> = None;
        if !continuous {
            self.launch(&mut in_flight);
        }

        let end = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break SessionEnd::Cancelled,

                result = next_outcome(&mut in_flight) => {
                    in_flight = None;
                    self.publish(|s| s.loading = false);

                    match self.handle(result) {
                        Flow::Stop(end) => break end,
                        Flow::Continue if !continuous => break SessionEnd::Settled,
                        Flow::Continue => {}
                    }
                }

                _ = ticker.tick(), if continuous => self.launch(&mut in_flight),

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Refresh) => self.launch(&mut in_flight),
                    None => break SessionEnd::Cancelled,
                },
            }
        };

        if let Some(outstanding) = in_flight.take() {
            outstanding.cancel.cancel();
        }

        self.finish(end);
    }

    /// Start a request, superseding any outstanding one.
    fn launch(&mut self, slot: &mut Option<InFlight>) {
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
            record_superseded(self.target.kind.as_str());
            debug!(target_id = %self.target.id, "Superseding in-flight status request");
        }

        self.attempts += 1;

        let cancel = self.cancel.child_token();
        let fetcher = Arc::clone(&self.ctx.fetcher);
        let target = self.target.clone();
        let request_cancel = cancel.clone();
        let future = async move { fetcher.fetch(&target, request_cancel).await }.boxed();

        *slot = Some(InFlight { cancel, future });
        self.publish(|s| s.loading = true);
    }

    fn handle(&mut self, result: PollResult<Status>) -> Flow {
        match result {
            Ok(status) => self.handle_status(status),
            Err(e) if e.is_silent() => {
                debug!(target_id = %self.target.id, "Status request cancelled");
                Flow::Continue
            }
            Err(e) if e.is_precondition() => {
                self.logger.log_error(&e.to_string());
                self.publish(|s| s.phase = SessionPhase::Failed);
                self.report_error(&e, Severity::Fatal);
                Flow::Stop(SessionEnd::Failed)
            }
            Err(e) => self.handle_failure(e),
        }
    }

    fn handle_status(&mut self, status: Status) -> Flow {
        self.tracker.record_success();
        self.logger.log_status(self.attempts, &status);

        let phase = match status.state {
            GenerationState::Succeeded => Some(SessionPhase::Completed),
            GenerationState::Failed => Some(SessionPhase::Failed),
            GenerationState::InProgress => None,
        };

        let published = status.clone();
        self.publish(move |s| {
            s.status = Some(published);
            s.consecutive_failures = 0;
            if let Some(phase) = phase {
                s.phase = phase;
            }
        });

        if !self.dispatch(|observer| observer.on_status(&status)) {
            return Flow::Stop(SessionEnd::Cancelled);
        }

        match status.state {
            GenerationState::Succeeded => {
                self.logger.log_completion(&status.raw_state);
                self.dispatch(|observer| observer.on_success(&status));
                Flow::Stop(SessionEnd::Completed)
            }
            GenerationState::Failed => {
                let error = PollError::GenerationFailed(status.failure_message());
                self.logger.log_error(&error.to_string());
                self.report_error(&error, Severity::Fatal);
                Flow::Stop(SessionEnd::Failed)
            }
            GenerationState::InProgress => Flow::Continue,
        }
    }

    fn handle_failure(&mut self, error: PollError) -> Flow {
        let failures = self.tracker.record_failure();
        let exhausted = self.tracker.is_exhausted();

        self.publish(|s| {
            s.consecutive_failures = failures;
            if exhausted {
                s.phase = SessionPhase::Failed;
            }
        });

        if exhausted {
            let fatal = PollError::threshold_exceeded(failures, &error);
            self.logger.log_error(&fatal.to_string());
            self.report_error(&fatal, Severity::Fatal);
            return Flow::Stop(SessionEnd::ThresholdExceeded);
        }

        self.logger.log_warning(self.attempts, failures, &error.to_string());
        self.report_error(&error, Severity::Warning);
        Flow::Continue
    }

    fn report_error(&self, error: &PollError, severity: Severity) {
        self.dispatch(|observer| observer.on_error(error, severity));
    }

    /// Run a callback unless the owner has torn this session down.
    ///
    /// The gate stays locked for the duration of the callback, so a
    /// concurrent teardown waits for it and every later dispatch is skipped.
    fn dispatch(&self, callback: impl FnOnce(&dyn PollObserver)) -> bool {
        let current = self.ctx.gate.lock();
        if *current != self.generation || self.cancel.is_cancelled() {
            return false;
        }
        callback(self.ctx.observer.as_ref());
        true
    }

    /// Apply an update to the snapshot if this session still owns it.
    fn publish(&self, update: impl FnOnce(&mut PollSnapshot)) -> bool {
        let generation = self.generation;
        self.ctx.snapshot.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                return false;
            }
            update(snapshot);
            true
        })
    }

    fn finish(self, end: SessionEnd) {
        self.logger.log_stopped(end.as_str());
        record_session_end(self.target.kind.as_str(), end.as_str());
    }
}

/// Resolve the in-flight request, or wait forever when there is none.
async fn next_outcome(slot: &mut Option<InFlight>) -> PollResult<Status> {
    match slot {
        Some(in_flight) => (&mut in_flight.future).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_predicates() {
        assert!(SessionPhase::Polling.is_active());
        assert!(!SessionPhase::Idle.is_active());
        assert!(SessionPhase::Completed.is_terminal());
        assert!(SessionPhase::Failed.is_terminal());
        assert!(!SessionPhase::Polling.is_terminal());
    }

    #[test]
    fn test_default_snapshot_is_idle() {
        let snapshot = PollSnapshot::default();
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert!(!snapshot.is_polling());
        assert!(snapshot.status.is_none());
        assert_eq!(snapshot.consecutive_failures, 0);
    }
}
