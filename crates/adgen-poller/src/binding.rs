//! Lifecycle binding.
//!
//! A [`PollBinding`] ties poll sessions to the lifetime of a consumer. The
//! consumer reports which target it currently watches and whether polling is
//! enabled; the binding creates, replaces and tears down sessions to match.
//! Dropping the binding tears down the current session.
//!
//! Sessions run as tokio tasks, so a binding must be driven from inside a
//! tokio runtime.
//!
//! A tick that fires while a request is still outstanding supersedes it. The
//! superseded request is cancelled, not failed, so it is neither counted nor
//! reported. With an interval shorter than the fetcher's request timeout, a
//! server that always answers slower than the interval is polled indefinitely
//! without a warning; pick an interval above the typical response time.

use std::sync::Arc;
use std::time::Duration;

use adgen_models::{PollTarget, Status, DEFAULT_POLL_INTERVAL};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::PollError;
use crate::fetcher::{HttpStatusFetcher, StatusFetcher};
use crate::observer::{PollObserver, Severity};
use crate::session::{
    DispatchGate, PollSnapshot, SessionContext, SessionHandle, SessionMode, SessionPhase,
};

/// Binds poll sessions to a consumer's lifetime.
pub struct PollBinding {
    fetcher: Arc<dyn StatusFetcher>,
    observer: Arc<dyn PollObserver>,
    interval: Duration,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    gate: DispatchGate,
    target: Option<PollTarget>,
    enabled: bool,
    session: Option<SessionHandle>,
}

impl PollBinding {
    /// Create an idle binding polling at [`DEFAULT_POLL_INTERVAL`].
    pub fn new(fetcher: Arc<dyn StatusFetcher>, observer: Arc<dyn PollObserver>) -> Self {
        let (snapshot, _) = watch::channel(PollSnapshot::default());

        Self {
            fetcher,
            observer,
            interval: DEFAULT_POLL_INTERVAL,
            snapshot: Arc::new(snapshot),
            gate: DispatchGate::default(),
            target: None,
            enabled: false,
            session: None,
        }
    }

    /// Create an idle binding over an HTTP fetcher, polling at the interval
    /// from the fetcher's [`PollerConfig`](crate::PollerConfig).
    pub fn http(fetcher: HttpStatusFetcher, observer: Arc<dyn PollObserver>) -> Self {
        let interval = fetcher.config().interval;
        Self::new(Arc::new(fetcher), observer).with_interval(interval)
    }

    /// Set the polling interval used by sessions started after this call.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Report the consumer's current target and whether polling is wanted.
    ///
    /// Calling this again with the same arguments is a no-op. Any change tears
    /// the current session down completely before a new one is created.
    /// `None` leaves the binding idle; an id that fails validation is reported
    /// to the observer as a fatal error and no session starts.
    pub fn watch(&mut self, target: Option<PollTarget>, enabled: bool) {
        if self.target == target && self.enabled == enabled {
            return;
        }

        let target_changed = self.target != target;
        self.teardown();

        self.target = target;
        self.enabled = enabled;

        let current = self.target.clone();
        self.snapshot.send_modify(|s| {
            if target_changed {
                s.status = None;
            }
            s.target = current;
        });

        if enabled {
            self.start_session(SessionMode::Continuous);
        }
    }

    /// Start polling the current target if no session is running.
    pub fn start(&mut self) {
        self.enabled = true;

        if self.is_session_polling() {
            return;
        }

        self.teardown();
        self.start_session(SessionMode::Continuous);
    }

    /// Stop polling and mark the binding disabled. The latest status is
    /// kept; `start()` or `watch(.., true)` resumes.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.teardown();
    }

    /// Fetch once, outside the regular schedule.
    ///
    /// With a running session the request goes through that session and
    /// supersedes any request it has in flight. Without one, a single-fetch
    /// session is started.
    pub fn refresh(&mut self) {
        if let Some(session) = &self.session {
            if session.refresh() {
                return;
            }
        }

        self.teardown();
        self.start_session(SessionMode::Once);
    }

    /// Cancel the current session and its in-flight request.
    ///
    /// Waits for an observer callback the old session is running; after
    /// this returns, that session reports nothing more. Safe to call any
    /// number of times.
    pub fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
            debug!(target = ?self.target, "Poll session torn down");
        }

        let snapshot = &self.snapshot;
        self.gate.advance(|generation| {
            snapshot.send_modify(|s| {
                s.generation = generation;
                s.phase = SessionPhase::Idle;
                s.loading = false;
            });
        });
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn status(&self) -> Option<Status> {
        self.snapshot.borrow().status.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.snapshot.borrow().is_polling()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().loading
    }

    pub fn target(&self) -> Option<&PollTarget> {
        self.target.as_ref()
    }

    /// Wait until no session is polling and no request is in flight.
    pub async fn finished(&self) -> PollSnapshot {
        let mut rx = self.snapshot.subscribe();
        let settled = rx
            .wait_for(|s| !s.phase.is_active() && !s.loading)
            .await
            .map(|s| s.clone());

        match settled {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    fn is_session_polling(&self) -> bool {
        self.session.as_ref().is_some_and(SessionHandle::is_running)
            && self.snapshot.borrow().phase.is_active()
    }

    fn start_session(&mut self, mode: SessionMode) {
        let Some(target) = self.target.clone() else {
            return;
        };

        if let Err(e) = target.validate() {
            let error = PollError::from(e);
            warn!(target = %target, "Not starting poll session: {}", error);
            self.observer.on_error(&error, Severity::Fatal);
            return;
        }

        let mut generation = 0;
        self.snapshot.send_modify(|s| {
            generation = s.generation;
            s.phase = match mode {
                SessionMode::Continuous => SessionPhase::Polling,
                SessionMode::Once => SessionPhase::Idle,
            };
            s.loading = mode == SessionMode::Once;
            s.consecutive_failures = 0;
        });

        let ctx = SessionContext {
            fetcher: Arc::clone(&self.fetcher),
            observer: Arc::clone(&self.observer),
            snapshot: Arc::clone(&self.snapshot),
            gate: self.gate.clone(),
            interval: self.interval,
        };

        self.session = Some(SessionHandle::spawn(ctx, target, generation, mode));
    }
}

impl Drop for PollBinding {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PollBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollBinding")
            .field("target", &self.target)
            .field("enabled", &self.enabled)
            .field("interval", &self.interval)
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}
