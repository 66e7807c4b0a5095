//! Test fixtures: a scripted status fetcher and a recording observer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adgen_models::{PollTarget, Status, StatusPayload};
use adgen_poller::{CancellationToken, PollError, PollObserver, PollResult, Severity, StatusFetcher};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const INTERVAL: Duration = Duration::from_millis(2000);

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum Step {
    /// Respond immediately with a status
    Status(StatusPayload),
    /// Respond with a status after a delay, unless cancelled first
    Delayed(Duration, StatusPayload),
    /// Fail with an HTTP error
    Fail(u16),
    /// Fail with a client-side timeout
    Timeout,
    /// Report cancellation immediately
    Cancelled,
    /// Report a configuration problem
    Misconfigured,
    /// Never respond; only cancellation ends it
    Hang,
}

impl Step {
    pub fn status(state: &str, percent: f64) -> Self {
        Step::Status(StatusPayload::new(state).with_progress(percent))
    }

    pub fn failed(reason: Option<&str>) -> Self {
        let payload = StatusPayload::new("failed");
        Step::Status(match reason {
            Some(reason) => payload.with_failure_reason(reason),
            None => payload,
        })
    }
}

struct OutstandingGuard(Arc<AtomicUsize>);

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fetcher that plays back a fixed script, then repeats a fallback step.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    outstanding: Arc<AtomicUsize>,
    max_outstanding: AtomicUsize,
    requested: Mutex<Vec<PollTarget>>,
}

impl ScriptedFetcher {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Self::with_fallback(script, Step::Hang)
    }

    pub fn repeating(step: Step) -> Arc<Self> {
        Self::with_fallback([], step)
    }

    pub fn with_fallback(script: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            outstanding: Arc::new(AtomicUsize::new(0)),
            max_outstanding: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    /// Number of fetches started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches started and neither finished nor dropped.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<PollTarget> {
        self.requested.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch(&self, target: &PollTarget, cancel: CancellationToken) -> PollResult<Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(target.clone());

        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        let _guard = OutstandingGuard(Arc::clone(&self.outstanding));

        match self.next_step() {
            Step::Status(payload) => Ok(Status::from(payload)),
            Step::Delayed(delay, payload) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(PollError::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(Status::from(payload)),
                }
            }
            Step::Fail(code) => Err(PollError::request_failed(code, "scripted failure")),
            Step::Timeout => Err(PollError::Timeout(Duration::from_secs(10))),
            Step::Cancelled => Err(PollError::Cancelled),
            Step::Misconfigured => Err(PollError::config("scripted misconfiguration")),
            Step::Hang => {
                cancel.cancelled().await;
                Err(PollError::Cancelled)
            }
        }
    }
}

/// What the observer saw.
#[derive(Debug, Clone)]
pub enum Event {
    Status(Status),
    Success(Status),
    Error {
        kind: &'static str,
        message: String,
        severity: Severity,
    },
}

impl Event {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::Error { severity: Severity::Fatal, .. })
    }
}

/// Observer that forwards every callback, timestamped, into a channel.
pub struct RecordingObserver {
    tx: mpsc::UnboundedSender<(Instant, Event)>,
}

impl RecordingObserver {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<(Instant, Event)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn emit(&self, event: Event) {
        let _ = self.tx.send((Instant::now(), event));
    }
}

impl PollObserver for RecordingObserver {
    fn on_status(&self, status: &Status) {
        self.emit(Event::Status(status.clone()));
    }

    fn on_success(&self, status: &Status) {
        self.emit(Event::Success(status.clone()));
    }

    fn on_error(&self, error: &PollError, severity: Severity) {
        self.emit(Event::Error {
            kind: error.kind(),
            message: error.to_string(),
            severity,
        });
    }
}

/// Receive events until one matches, returning it with its timestamp.
pub async fn wait_for_event<F>(
    events: &mut mpsc::UnboundedReceiver<(Instant, Event)>,
    mut matches: F,
) -> (Instant, Event)
where
    F: FnMut(&Event) -> bool,
{
    loop {
        let (at, event) = events.recv().await.expect("observer channel closed");
        if matches(&event) {
            return (at, event);
        }
    }
}

/// Drain whatever is already queued.
pub fn drain(events: &mut mpsc::UnboundedReceiver<(Instant, Event)>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok((_, event)) = events.try_recv() {
        drained.push(event);
    }
    drained
}
