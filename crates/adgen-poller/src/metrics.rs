//! Poller metrics.
//!
//! Counters and latency histograms for status requests and session outcomes.
//! Nothing is recorded unless the host process installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Status requests by target kind and outcome.
    pub const FETCHES_TOTAL: &str = "adgen_status_fetches_total";

    /// Status request latency in seconds by target kind.
    pub const FETCH_LATENCY_SECONDS: &str = "adgen_status_fetch_latency_seconds";

    /// In-flight requests aborted because a newer one replaced them.
    pub const FETCHES_SUPERSEDED_TOTAL: &str = "adgen_status_fetches_superseded_total";

    /// Finished poll sessions by outcome.
    pub const SESSIONS_TOTAL: &str = "adgen_poll_sessions_total";
}

/// Record a finished status request.
pub fn record_fetch(kind: &str, outcome: &str, latency: Duration) {
    counter!(
        names::FETCHES_TOTAL,
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::FETCH_LATENCY_SECONDS,
        "kind" => kind.to_string()
    )
    .record(latency.as_secs_f64());
}

/// Record a request that was aborted in favor of a newer one.
pub fn record_superseded(kind: &str) {
    counter!(
        names::FETCHES_SUPERSEDED_TOTAL,
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record the end of a poll session.
pub fn record_session_end(kind: &str, outcome: &str) {
    counter!(
        names::SESSIONS_TOTAL,
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
