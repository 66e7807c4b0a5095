//! Generation status poller.
//!
//! This crate provides:
//! - An HTTP status fetcher with cancellation and a fixed request timeout
//! - Poll sessions that keep at most one request in flight and stop on
//!   terminal states or after repeated failures
//! - A lifecycle binding that creates and tears down sessions as the watched
//!   target changes
//! - Observer callbacks, structured logging and metrics

pub mod binding;
pub mod config;
pub mod error;
pub mod failure;
pub mod fetcher;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod session;

pub use binding::PollBinding;
pub use config::{PollerConfig, StatusEndpoint};
pub use error::{PollError, PollResult};
pub use failure::FailureTracker;
pub use fetcher::{HttpStatusFetcher, StatusFetcher};
pub use logging::SessionLogger;
pub use observer::{CallbackObserver, PollObserver, Severity};
pub use session::{PollSnapshot, SessionMode, SessionPhase};

pub use tokio_util::sync::CancellationToken;
