//! Shared data models for the generation status poller.
//!
//! This crate provides Serde-serializable types for:
//! - Status endpoint payloads and their normalized form
//! - Poll targets and id validation
//! - Polling constants shared by clients

pub mod status;
pub mod target;

use std::time::Duration;

pub use status::{GenerationState, Status, StatusPayload, DEFAULT_FAILURE_REASON};
pub use target::{validate_target_id, PollTarget, TargetError, TargetKind, TargetResult};

/// Default delay between status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Consecutive transient failures that end a session.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Client-side timeout for a single status request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
