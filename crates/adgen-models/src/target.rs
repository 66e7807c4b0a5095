//! Poll targets.
//!
//! A target is the thing whose generation progress is polled. Job, campaign
//! and project ids live in separate namespaces on the backend, so the kind is
//! always explicit and never inferred from the id.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strings produced upstream when a missing id gets stringified.
const SENTINEL_IDS: &[&str] = &["undefined", "null"];

/// Result type for target validation.
pub type TargetResult<T> = Result<T, TargetError>;

/// Reasons a target id is rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("Target id is missing")]
    Missing,

    #[error("Target id is a stringified placeholder: {0:?}")]
    Sentinel(String),

    #[error("Unknown target kind: {0}")]
    UnknownKind(String),
}

/// Kind of resource being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A single generation job
    Job,
    /// A campaign (aggregate over its creatives)
    Campaign,
    /// A project
    Project,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Job => "job",
            TargetKind::Campaign => "campaign",
            TargetKind::Project => "project",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" => Ok(TargetKind::Job),
            "campaign" => Ok(TargetKind::Campaign),
            "project" => Ok(TargetKind::Project),
            other => Err(TargetError::UnknownKind(other.to_string())),
        }
    }
}

/// Check a raw id before it is used to build a request.
pub fn validate_target_id(id: &str) -> TargetResult<()> {
    let trimmed = id.trim();

    if trimmed.is_empty() {
        return Err(TargetError::Missing);
    }

    if SENTINEL_IDS.contains(&trimmed) {
        return Err(TargetError::Sentinel(trimmed.to_string()));
    }

    Ok(())
}

/// What a poll session watches.
///
/// Construction does not validate; ids come from upstream code that may be
/// buggy, and the session start and the fetcher both check them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollTarget {
    pub kind: TargetKind,
    pub id: String,
}

impl PollTarget {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn job(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Job, id)
    }

    pub fn campaign(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Campaign, id)
    }

    pub fn project(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Project, id)
    }

    pub fn validate(&self) -> TargetResult<()> {
        validate_target_id(&self.id)
    }
}

impl fmt::Display for PollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_and_sentinels() {
        assert_eq!(validate_target_id(""), Err(TargetError::Missing));
        assert_eq!(validate_target_id("   "), Err(TargetError::Missing));
        assert_eq!(
            validate_target_id("undefined"),
            Err(TargetError::Sentinel("undefined".into()))
        );
        assert_eq!(validate_target_id("null"), Err(TargetError::Sentinel("null".into())));
    }

    #[test]
    fn test_accepts_real_ids() {
        assert!(validate_target_id("job-42").is_ok());
        assert!(validate_target_id("nullable-campaign").is_ok());
        assert!(PollTarget::campaign("c_123").validate().is_ok());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Campaign".parse::<TargetKind>(), Ok(TargetKind::Campaign));
        assert_eq!("job".parse::<TargetKind>(), Ok(TargetKind::Job));
        assert!(matches!(
            "creative".parse::<TargetKind>(),
            Err(TargetError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(PollTarget::job("job-42").to_string(), "job:job-42");
    }
}
