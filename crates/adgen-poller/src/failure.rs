//! Consecutive failure tracking.

use adgen_models::FAILURE_THRESHOLD;
use tracing::debug;

/// Counts consecutive failed status requests for one session.
///
/// Any success resets the count. Cancelled requests are never recorded.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive_failures: u32,
    threshold: u32,
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(FAILURE_THRESHOLD)
    }
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Record a successful request (resets failure count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(
                "Status polling recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    /// Record a failed request and return the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// True once the count has reached the threshold.
    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausts_at_threshold() {
        let mut tracker = FailureTracker::default();

        for expected in 1..FAILURE_THRESHOLD {
            assert_eq!(tracker.record_failure(), expected);
            assert!(!tracker.is_exhausted());
        }

        tracker.record_failure();
        assert!(tracker.is_exhausted());
    }

    #[test]
    fn test_success_resets() {
        let mut tracker = FailureTracker::new(3);
        tracker.record_failure();
        tracker.record_failure();

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);

        assert_eq!(tracker.record_failure(), 1);
        assert!(!tracker.is_exhausted());
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let tracker = FailureTracker::new(0);
        assert_eq!(tracker.threshold(), 1);
    }
}
