//! Release pacing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Intervals and retry budget for a release run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Seconds between capacity-gate polls while waiting for replacements.
    pub poll_interval_secs: u64,
    /// Seconds to let the group settle after each termination.
    pub settle_interval_secs: u64,
    /// Retry policy for fleet reads and tagging.
    pub retry: RetryPolicy,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            settle_interval_secs: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl ReleaseConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_secs(self.settle_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_poll_every_ten_seconds() {
        let cfg = ReleaseConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(10));
        assert_eq!(cfg.settle_interval(), Duration::from_secs(10));
        assert_eq!(cfg.retry.max_attempts, 5);
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg: ReleaseConfig =
            serde_json::from_str(r#"{"poll_interval_secs": 30, "retry": {"max_attempts": 2}}"#)
                .unwrap();
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.settle_interval_secs, 10);
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.retry.initial_backoff_ms, 500);
    }
}
