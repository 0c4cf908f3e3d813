//! Bounded retry with exponential backoff for fleet reads.
//!
//! Only transient fleet errors are retried. A capacity gate that is not
//! yet satisfied is a successful read and never reaches this module.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use ha_release_fleet::FleetResult;

use crate::error::{RolloutError, RolloutResult};

/// How often, and how patiently, to retry a fleet call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Sleep after the first failed attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Backoff multiplier applied after each further failure.
    pub multiplier: u32,
    /// Upper bound on any single sleep, in milliseconds.
    pub clamp_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            multiplier: 2,
            clamp_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Sleep to take after `failures` consecutive failed attempts (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let mut ms = self.initial_backoff_ms;
        for _ in 1..failures {
            ms = ms.saturating_mul(u64::from(self.multiplier));
            if ms >= self.clamp_backoff_ms {
                break;
            }
        }
        Duration::from_millis(ms.min(self.clamp_backoff_ms))
    }

    /// Run `f` until it succeeds, fails permanently, or the attempt budget
    /// is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut f: F) -> RolloutResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FleetResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(source) if !source.is_transient() => {
                    return Err(RolloutError::Fleet { operation, source });
                }
                Err(source) if attempt >= max_attempts => {
                    return Err(RolloutError::RetriesExhausted {
                        operation,
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient fleet error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
