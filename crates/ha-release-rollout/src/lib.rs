//! ha-release rollout — zero-downtime instance replacement for a fleet group.
//!
//! Marks every member of a load-balanced autoscaling group for termination,
//! then retires them one at a time, each only once the group's in-service
//! count has reached its desired capacity again.
//!
//! # Components
//!
//! - **`controller`** — The replacement state machine (mark, recover, drain)
//! - **`oracle`** — Desired/current capacity reads with retry
//! - **`retry`** — Bounded exponential-backoff retry policy
//! - **`pacer`** — Fixed-interval waits that honour a shutdown signal
//! - **`config`** — Poll/settle intervals and retry budget

pub mod config;
pub mod controller;
pub mod error;
pub mod oracle;
pub mod pacer;
pub mod retry;

pub use config::ReleaseConfig;
pub use controller::{ReleaseController, ReleaseOutcome, ReleaseReport};
pub use error::{RolloutError, RolloutResult};
pub use oracle::{CapacityOracle, CapacitySnapshot, LoadBalancerHealth};
pub use pacer::{Pacer, Wait};
pub use retry::RetryPolicy;
