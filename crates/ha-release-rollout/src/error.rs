//! Rollout error types.

use ha_release_fleet::FleetError;
use thiserror::Error;

/// Errors that end a release run.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        source: FleetError,
    },

    #[error("{operation} failed: {source}")]
    Fleet {
        operation: &'static str,
        source: FleetError,
    },
}

impl RolloutError {
    /// The underlying fleet error.
    pub fn fleet_error(&self) -> &FleetError {
        match self {
            RolloutError::RetriesExhausted { source, .. } => source,
            RolloutError::Fleet { source, .. } => source,
        }
    }
}

pub type RolloutResult<T> = Result<T, RolloutError>;
