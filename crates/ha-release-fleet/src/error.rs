//! Error types for fleet client operations.

use thiserror::Error;

/// Result type alias for fleet client operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors a fleet backend can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl FleetError {
    /// Whether retrying the same call may succeed.
    ///
    /// Only generic provider failures (throttling, network, eventual
    /// consistency) qualify. A missing group or rejected credentials will
    /// not fix themselves between attempts.
    pub fn is_transient(&self) -> bool {
        matches!(self, FleetError::Provider(_))
    }
}
