//! Orchestrator error types.

use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Failures internal to a resume pass.
///
/// Provider errors are handled inside the phase drivers (retry, shot
/// failure, job failure) and never reach this type; what remains is store
/// trouble and bugs, which fail the job with a redacted message.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Store error: {0}")]
    Store(#[from] reel_store::StoreError),

    #[error("Job not found: {0}")]
    JobNotFound(String),
}
