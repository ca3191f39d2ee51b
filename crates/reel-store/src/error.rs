//! Store error types.

use thiserror::Error;

use reel_models::JobPhase;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Lease expired or stolen: {0}")]
    LeaseExpired(String),

    #[error("Phase regression: {from} -> {to}")]
    PhaseRegression { from: JobPhase, to: JobPhase },

    #[error("Progress regression: {from} -> {to}")]
    ProgressRegression { from: u8, to: u8 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn lease_expired(msg: impl Into<String>) -> Self {
        Self::LeaseExpired(msg.into())
    }
}
