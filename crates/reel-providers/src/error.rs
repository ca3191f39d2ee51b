//! Provider error types and retryability classification.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error from an external service adapter.
///
/// Classification drives the orchestrator's retry policy: network failures,
/// 5xx, 429, and deadlines without a response are retryable; semantic 4xx,
/// malformed responses, and missing credentials are permanent.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Rate limited")]
    RateLimited {
        /// Retry-After hint in milliseconds, when the service sent one
        retry_after_ms: Option<u64>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No credentials for {0}")]
    MissingCredentials(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ProviderError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn missing_credentials(capability: impl Into<String>) -> Self {
        Self::MissingCredentials(capability.into())
    }

    /// Classify an HTTP status into the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 429 {
            Self::RateLimited {
                retry_after_ms: None,
            }
        } else {
            Self::Http {
                status,
                message: message.into(),
            }
        }
    }

    /// Whether the orchestrator may retry this error with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status >= 500,
            ProviderError::Network(_) => true,
            ProviderError::Timeout(_) => true,
            ProviderError::RateLimited { .. } => true,
            ProviderError::InvalidResponse(_) => false,
            ProviderError::MissingCredentials(_) => false,
            ProviderError::Unsupported(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::http(503, "unavailable").is_retryable());
        assert!(ProviderError::http(500, "boom").is_retryable());
        assert!(ProviderError::network("reset").is_retryable());
        assert!(ProviderError::timeout("60s elapsed").is_retryable());
        assert!(ProviderError::from_status(429, "slow down").is_retryable());

        assert!(!ProviderError::http(400, "bad request").is_retryable());
        assert!(!ProviderError::http(403, "forbidden").is_retryable());
        assert!(!ProviderError::invalid_response("not json").is_retryable());
        assert!(!ProviderError::missing_credentials("image").is_retryable());
    }

    #[test]
    fn test_429_maps_to_rate_limited() {
        match ProviderError::from_status(429, "ignored") {
            ProviderError::RateLimited { .. } => {}
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }
}
