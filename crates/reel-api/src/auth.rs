//! Owner identity extraction.
//!
//! Authentication itself lives outside this service; upstream middleware is
//! expected to resolve the user and forward the opaque owner id in the
//! `X-Owner-Id` header. Requests without one are rejected.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// The authenticated owner of the request.
#[derive(Debug, Clone)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_owner_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner_id = parts
            .headers
            .get("x-owner-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| is_valid_owner_id(v))
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid X-Owner-Id header"))?;

        Ok(Owner(owner_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_validation() {
        assert!(is_valid_owner_id("user-123"));
        assert!(is_valid_owner_id("a_b_c"));
        assert!(!is_valid_owner_id(""));
        assert!(!is_valid_owner_id("has space"));
        assert!(!is_valid_owner_id("has/slash"));
        assert!(!is_valid_owner_id(&"a".repeat(129)));
    }
}
