//! API middleware.
//!
//! Throttling is keyed by the owner id when the request carries one, and
//! by client IP only for unauthenticated traffic. Owner isolation is the
//! boundary the rest of the pipeline enforces, so it is also the fairness
//! boundary here: one noisy owner cannot starve another sitting behind the
//! same proxy address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// Per-client rate limiter.
pub type ClientRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Cap on distinct throttle keys kept in memory.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// How long an idle client's limiter is kept before eviction.
const LIMITER_TTL: Duration = Duration::from_secs(3600);

/// Request id attached to every request's extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Rate limiters keyed per client (owner id or IP).
#[derive(Clone)]
pub struct RateLimiterCache {
    limiters: Arc<RwLock<HashMap<String, (Arc<ClientRateLimiter>, Instant)>>>,
    quota: Quota,
}

impl RateLimiterCache {
    pub fn new(requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(10).unwrap()),
        );
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            quota,
        }
    }

    /// Drop limiters idle past the TTL; if the map is still over capacity,
    /// drop the oldest entries.
    async fn evict_stale(&self) {
        let mut limiters = self.limiters.write().await;
        let now = Instant::now();
        limiters.retain(|_, (_, created_at)| now.duration_since(*created_at) < LIMITER_TTL);

        if limiters.len() > MAX_TRACKED_CLIENTS {
            let mut by_age: Vec<_> = limiters
                .iter()
                .map(|(key, (_, created_at))| (key.clone(), *created_at))
                .collect();
            by_age.sort_by_key(|(_, created_at)| *created_at);

            let excess = limiters.len() - MAX_TRACKED_CLIENTS;
            for (key, _) in by_age.into_iter().take(excess) {
                limiters.remove(&key);
            }
            warn!("Rate limiter cache over capacity, evicted {} clients", excess);
        }
    }

    /// Whether the client identified by `key` may proceed.
    pub async fn check(&self, key: &str) -> bool {
        {
            let limiters = self.limiters.read().await;
            if let Some((limiter, _)) = limiters.get(key) {
                return limiter.check().is_ok();
            }
        }

        let mut limiters = self.limiters.write().await;
        if limiters.len() >= MAX_TRACKED_CLIENTS && !limiters.contains_key(key) {
            drop(limiters);
            self.evict_stale().await;
            limiters = self.limiters.write().await;
        }

        let (limiter, _) = limiters
            .entry(key.to_string())
            .or_insert_with(|| (Arc::new(RateLimiter::direct(self.quota)), Instant::now()));
        limiter.check().is_ok()
    }
}

/// The key a request is throttled under: `owner:<id>` when an owner header
/// is present, `ip:<addr>` otherwise.
fn throttle_key(request: &Request<Body>) -> Option<String> {
    let owner = request
        .headers()
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(owner) = owner {
        return Some(format!("owner:{}", owner));
    }
    client_ip(request).map(|ip| format!("ip:{}", ip))
}

/// Client IP: proxy headers first, then the socket address.
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str| -> Option<IpAddr> {
        request
            .headers()
            .get(name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
}

/// Rate limiting middleware. Rejections go through the common envelope.
pub async fn rate_limit_middleware(
    State(limiters): State<Arc<RateLimiterCache>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(key) = throttle_key(&request) {
        if !limiters.check(&key).await {
            warn!(client = %key, "Rate limit exceeded");
            return ApiError::RateLimited.into_response();
        }
    }

    next.run(request).await
}

/// Create the CORS layer. The only non-standard header the UI sends is the
/// owner id.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::{header, Method};

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any)
            .max_age(Duration::from_secs(600));
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-owner-id"),
        ])
        .allow_credentials(true)
        .allow_origin(origins)
        .max_age(Duration::from_secs(600))
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Request ID middleware: honor a well-formed inbound `X-Request-ID`,
/// mint one otherwise, and echo it on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_valid_request_id(v))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Request logging middleware, tagged with the requesting owner.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let owner_id = request
        .headers()
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    // Health probes are noise.
    if path != "/health" && path != "/ready" {
        info!(
            method = %method,
            path = %path,
            owner_id = %owner_id,
            status = %response.status(),
            duration_ms = %start.elapsed().as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/projects");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_throttle_key_prefers_owner_over_ip() {
        let request = request_with(&[
            ("x-owner-id", "user-1"),
            ("x-forwarded-for", "203.0.113.9"),
        ]);
        assert_eq!(throttle_key(&request).as_deref(), Some("owner:user-1"));

        let request = request_with(&[("x-forwarded-for", "203.0.113.9")]);
        assert_eq!(throttle_key(&request).as_deref(), Some("ip:203.0.113.9"));

        let request = request_with(&[]);
        assert_eq!(throttle_key(&request), None);
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let request = request_with(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(
            client_ip(&request),
            Some("203.0.113.9".parse::<IpAddr>().unwrap())
        );

        let request = request_with(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(
            client_ip(&request),
            Some("198.51.100.4".parse::<IpAddr>().unwrap())
        );
    }

    #[test]
    fn test_request_id_validation() {
        assert!(is_valid_request_id("abc-123"));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("has space"));
        assert!(!is_valid_request_id(&"a".repeat(65)));
    }

    #[tokio::test]
    async fn test_rate_limiter_throttles_per_client() {
        let cache = RateLimiterCache::new(1);

        // The burst capacity is one request per key.
        assert!(cache.check("owner:user-1").await);
        assert!(!cache.check("owner:user-1").await);

        // Another client is unaffected.
        assert!(cache.check("owner:user-2").await);
    }
}
