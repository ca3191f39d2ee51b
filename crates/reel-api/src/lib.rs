//! HTTP surface for the ReelForge pipeline.
//!
//! JSON over HTTP with a `{success, data, error}` envelope on mutating
//! responses. Authentication is out of scope; the owner identity arrives
//! via the `X-Owner-Id` header and every lookup is owner-namespaced.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
