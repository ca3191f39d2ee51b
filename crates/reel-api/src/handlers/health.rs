//! Health endpoints.

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// GET /ready
pub async fn ready() -> Json<Value> {
    Json(json!({"status": "ready"}))
}
