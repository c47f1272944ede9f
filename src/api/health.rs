//! Health check endpoint.

use axum::{Json, response::IntoResponse};

/// Liveness probe. No auth, no database access.
pub async fn healthcheck() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
