//! # auth — API Key Middleware
//!
//! Guards every endpoint with an `X-API-Key` header.
//!
//! ## Mode
//! - `API_KEY` unset (or empty) → **Allow All** (dev mode)
//! - `API_KEY` set → every request must send `X-API-Key: <key>`
//!
//! ## Exemptions
//! `/health` stays open so load balancers can probe without a key.
//!
//! ## Usage
//! ```bash
//! API_KEY=super-secret-key-here cargo run
//! ```
//! ```bash
//! curl -H "X-API-Key: super-secret-key-here" http://localhost:3000/api/services
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

/// Axum middleware — checks the X-API-Key header.
///
/// If the `API_KEY` env var is empty or unset → pass everything through.
pub async fn require_api_key(request: Request<Body>, next: Next) -> Response {
    let api_key_env = std::env::var("API_KEY").unwrap_or_default();

    // ── Dev mode: no API_KEY configured ───────────────────────────────────────
    if api_key_env.is_empty() {
        return next.run(request).await;
    }

    // ── Health check exemption ────────────────────────────────────────────────
    let path = request.uri().path();
    if path == "/health" {
        return next.run(request).await;
    }

    // ── Header check ──────────────────────────────────────────────────────────
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == api_key_env {
        next.run(request).await
    } else {
        warn!(path, "❌ Unauthorized request — invalid or missing X-API-Key");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "ok":    false,
                "error": "Unauthorized: invalid or missing X-API-Key header",
                "hint":  "Set X-API-Key header with your API key"
            })),
        )
            .into_response()
    }
}
