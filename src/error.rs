//! # error
//!
//! Centralised application error type.
//!
//! Every handler returns `Result<_, AppError>`.  Axum's `IntoResponse` impl
//! converts these into structured JSON error bodies so API clients always get
//! a machine-readable response even on failure.
//!
//! Inside a cycle worker nothing here is fatal: an `Execution` error aborts
//! the tick with the ledger untouched (the next poll retries naturally) and a
//! `Storage` error rolls the tick back and keeps the loop alive.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Symbol outside the supported mock-market set. Never retried.
    #[error("Unsupported stock symbol: {0}")]
    InvalidSymbol(String),

    /// Mock trade could not be filled (insufficient funds / bad quantity).
    #[error("Execution error: {0}")]
    Execution(String),

    /// Operation against the wrong lifecycle state, e.g. stopping an
    /// already-inactive service.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Database commit/query failure — rolled back by dropping the sqlx
    /// transaction.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidSymbol(sym) => (
                StatusCode::BAD_REQUEST,
                format!("Unsupported stock symbol: {sym}"),
            ),
            AppError::Execution(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Storage error: {err}"),
            ),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
