//! # routes::transactions
//!
//! **Transaction History** — the append-only record of every buy/sell pair.
//!
//! | Method | Path                | Description                                |
//! |--------|---------------------|--------------------------------------------|
//! | GET    | `/api/transactions` | Filterable, newest-first transaction list  |
//!
//! Query parameters: `service_id`, `state` (`OPEN`/`CLOSED`), `limit`
//! (default 50, capped at 500).

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::db;
use crate::error::AppError;
use crate::models::TransactionState;
use crate::state::SharedState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub service_id: Option<i64>,
    pub state: Option<TransactionState>,
    pub limit: Option<i64>,
}

/// GET /api/transactions — recent transactions, optionally filtered.
pub async fn list_transactions(
    State(state): State<SharedState>,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit <= 0 {
        return Err(AppError::BadRequest(format!(
            "limit must be positive, got {limit}"
        )));
    }
    let limit = limit.min(MAX_LIMIT);

    let transactions =
        db::list_transactions(&state.pool, query.service_id, query.state, limit).await?;

    Ok(Json(json!({
        "ok":           true,
        "count":        transactions.len(),
        "transactions": transactions,
    })))
}
