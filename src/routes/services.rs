//! # routes::services
//!
//! **Service Lifecycle** — create, start, stop and inspect trading services.
//!
//! ## Endpoints
//!
//! | Method | Path                      | Description                            |
//! |--------|---------------------------|----------------------------------------|
//! | POST   | `/api/services`           | Create a service + spawn its worker    |
//! | POST   | `/api/services/:id/stop`  | Deactivate + cancel the worker         |
//! | POST   | `/api/services/:id/start` | Reactivate + spawn a fresh worker      |
//! | GET    | `/api/services`           | All services, newest first             |
//! | GET    | `/api/services/:id`       | One service                            |
//! | GET    | `/api/symbols`            | Supported symbols                      |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::engine::cycle;
use crate::error::AppError;
use crate::events::WsEvent;
use crate::market;
use crate::models::{ServiceMode, ServiceState};
use crate::money;
use crate::config::DEFAULT_STARTING_BALANCE_CENTS;
use crate::db;
use crate::state::SharedState;

// ─── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub symbol: String,
    /// Omitted → the 1000.00 default.
    pub starting_balance: Option<BigDecimal>,
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// POST /api/services — create a service and start trading it immediately.
pub async fn create_service(
    State(state): State<SharedState>,
    Json(req): Json<CreateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = market::normalize(&req.symbol)?;

    let starting_balance = req
        .starting_balance
        .unwrap_or_else(|| money::from_cents(DEFAULT_STARTING_BALANCE_CENTS));
    if starting_balance <= BigDecimal::from(0) {
        return Err(AppError::BadRequest(format!(
            "starting_balance must be positive, got {starting_balance}"
        )));
    }

    let service = db::create_service(&state.pool, &symbol, &starting_balance).await?;
    info!(service_id = service.id, %symbol, balance = %starting_balance, "🆕 Service created");

    state
        .register_worker(service.id, cycle::spawn(state.clone(), service.id))
        .await;
    state.broadcast(&WsEvent::ServiceCreated {
        service: Box::new(service.clone()),
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "service": service })),
    ))
}

/// POST /api/services/:id/stop — deactivate and cancel the cycle worker.
pub async fn stop_service(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let service = db::get_service(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {id} not found")))?;

    if !service.is_active() {
        return Err(AppError::InvalidState(format!(
            "Service {id} is already inactive"
        )));
    }

    let service = db::set_service_state(&state.pool, id, ServiceState::Inactive, None).await?;
    state.cancel_worker(id).await;

    info!(service_id = id, "🛑 Service stopped");
    state.broadcast(&WsEvent::ServiceStopped { service_id: id });

    Ok(Json(json!({ "ok": true, "service": service })))
}

/// POST /api/services/:id/start — reactivate an existing service.
///
/// The mode is inferred from the book: holdings → SELL, empty → BUY, so a
/// service stopped mid-cycle resumes where it left off.
pub async fn start_service(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let service = db::get_service(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {id} not found")))?;

    if service.is_active() {
        return Err(AppError::InvalidState(format!(
            "Service {id} is already active"
        )));
    }

    let mode = ServiceMode::for_holdings(service.shares_held);
    let service =
        db::set_service_state(&state.pool, id, ServiceState::Active, Some(mode)).await?;

    state
        .register_worker(id, cycle::spawn(state.clone(), id))
        .await;

    info!(service_id = id, ?mode, "▶️ Service restarted");
    state.broadcast(&WsEvent::ServiceStarted {
        service: Box::new(service.clone()),
    });

    Ok(Json(json!({ "ok": true, "service": service })))
}

/// GET /api/services — every service, newest first.
pub async fn list_services(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let services = db::list_services(&state.pool).await?;
    Ok(Json(json!({
        "ok":       true,
        "count":    services.len(),
        "services": services,
    })))
}

/// GET /api/services/:id — one service.
pub async fn get_service(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let service = db::get_service(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {id} not found")))?;

    Ok(Json(json!({ "ok": true, "service": service })))
}

/// GET /api/symbols — the symbols a service can be created for.
pub async fn list_symbols() -> impl IntoResponse {
    Json(json!({
        "ok":      true,
        "symbols": market::supported_symbols(),
    }))
}
