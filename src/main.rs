//! # Daytrader — Simulated Day-Trading Backend
//!
//! ```text
//!  ┌─────────────┐  POST /api/services         ┌─────────────────────────────┐
//!  │  Client     │ ──────────────────────────▶ │ AppState                    │
//!  │  (REST)     │  POST /api/services/:id/*   │ ├─ pool (PostgreSQL)        │
//!  └─────────────┘  GET  /api/transactions     │ ├─ oracle  🎲               │
//!                                              │ ├─ exchange 🏦              │
//!  ┌─────────────┐          per service        │ ├─ workers ──┐ 🔁           │
//!  │  Dashboard  │  ws://host/ws/events ◀──────│ └─ broadcast_tx             │
//!  └─────────────┘  GET  /api/stats            └──────────────┼──────────────┘
//!                                                  cycle worker loop:
//!                                                  BUY → SELL → BUY …
//! ```
//!
//! Each active service runs an autonomous cycle worker that alternates buys
//! and sells against a mock exchange, driven by a probabilistic decision
//! oracle, persisting every tick to PostgreSQL and broadcasting it over
//! WebSocket.

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod db;
mod engine;
mod error;
mod events;
mod market;
mod models;
mod money;
mod routes;
mod state;

use auth::require_api_key;
use config::Config;
use engine::cycle;
use routes::{
    monitor::{get_stats, health_check, ws_events},
    services::{
        create_service, get_service, list_services, list_symbols, start_service, stop_service,
    },
    transactions::list_transactions,
};
use state::{build_state, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("daytrader=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║           DAYTRADER — Simulated Trading Backend       ║
  ║  Services · Cycle Workers · Oracle · Mock Exchange    ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config & shared state ──────────────────────────────────────────────
    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let state = build_state(config).await?;

    // ── 4. Resume workers for services left ACTIVE in storage ────────────────
    resume_active_services(&state).await;

    // ── 5. CORS ───────────────────────────────────────────────────────────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // ── 6. Router ─────────────────────────────────────────────────────────────
    let app = Router::new()
        // ── Service Lifecycle ─────────────────────────────────────────────────
        .route("/api/services",           post(create_service))
        .route("/api/services",           get(list_services))
        .route("/api/services/:id",       get(get_service))
        .route("/api/services/:id/start", post(start_service))
        .route("/api/services/:id/stop",  post(stop_service))
        .route("/api/symbols",            get(list_symbols))
        // ── Transaction History ───────────────────────────────────────────────
        .route("/api/transactions",       get(list_transactions))
        // ── Monitor Loop ──────────────────────────────────────────────────────
        .route("/ws/events",              get(ws_events))
        .route("/api/stats",              get(get_stats))
        .route("/health",                 get(health_check))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn(require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // ── 7. Bind & Serve ───────────────────────────────────────────────────────
    let addr: SocketAddr = bind_addr.parse()?;

    info!(?addr, "🚀 Daytrader server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Respawn a cycle worker for every service the database says is ACTIVE, so a
/// restart picks up trading where the previous process left off.
async fn resume_active_services(state: &SharedState) {
    match db::list_active_services(&state.pool).await {
        Ok(services) => {
            for service in &services {
                state
                    .register_worker(service.id, cycle::spawn(state.clone(), service.id))
                    .await;
            }
            if !services.is_empty() {
                info!(count = services.len(), "♻️ Resumed workers for active services");
            }
        }
        Err(err) => warn!(error = %err, "Could not resume active services"),
    }
}
