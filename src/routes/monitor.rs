//! # routes::monitor
//!
//! **Monitor Loop** — endpoints for dashboards.
//!
//! ## Endpoints
//!
//! | Method    | Path          | Description                              |
//! |-----------|---------------|------------------------------------------|
//! | GET (WS)  | `/ws/events`  | WebSocket real-time event stream         |
//! | GET       | `/api/stats`  | tick_count, trade_count, active services |
//! | GET       | `/health`     | Liveness probe                           |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

use crate::db;
use crate::error::AppError;
use crate::events::WsEvent;
use crate::state::SharedState;

// ─── WebSocket Handler ────────────────────────────────────────────────────────

/// Upgrade HTTP → WebSocket and subscribe to the broadcast channel.
///
/// Clients connect to `ws://localhost:3000/ws/events`; every [`WsEvent`]
/// arrives as a JSON text frame. The first frame is a `SNAPSHOT` of all
/// services so a dashboard can render without a separate REST round trip.
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 WebSocket client connected");

    // ── Snapshot on connect ───────────────────────────────────────────────────
    let snapshot = match db::list_services(&state.pool).await {
        Ok(services) => json!({
            "event":       "SNAPSHOT",
            "services":    services,
            "tick_count":  state.tick_count.load(Ordering::Relaxed),
            "trade_count": state.trade_count.load(Ordering::Relaxed),
        })
        .to_string(),
        Err(err) => {
            warn!(error = %err, "Snapshot query failed, sending empty snapshot");
            json!({ "event": "SNAPSHOT", "services": [] }).to_string()
        }
    };

    if sender.send(Message::Text(snapshot.into())).await.is_err() {
        return; // Client closed before the snapshot went out
    }

    // ── Event Loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Broadcast event → forward to the WebSocket client
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str.into())).await.is_err() {
                            break; // Client disconnect
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // Slow reader — some events were skipped
                        debug!("WS client lagged, skipped {n} events");
                    }
                    Err(_) => break, // Channel closed
                }
            }

            // Messages from the client (Ping / Close)
            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {} // Text/Binary from client — ignored for now
                }
            }
        }
    }

    info!("🔌 WebSocket client disconnected");
}

// ─── REST Monitoring Endpoints ────────────────────────────────────────────────

/// GET /api/stats — server counters. Also rebroadcast as a `SERVER_STATS`
/// event so WebSocket dashboards refresh whenever anyone polls.
pub async fn get_stats(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let tick_count = state.tick_count.load(Ordering::Relaxed);
    let trade_count = state.trade_count.load(Ordering::Relaxed);
    let active_services = db::count_active_services(&state.pool).await?;

    state.broadcast(&WsEvent::ServerStats {
        tick_count,
        trade_count,
        active_services,
    });

    Ok(Json(json!({
        "ok":              true,
        "tick_count":      tick_count,
        "trade_count":     trade_count,
        "active_services": active_services,
    })))
}

/// GET /health — liveness probe, no auth required.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "ok": true, "status": "healthy" }))
}
