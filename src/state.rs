//! # state
//!
//! Top-level shared state injected into every Axum handler and cycle worker:
//! the storage pool, the broadcast channel feeding WebSocket clients, the
//! injectable oracle/execution strategies, and the registry of running cycle
//! workers (one cancellable task per active service).

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{broadcast, RwLock};

use crate::config::Config;
use crate::db;
use crate::engine::cycle::WorkerHandle;
use crate::engine::execution::{ExecutionService, MockExchange};
use crate::engine::oracle::{DecisionOracle, RandomOracle};
use crate::events::WsEvent;

// ─── AppState ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// PostgreSQL pool — the single storage handle, passed down explicitly.
    pub pool: PgPool,

    /// Broadcast channel for WebSocket fan-out. Pre-serialized JSON strings.
    pub broadcast_tx: broadcast::Sender<String>,

    /// Injectable decision strategy (deterministic fakes in tests).
    pub oracle: Arc<dyn DecisionOracle>,

    /// Injectable execution venue.
    pub exchange: Arc<dyn ExecutionService>,

    /// Running cycle workers keyed by service id.
    pub workers: Arc<RwLock<HashMap<i64, WorkerHandle>>>,

    // ── Metrics ───────────────────────────────────────────────────────────────
    pub tick_count: Arc<AtomicU64>,
    pub trade_count: Arc<AtomicU64>,
}

impl AppState {
    /// Publish an event to all WebSocket clients. Never fails — an `Err` from
    /// the channel just means nobody is listening right now.
    pub fn broadcast(&self, event: &WsEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    /// Register (or replace) the worker for a service. A replaced worker is
    /// cancelled so two loops never tick the same ledger row.
    pub async fn register_worker(&self, service_id: i64, handle: WorkerHandle) {
        let mut workers = self.workers.write().await;
        if let Some(old) = workers.insert(service_id, handle) {
            old.cancel();
        }
    }

    /// Signal a worker to stop. Returns whether one was registered. The loop
    /// observes the token within one poll interval.
    pub async fn cancel_worker(&self, service_id: i64) -> bool {
        let mut workers = self.workers.write().await;
        match workers.remove(&service_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a worker's registry entry after its loop has exited on its own
    /// (service gone or INACTIVE in storage). Only removes entries whose
    /// cancel channel is already dead, so a replacement worker registered
    /// under the same id is left alone.
    pub async fn forget_worker(&self, service_id: i64) {
        let mut workers = self.workers.write().await;
        if workers.get(&service_id).is_some_and(WorkerHandle::is_stale) {
            workers.remove(&service_id);
        }
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

pub async fn build_state(config: Config) -> anyhow::Result<SharedState> {
    let pool = db::init_pool(&config.database_url).await?;
    let (broadcast_tx, _) = broadcast::channel(256);

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        pool,
        broadcast_tx,
        oracle: Arc::new(RandomOracle),
        exchange: Arc::new(MockExchange),
        workers: Arc::new(RwLock::new(HashMap::new())),
        tick_count: Arc::new(AtomicU64::new(0)),
        trade_count: Arc::new(AtomicU64::new(0)),
    }))
}
