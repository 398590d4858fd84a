//! # events
//!
//! Defines [`WsEvent`] — everything the backend broadcasts to WebSocket
//! clients after a service or transaction changes state.
//!
//! Events travel through a `tokio::sync::broadcast::Sender<String>` as
//! pre-serialized JSON, so publishing is fire-and-forget: a sink failure (no
//! listeners, slow client) can never fail the tick that produced the event.

use serde::Serialize;

use crate::models::{TradingService, Transaction};

/// Every event shape a WebSocket client can receive.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsEvent {
    /// A new service row exists and its cycle worker is spinning up.
    ServiceCreated { service: Box<TradingService> },

    /// An inactive service was restarted with a fresh worker.
    ServiceStarted { service: Box<TradingService> },

    /// A stop request took effect; the worker exits within one poll interval.
    ServiceStopped { service_id: i64 },

    /// The ledger row changed (a tick committed or a mode was recovered).
    ServiceUpdated { service: Box<TradingService> },

    /// A buy filled — a new open transaction exists.
    TransactionOpened { transaction: Box<Transaction> },

    /// A sell filled — the open transaction closed with its gain/loss.
    TransactionClosed { transaction: Box<Transaction> },

    /// Periodic server counters for dashboards.
    ServerStats {
        tick_count: u64,
        trade_count: u64,
        active_services: i64,
    },
}

impl WsEvent {
    /// Serialize for the broadcast channel.
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_a_screaming_tag() {
        let json = WsEvent::ServiceStopped { service_id: 7 }.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "SERVICE_STOPPED");
        assert_eq!(value["service_id"], 7);

        let json = WsEvent::ServerStats {
            tick_count: 3,
            trade_count: 1,
            active_services: 2,
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "SERVER_STATS");
    }
}
