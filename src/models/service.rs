//! # models::service
//!
//! Defines [`TradingService`] — the single mutable ledger row behind each
//! trading session: balance, shares held, cycle counters, and the
//! ACTIVE/INACTIVE × BUY/SELL state pair the cycle worker drives.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── ServiceState ─────────────────────────────────────────────────────────────

/// Whether a cycle worker may tick this service at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "service_state", rename_all = "UPPERCASE")]
pub enum ServiceState {
    Active,
    Inactive,
}

// ─── ServiceMode ──────────────────────────────────────────────────────────────

/// Which half of the buy/sell cycle the service is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "service_mode", rename_all = "UPPERCASE")]
pub enum ServiceMode {
    Buy,
    Sell,
}

impl ServiceMode {
    /// Mode implied by the current holdings: shares on the book mean the
    /// service is waiting to sell them, otherwise it is waiting to buy.
    pub fn for_holdings(shares_held: i32) -> Self {
        if shares_held > 0 {
            ServiceMode::Sell
        } else {
            ServiceMode::Buy
        }
    }
}

// ─── TradingService ───────────────────────────────────────────────────────────

/// One per symbol-tracking session. Created on a start request, mutated each
/// tick by the cycle worker, never hard-deleted.
///
/// Invariants (restored by the worker if violated, enforced on every ledger
/// mutation):
/// - `mode == Sell` ⇒ `shares_held > 0`
/// - `shares_held == 0` ⇒ `mode == Buy`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TradingService {
    pub id: i64,
    pub symbol: String,
    pub starting_balance: BigDecimal,
    /// Available funds — debited on buy, credited on sell.
    pub fund_balance: BigDecimal,
    /// Cumulative realised gain/loss across closed transactions.
    pub total_gain_loss: BigDecimal,
    pub shares_held: i32,
    pub state: ServiceState,
    pub mode: ServiceMode,
    pub buy_count: i32,
    pub sell_count: i32,
    pub started_at: DateTime<Utc>,
}

impl TradingService {
    pub fn is_active(&self) -> bool {
        self.state == ServiceState::Active
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_holdings() {
        assert_eq!(ServiceMode::for_holdings(0), ServiceMode::Buy);
        assert_eq!(ServiceMode::for_holdings(5), ServiceMode::Sell);
    }

    #[test]
    fn states_serialize_screaming() {
        assert_eq!(
            serde_json::to_string(&ServiceState::Inactive).unwrap(),
            r#""INACTIVE""#
        );
        assert_eq!(
            serde_json::to_string(&ServiceMode::Sell).unwrap(),
            r#""SELL""#
        );
    }
}
