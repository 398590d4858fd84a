//! # models::transaction
//!
//! Defines [`Transaction`] — the append-only record of one buy/sell pairing.
//!
//! A transaction is born OPEN when a buy fills and is closed exactly once when
//! the matching sell fills. The three sale fields (`sale_price`, `sold_at`,
//! `gain_loss`) are set atomically together — all three or none — which the
//! storage schema double-checks with a table constraint.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── TransactionState ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "transaction_state", rename_all = "UPPERCASE")]
pub enum TransactionState {
    /// Buy recorded, no matching sale yet.
    Open,
    /// Sale recorded; the row is immutable from here on.
    Closed,
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// One buy/sell pairing, exclusively owned by its service.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub service_id: i64,
    pub symbol: String,
    pub shares: i32,
    pub state: TransactionState,
    pub purchase_price: BigDecimal,
    pub sale_price: Option<BigDecimal>,
    pub gain_loss: Option<BigDecimal>,
    pub purchased_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    /// Close the pairing: set all three sale fields together.
    /// `gain_loss = (sale_price − purchase_price) × shares`, exact.
    pub fn close(&mut self, sale_price: BigDecimal, sold_at: DateTime<Utc>) {
        let gain_loss = (&sale_price - &self.purchase_price) * BigDecimal::from(self.shares);
        self.sale_price = Some(sale_price);
        self.gain_loss = Some(gain_loss);
        self.sold_at = Some(sold_at);
        self.state = TransactionState::Closed;
    }
}

// ─── NewTransaction ───────────────────────────────────────────────────────────

/// An open transaction about to be inserted (no id until the database assigns
/// one).
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub service_id: i64,
    pub symbol: String,
    pub shares: i32,
    pub purchase_price: BigDecimal,
    pub purchased_at: DateTime<Utc>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
