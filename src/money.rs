//! # money
//!
//! Exact 2-decimal arithmetic helpers on top of [`BigDecimal`].
//!
//! Every balance and price in the system is a whole number of cents; working
//! through these helpers keeps the ledger math exact (no float drift in
//! `gain_loss` or `fund_balance`) while the mock price *generation* is free to
//! use `f64` internally and round at the boundary.

use bigdecimal::{BigDecimal, ToPrimitive};

/// Build an exact 2-decimal amount from a cent count, e.g. `17_500` → `175.00`.
pub fn from_cents(cents: i64) -> BigDecimal {
    BigDecimal::from(cents) / BigDecimal::from(100)
}

/// Convert an amount to cents. Returns `None` if the value is not a whole
/// number of cents (which would indicate a bug upstream — all persisted
/// amounts are NUMERIC(12,2)).
pub fn to_cents(amount: &BigDecimal) -> Option<i64> {
    let scaled = amount * BigDecimal::from(100);
    if scaled.is_integer() {
        scaled.to_i64()
    } else {
        None
    }
}

/// Lossy conversion for probability math (percentage gaps, log output).
pub fn to_f64(amount: &BigDecimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
