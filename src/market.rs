//! # market
//!
//! The fixed mock-market universe: which symbols are tradable, their current
//! mock price, and how far the simulated fill price may wander per trade.
//!
//! There is no live feed anywhere in this system — every price the oracle and
//! the mock exchange see comes from this table. A few reserved demo symbols
//! (`BULL`, `BEAR`, `TEST`) get deterministic sell behaviour so a demo can
//! show a guaranteed gain or loss.

use bigdecimal::BigDecimal;

use crate::error::AppError;
use crate::money;

// ─── Symbol Table ─────────────────────────────────────────────────────────────

/// (symbol, current mock price in cents, movement band as a fraction).
///
/// The band is the half-width of the uniform draw applied per simulated fill:
/// TSLA at 0.04 fills anywhere in ±4% of its base price.
const SYMBOLS: &[(&str, i64, f64)] = &[
    ("AAPL", 17_500, 0.020),
    ("MSFT", 39_000, 0.015),
    ("GOOGL", 15_000, 0.025),
    ("AMZN", 17_800, 0.030),
    ("META", 47_800, 0.035),
    ("TSLA", 17_500, 0.040),
    ("NVDA", 95_000, 0.045),
    ("NFLX", 62_500, 0.030),
    ("PYPL", 6_200, 0.025),
    ("INTC", 3_100, 0.020),
    // Reserved demo symbols — deterministic sell overrides in the exchange.
    ("BULL", 5_000, 0.050),
    ("BEAR", 5_000, 0.050),
    ("TEST", 10_000, 0.050),
];

/// Uppercase the symbol and reject anything outside the supported set.
///
/// Every oracle and execution entry point funnels through here, so an
/// unsupported symbol fails before any side effect.
pub fn normalize(symbol: &str) -> Result<String, AppError> {
    let upper = symbol.trim().to_uppercase();
    if SYMBOLS.iter().any(|(s, _, _)| *s == upper) {
        Ok(upper)
    } else {
        Err(AppError::InvalidSymbol(symbol.to_string()))
    }
}

/// Current mock price for a **normalized** symbol, in cents.
pub fn base_price_cents(symbol: &str) -> Option<i64> {
    SYMBOLS
        .iter()
        .find(|(s, _, _)| *s == symbol)
        .map(|(_, cents, _)| *cents)
}

/// Current mock price for a **normalized** symbol as an exact decimal.
pub fn base_price(symbol: &str) -> Option<BigDecimal> {
    base_price_cents(symbol).map(money::from_cents)
}

/// Movement band (fraction) for a **normalized** symbol.
pub fn movement_band(symbol: &str) -> Option<f64> {
    SYMBOLS
        .iter()
        .find(|(s, _, _)| *s == symbol)
        .map(|(_, _, band)| *band)
}

/// All supported symbols, in table order (used by the API surface).
pub fn supported_symbols() -> Vec<&'static str> {
    SYMBOLS.iter().map(|(s, _, _)| *s).collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
