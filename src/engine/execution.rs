//! # engine::execution
//!
//! **Mock Execution Service** — simulates trade fills against the mock price
//! table. A fill price is the symbol's base price nudged by a uniform draw
//! inside its movement band and rounded to whole cents; the reserved demo
//! symbols override the draw on the sell side so a demo can show a guaranteed
//! outcome.
//!
//! Buy sizing keeps a 1% buffer: `floor(funds / price × 0.99)` shares, so
//! rounding or fees can never overdraw the fund balance.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::info;

use crate::error::AppError;
use crate::market;
use crate::money;

// ─── Fills ────────────────────────────────────────────────────────────────────

/// Result of a simulated buy.
#[derive(Debug, Clone)]
pub struct BuyFill {
    pub shares: i32,
    pub price: BigDecimal,
    pub executed_at: DateTime<Utc>,
}

/// Result of a simulated sell.
#[derive(Debug, Clone)]
pub struct SellFill {
    pub price: BigDecimal,
    pub executed_at: DateTime<Utc>,
}

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Injectable execution venue. The production impl is [`MockExchange`]; tests
/// use fixed-price fakes.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Buy as many shares of `symbol` as `available_funds` affords.
    async fn buy(
        &self,
        symbol: &str,
        available_funds: &BigDecimal,
    ) -> Result<BuyFill, AppError>;

    /// Sell `shares` shares of `symbol` at the current simulated price.
    async fn sell(&self, symbol: &str, shares: i32) -> Result<SellFill, AppError>;
}

// ─── Pricing / Sizing (pure) ──────────────────────────────────────────────────

/// Apply a fractional movement to a base price and round to whole cents.
pub fn fill_price_cents(base_cents: i64, movement: f64) -> i64 {
    (base_cents as f64 * (1.0 + movement)).round() as i64
}

/// `floor(funds / price × 0.99)` in exact integer arithmetic.
pub fn affordable_shares(funds_cents: i64, price_cents: i64) -> i32 {
    if funds_cents <= 0 || price_cents <= 0 {
        return 0;
    }
    ((funds_cents as i128 * 99) / (price_cents as i128 * 100)) as i32
}

// ─── MockExchange ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockExchange;

impl MockExchange {
    /// Draw a simulated fill price for a **normalized** symbol, in cents.
    fn draw_price_cents(&self, symbol: &str) -> Result<i64, AppError> {
        let base = market::base_price_cents(symbol)
            .ok_or_else(|| AppError::InvalidSymbol(symbol.to_string()))?;
        let band = market::movement_band(symbol)
            .ok_or_else(|| AppError::InvalidSymbol(symbol.to_string()))?;

        let movement = rand::thread_rng().gen_range(-band..band);
        Ok(fill_price_cents(base, movement))
    }
}

#[async_trait]
impl ExecutionService for MockExchange {
    async fn buy(
        &self,
        symbol: &str,
        available_funds: &BigDecimal,
    ) -> Result<BuyFill, AppError> {
        let symbol = market::normalize(symbol)?;

        let funds_cents = money::to_cents(available_funds).ok_or_else(|| {
            AppError::Execution(format!(
                "Fund balance {available_funds} is not a whole number of cents"
            ))
        })?;

        let price_cents = self.draw_price_cents(&symbol)?;
        let price = money::from_cents(price_cents);

        let shares = affordable_shares(funds_cents, price_cents);
        if shares <= 0 {
            return Err(AppError::Execution(format!(
                "Insufficient funds ({available_funds}) to purchase {symbol} at {price}"
            )));
        }

        info!(%symbol, shares, price = %price, "Mock buy filled");
        Ok(BuyFill {
            shares,
            price,
            executed_at: Utc::now(),
        })
    }

    async fn sell(&self, symbol: &str, shares: i32) -> Result<SellFill, AppError> {
        if shares <= 0 {
            return Err(AppError::Execution(format!(
                "Cannot sell {shares} shares — quantity must be positive"
            )));
        }
        let symbol = market::normalize(symbol)?;

        let base = market::base_price_cents(&symbol)
            .ok_or_else(|| AppError::InvalidSymbol(symbol.clone()))?;
        let drawn = self.draw_price_cents(&symbol)?;

        // Reserved demo symbols: a BULL draw below base is bumped to +5% and a
        // BEAR draw above base is pushed to -5%; draws already on the right
        // side of base keep their random spread. TEST always fills at exactly
        // +10%.
        let price_cents = match symbol.as_str() {
            "BULL" if drawn < base => base * 105 / 100,
            "BEAR" if drawn > base => base * 95 / 100,
            "TEST" => base * 110 / 100,
            _ => drawn,
        };
        let price = money::from_cents(price_cents);

        info!(%symbol, shares, price = %price, "Mock sell filled");
        Ok(SellFill {
            price,
            executed_at: Utc::now(),
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
