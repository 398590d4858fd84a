//! # engine::oracle
//!
//! **Decision Oracle** — probabilistic BUY/SELL signals per symbol.
//!
//! The probability tables are static mock data: a per-symbol buy probability,
//! and a sell probability scaled by how far the fixed mock price has moved
//! from the purchase price (take profits eagerly, hold small losses, cut deep
//! ones). The Bernoulli draw is the only nondeterminism and it lives behind
//! the [`DecisionOracle`] trait so tests can substitute a fixed oracle.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::market;
use crate::money;

// ─── Decision ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Yes,
    No,
}

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Injectable decision strategy. No hidden state is carried between calls.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Should the service buy `symbol` this tick?
    async fn decide_buy(&self, symbol: &str) -> Result<Decision, AppError>;

    /// Should the service sell `symbol` bought at `purchase_price` this tick?
    async fn decide_sell(
        &self,
        symbol: &str,
        purchase_price: &BigDecimal,
    ) -> Result<Decision, AppError>;
}

// ─── Probability Tables (pure) ────────────────────────────────────────────────

/// Per-symbol buy probability. Demo symbols fall through to the 0.5 default.
pub fn buy_probability(symbol: &str) -> f64 {
    match symbol {
        "AAPL" => 0.75,
        "MSFT" => 0.70,
        "GOOGL" => 0.65,
        "AMZN" => 0.60,
        "META" => 0.55,
        "TSLA" => 0.50,
        "NVDA" => 0.75,
        "NFLX" => 0.55,
        "PYPL" => 0.45,
        "INTC" => 0.40,
        _ => 0.50,
    }
}

/// Static per-symbol skew applied on top of the piecewise sell curve.
/// Negative = hold longer, positive = sell sooner.
fn sell_adjustment(symbol: &str) -> f64 {
    match symbol {
        "AAPL" => -0.10,
        "MSFT" => -0.10,
        "GOOGL" => -0.05,
        "META" => 0.05,
        "TSLA" => 0.10,
        "NVDA" => -0.15,
        "PYPL" => 0.10,
        "INTC" => 0.05,
        _ => 0.0,
    }
}

/// Sell probability for a given gap between current mock price and purchase
/// price, expressed in percent (positive = profit).
///
/// Piecewise: probability rises with profit (capped 0.9), holds through small
/// and moderate losses, and rises again to cut severe losses (capped 0.8
/// before the per-symbol skew). Final result is clamped to [0.1, 0.9].
pub fn sell_probability(symbol: &str, price_diff_percent: f64) -> f64 {
    let base = 0.5;

    let mut probability = if price_diff_percent > 0.0 {
        (base + price_diff_percent / 100.0).min(0.9)
    } else if price_diff_percent > -5.0 {
        (base + price_diff_percent / 100.0).max(0.1)
    } else if price_diff_percent > -15.0 {
        (base + price_diff_percent / 200.0).max(0.2)
    } else {
        (base - price_diff_percent / 50.0).min(0.8)
    };

    probability += sell_adjustment(symbol);
    probability.clamp(0.1, 0.9)
}

// ─── RandomOracle ─────────────────────────────────────────────────────────────

/// The production oracle: validates the symbol, looks up the probability, and
/// makes a single Bernoulli draw.
#[derive(Debug, Default)]
pub struct RandomOracle;

#[async_trait]
impl DecisionOracle for RandomOracle {
    async fn decide_buy(&self, symbol: &str) -> Result<Decision, AppError> {
        let symbol = market::normalize(symbol)?;
        let probability = buy_probability(&symbol);

        let decision = draw(probability);
        info!(%symbol, probability, ?decision, "Buy decision");
        Ok(decision)
    }

    async fn decide_sell(
        &self,
        symbol: &str,
        purchase_price: &BigDecimal,
    ) -> Result<Decision, AppError> {
        let symbol = market::normalize(symbol)?;

        // The "current" price is the fixed mock table entry; the gap to the
        // purchase price drives the piecewise curve.
        let current = market::base_price(&symbol)
            .ok_or_else(|| AppError::InvalidSymbol(symbol.clone()))?;
        let purchase = money::to_f64(purchase_price);
        let diff_percent = if purchase > 0.0 {
            (money::to_f64(&current) - purchase) / purchase * 100.0
        } else {
            0.0
        };

        let probability = sell_probability(&symbol, diff_percent);
        let decision = draw(probability);
        debug!(
            %symbol,
            purchase_price = %purchase_price,
            current_price = %current,
            diff_percent,
            probability,
            "Sell probability computed"
        );
        info!(%symbol, probability, ?decision, "Sell decision");
        Ok(decision)
    }
}

fn draw(probability: f64) -> Decision {
    if rand::thread_rng().gen::<f64>() < probability {
        Decision::Yes
    } else {
        Decision::No
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
