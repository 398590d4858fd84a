//! # engine::ledger
//!
//! Exact ledger arithmetic for one tick's worth of mutation, kept pure so the
//! cycle worker can compute the full effect of a tick in memory and persist it
//! in a single storage transaction afterwards.
//!
//! All amounts are exact decimals; a buy of `n` shares at `p` followed by a
//! sell of all `n` at `q` always yields `gain_loss == (q − p) × n` and a fund
//! balance of `before − n×p + n×q` to the cent.

use bigdecimal::BigDecimal;

use crate::engine::execution::{BuyFill, SellFill};
use crate::models::{NewTransaction, ServiceMode, TradingService, Transaction};

/// Record a buy fill against the ledger: debit the fund balance, take the
/// shares onto the book, bump the buy counter, and flip to SELL mode.
///
/// Returns the open transaction row to insert alongside the service update.
pub fn apply_buy(service: &mut TradingService, fill: &BuyFill) -> NewTransaction {
    let cost = &fill.price * BigDecimal::from(fill.shares);

    service.fund_balance -= cost;
    service.shares_held += fill.shares;
    service.buy_count += 1;
    service.mode = ServiceMode::Sell;

    NewTransaction {
        service_id: service.id,
        symbol: service.symbol.clone(),
        shares: fill.shares,
        purchase_price: fill.price.clone(),
        purchased_at: fill.executed_at,
    }
}

/// Record a sell fill: close the transaction (sale price, sale time and
/// gain/loss set together), credit the proceeds, accumulate the realised
/// gain/loss, and flip back to BUY mode with an empty book.
pub fn apply_sell(service: &mut TradingService, transaction: &mut Transaction, fill: &SellFill) {
    transaction.close(fill.price.clone(), fill.executed_at);

    let proceeds = &fill.price * BigDecimal::from(transaction.shares);
    service.fund_balance += proceeds;
    if let Some(gain_loss) = &transaction.gain_loss {
        service.total_gain_loss += gain_loss.clone();
    }
    service.sell_count += 1;
    service.shares_held = 0;
    service.mode = ServiceMode::Buy;
}

/// Defensive recovery: a service in SELL mode with nothing on the book flips
/// back to BUY. Returns whether a flip happened.
pub fn recover_mode(service: &mut TradingService) -> bool {
    if service.mode == ServiceMode::Sell && service.shares_held <= 0 {
        service.mode = ServiceMode::Buy;
        true
    } else {
        false
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ServiceState, TransactionState};
    use crate::money;
    use chrono::Utc;

    fn service_with_balance(cents: i64) -> TradingService {
        TradingService {
            id: 1,
            symbol: "AAPL".to_string(),
            starting_balance: money::from_cents(cents),
            fund_balance: money::from_cents(cents),
            total_gain_loss: BigDecimal::from(0),
            shares_held: 0,
            state: ServiceState::Active,
            mode: ServiceMode::Buy,
            buy_count: 0,
            sell_count: 0,
            started_at: Utc::now(),
        }
    }

    fn buy_fill(shares: i32, price_cents: i64) -> BuyFill {
        BuyFill {
            shares,
            price: money::from_cents(price_cents),
            executed_at: Utc::now(),
        }
    }

    fn sell_fill(price_cents: i64) -> SellFill {
        SellFill {
            price: money::from_cents(price_cents),
            executed_at: Utc::now(),
        }
    }

    fn as_row(new: NewTransaction, id: i64) -> Transaction {
        Transaction {
            id,
            service_id: new.service_id,
            symbol: new.symbol,
            shares: new.shares,
            state: TransactionState::Open,
            purchase_price: new.purchase_price,
            sale_price: None,
            gain_loss: None,
            purchased_at: new.purchased_at,
            sold_at: None,
        }
    }

    #[test]
    fn buy_debits_funds_and_flips_to_sell() {
        // 1000.00 balance, 5 shares fill at 175.00
        let mut service = service_with_balance(100_000);
        let new_txn = apply_buy(&mut service, &buy_fill(5, 17_500));

        assert_eq!(service.fund_balance, money::from_cents(12_500)); // 1000 − 875
        assert_eq!(service.shares_held, 5);
        assert_eq!(service.buy_count, 1);
        assert_eq!(service.mode, ServiceMode::Sell);

        assert_eq!(new_txn.shares, 5);
        assert_eq!(new_txn.purchase_price, money::from_cents(17_500));
        assert_eq!(new_txn.symbol, "AAPL");
    }

    #[test]
    fn sell_closes_transaction_and_flips_to_buy() {
        let mut service = service_with_balance(100_000);
        let new_txn = apply_buy(&mut service, &buy_fill(5, 17_500));
        let mut txn = as_row(new_txn, 42);

        apply_sell(&mut service, &mut txn, &sell_fill(18_000));

        // gain_loss = 5 × (180 − 175) = 25.00; balance = 125 + 900 = 1025.00
        assert_eq!(txn.state, TransactionState::Closed);
        assert_eq!(txn.gain_loss, Some(money::from_cents(2_500)));
        assert_eq!(service.fund_balance, money::from_cents(102_500));
        assert_eq!(service.total_gain_loss, money::from_cents(2_500));
        assert_eq!(service.shares_held, 0);
        assert_eq!(service.sell_count, 1);
        assert_eq!(service.mode, ServiceMode::Buy);
    }

    #[test]
    fn round_trip_is_exact() {
        let mut service = service_with_balance(100_000);
        let before = service.fund_balance.clone();

        let new_txn = apply_buy(&mut service, &buy_fill(3, 17_833));
        let mut txn = as_row(new_txn, 1);
        apply_sell(&mut service, &mut txn, &sell_fill(17_211));

        // balance = before − 3×178.33 + 3×172.11, exact to the cent
        let expected = before - money::from_cents(3 * 17_833) + money::from_cents(3 * 17_211);
        assert_eq!(service.fund_balance, expected);
        assert_eq!(txn.gain_loss, Some(money::from_cents(3 * (17_211 - 17_833))));
    }

    #[test]
    fn losses_accumulate_in_total_gain_loss() {
        let mut service = service_with_balance(100_000);

        let mut txn = as_row(apply_buy(&mut service, &buy_fill(5, 17_500)), 1);
        apply_sell(&mut service, &mut txn, &sell_fill(17_000));
        let mut txn = as_row(apply_buy(&mut service, &buy_fill(5, 17_000)), 2);
        apply_sell(&mut service, &mut txn, &sell_fill(17_400));

        // −25.00 then +20.00
        assert_eq!(service.total_gain_loss, money::from_cents(-500));
        assert_eq!(service.buy_count, 2);
        assert_eq!(service.sell_count, 2);
    }

    #[test]
    fn recover_mode_flips_only_empty_sell_services() {
        let mut service = service_with_balance(100_000);
        service.mode = ServiceMode::Sell;
        assert!(recover_mode(&mut service));
        assert_eq!(service.mode, ServiceMode::Buy);

        // A SELL service actually holding shares is left alone.
        let mut service = service_with_balance(100_000);
        apply_buy(&mut service, &buy_fill(5, 17_500));
        assert!(!recover_mode(&mut service));
        assert_eq!(service.mode, ServiceMode::Sell);

        // A BUY service is never touched.
        let mut service = service_with_balance(100_000);
        assert!(!recover_mode(&mut service));
    }
}
