//! # engine::cycle
//!
//! The trading cycle: a polling loop per active service that alternates
//! strict BUY → SELL → BUY ticks.
//!
//! Each tick is computed first against in-memory copies ([`run_tick`], pure
//! apart from the injected oracle and exchange) and only then persisted, so a
//! storage failure mid-tick leaves the previous committed state untouched.
//! The loop itself runs as a spawned task holding a watch-channel cancel
//! token; a stop request flips the token and the loop exits within one poll
//! interval, usually immediately.

use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::db;
use crate::engine::execution::ExecutionService;
use crate::engine::ledger;
use crate::engine::oracle::{Decision, DecisionOracle};
use crate::error::AppError;
use crate::events::WsEvent;
use crate::models::{NewTransaction, ServiceMode, TradingService, Transaction};
use crate::state::SharedState;

// ─── Tick ─────────────────────────────────────────────────────────────────────

/// What a single tick did. `Skipped` is a tick the exchange refused (for
/// example insufficient funds) — not an error, the loop just waits for the
/// next interval.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing happened: service inactive, or the oracle said no.
    Idle,
    /// A buy filled; the returned row is the transaction to open.
    Bought(NewTransaction),
    /// A sell filled; the passed-in open transaction is now closed.
    Sold,
    /// A SELL-mode service with an empty book was flipped back to BUY.
    Recovered,
    /// The exchange declined the order this tick.
    Skipped(String),
}

/// Run one tick of the cycle against in-memory state.
///
/// `open_txn` must be the service's open transaction when it holds shares in
/// SELL mode; the caller persists whatever this mutates.
pub async fn run_tick(
    service: &mut TradingService,
    open_txn: Option<&mut Transaction>,
    oracle: &dyn DecisionOracle,
    exchange: &dyn ExecutionService,
) -> Result<TickOutcome, AppError> {
    if !service.is_active() {
        return Ok(TickOutcome::Idle);
    }

    match service.mode {
        ServiceMode::Buy => tick_buy(service, oracle, exchange).await,
        ServiceMode::Sell => tick_sell(service, open_txn, oracle, exchange).await,
    }
}

async fn tick_buy(
    service: &mut TradingService,
    oracle: &dyn DecisionOracle,
    exchange: &dyn ExecutionService,
) -> Result<TickOutcome, AppError> {
    if oracle.decide_buy(&service.symbol).await? == Decision::No {
        return Ok(TickOutcome::Idle);
    }

    let fill = match exchange.buy(&service.symbol, &service.fund_balance).await {
        Ok(fill) => fill,
        Err(AppError::Execution(reason)) => {
            warn!(service_id = service.id, %reason, "Buy skipped");
            return Ok(TickOutcome::Skipped(reason));
        }
        Err(err) => return Err(err),
    };

    let new_txn = ledger::apply_buy(service, &fill);
    Ok(TickOutcome::Bought(new_txn))
}

async fn tick_sell(
    service: &mut TradingService,
    open_txn: Option<&mut Transaction>,
    oracle: &dyn DecisionOracle,
    exchange: &dyn ExecutionService,
) -> Result<TickOutcome, AppError> {
    // SELL mode with nothing on the book is a stale mode, not a sell.
    if service.shares_held <= 0 {
        ledger::recover_mode(service);
        warn!(service_id = service.id, "SELL mode with no holdings, recovered to BUY");
        return Ok(TickOutcome::Recovered);
    }

    let transaction = open_txn.ok_or_else(|| {
        AppError::InvalidState(format!(
            "Service {} holds {} shares but has no open transaction",
            service.id, service.shares_held
        ))
    })?;

    if oracle
        .decide_sell(&service.symbol, &transaction.purchase_price)
        .await?
        == Decision::No
    {
        return Ok(TickOutcome::Idle);
    }

    let fill = match exchange.sell(&service.symbol, service.shares_held).await {
        Ok(fill) => fill,
        Err(AppError::Execution(reason)) => {
            warn!(service_id = service.id, %reason, "Sell skipped");
            return Ok(TickOutcome::Skipped(reason));
        }
        Err(err) => return Err(err),
    };

    ledger::apply_sell(service, transaction, &fill);
    Ok(TickOutcome::Sold)
}

// ─── Worker ───────────────────────────────────────────────────────────────────

/// Handle to a running cycle worker. The task itself runs detached; only the
/// cancel token is kept.
pub struct WorkerHandle {
    cancel_tx: watch::Sender<bool>,
}

impl WorkerHandle {
    /// Flip the cancel token. The loop observes it at its next await point.
    pub fn cancel(self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Whether the loop behind this handle has already exited (the receiver
    /// side of the cancel channel is gone).
    pub fn is_stale(&self) -> bool {
        self.cancel_tx.is_closed()
    }
}

/// Spawn the polling loop for a service and return its handle.
pub fn spawn(state: SharedState, service_id: i64) -> WorkerHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(run_loop(state, service_id, cancel_rx));
    WorkerHandle { cancel_tx }
}

async fn run_loop(state: SharedState, service_id: i64, mut cancel_rx: watch::Receiver<bool>) {
    let interval = state.config.poll_interval;
    info!(service_id, interval_secs = interval.as_secs(), "🔁 Cycle worker started");

    loop {
        if *cancel_rx.borrow() {
            break;
        }

        match poll_once(&state, service_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(service_id, "Service no longer active, worker exiting");
                break;
            }
            // A failed tick never kills the worker; the next interval retries.
            Err(err) => warn!(service_id, error = %err, "Tick failed"),
        }

        tokio::select! {
            _ = cancel_rx.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    // Receiver must be gone before deregistering — forget_worker's staleness
    // check keys off the dead channel.
    drop(cancel_rx);
    state.forget_worker(service_id).await;

    info!(service_id, "🛑 Cycle worker stopped");
}

/// Load, tick, persist, broadcast. Returns whether the loop should continue.
async fn poll_once(state: &SharedState, service_id: i64) -> Result<bool, AppError> {
    state.tick_count.fetch_add(1, Ordering::Relaxed);

    let Some(mut service) = db::get_service(&state.pool, service_id).await? else {
        return Ok(false);
    };
    if !service.is_active() {
        return Ok(false);
    }

    let mut open_txn = match service.mode {
        ServiceMode::Sell => db::find_open_transaction(&state.pool, service_id).await?,
        ServiceMode::Buy => None,
    };

    let outcome = run_tick(
        &mut service,
        open_txn.as_mut(),
        state.oracle.as_ref(),
        state.exchange.as_ref(),
    )
    .await?;

    match outcome {
        TickOutcome::Idle | TickOutcome::Skipped(_) => {
            debug!(service_id, ?outcome, "Tick left ledger unchanged");
        }
        TickOutcome::Bought(new_txn) => {
            let transaction = db::commit_buy(&state.pool, &service, &new_txn).await?;
            state.trade_count.fetch_add(1, Ordering::Relaxed);

            info!(
                service_id,
                shares = transaction.shares,
                price = %transaction.purchase_price,
                "📈 Bought"
            );
            state.broadcast(&WsEvent::TransactionOpened {
                transaction: Box::new(transaction),
            });
            state.broadcast(&WsEvent::ServiceUpdated {
                service: Box::new(service),
            });
        }
        TickOutcome::Sold => {
            let transaction = open_txn.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("Sold outcome without a transaction"))
            })?;
            db::commit_sell(&state.pool, &service, &transaction).await?;
            state.trade_count.fetch_add(1, Ordering::Relaxed);

            info!(
                service_id,
                shares = transaction.shares,
                sale_price = %transaction.sale_price.clone().unwrap_or_default(),
                gain_loss = %transaction.gain_loss.clone().unwrap_or_default(),
                "📉 Sold"
            );
            state.broadcast(&WsEvent::TransactionClosed {
                transaction: Box::new(transaction),
            });
            state.broadcast(&WsEvent::ServiceUpdated {
                service: Box::new(service),
            });
        }
        TickOutcome::Recovered => {
            db::set_service_mode(&state.pool, service_id, ServiceMode::Buy).await?;
            state.broadcast(&WsEvent::ServiceUpdated {
                service: Box::new(service),
            });
        }
    }

    Ok(true)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::{BuyFill, SellFill};
    use crate::models::{ServiceState, TransactionState};
    use crate::money;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    /// Oracle that always answers the same way.
    struct FixedOracle(Decision);

    #[async_trait]
    impl DecisionOracle for FixedOracle {
        async fn decide_buy(&self, _symbol: &str) -> Result<Decision, AppError> {
            Ok(self.0)
        }
        async fn decide_sell(
            &self,
            _symbol: &str,
            _purchase_price: &BigDecimal,
        ) -> Result<Decision, AppError> {
            Ok(self.0)
        }
    }

    /// Exchange that always fills at one fixed price.
    struct FixedExchange {
        price_cents: i64,
        shares: i32,
    }

    #[async_trait]
    impl ExecutionService for FixedExchange {
        async fn buy(
            &self,
            _symbol: &str,
            _available_funds: &BigDecimal,
        ) -> Result<BuyFill, AppError> {
            Ok(BuyFill {
                shares: self.shares,
                price: money::from_cents(self.price_cents),
                executed_at: Utc::now(),
            })
        }
        async fn sell(&self, _symbol: &str, _shares: i32) -> Result<SellFill, AppError> {
            Ok(SellFill {
                price: money::from_cents(self.price_cents),
                executed_at: Utc::now(),
            })
        }
    }

    /// Exchange that refuses every order.
    struct BrokenExchange;

    #[async_trait]
    impl ExecutionService for BrokenExchange {
        async fn buy(
            &self,
            _symbol: &str,
            _available_funds: &BigDecimal,
        ) -> Result<BuyFill, AppError> {
            Err(AppError::Execution("no liquidity".to_string()))
        }
        async fn sell(&self, _symbol: &str, _shares: i32) -> Result<SellFill, AppError> {
            Err(AppError::Execution("no liquidity".to_string()))
        }
    }

    fn service() -> TradingService {
        TradingService {
            id: 1,
            symbol: "AAPL".to_string(),
            starting_balance: money::from_cents(100_000),
            fund_balance: money::from_cents(100_000),
            total_gain_loss: BigDecimal::from(0),
            shares_held: 0,
            state: ServiceState::Active,
            mode: ServiceMode::Buy,
            buy_count: 0,
            sell_count: 0,
            started_at: Utc::now(),
        }
    }

    fn open_transaction(shares: i32, purchase_cents: i64) -> Transaction {
        Transaction {
            id: 7,
            service_id: 1,
            symbol: "AAPL".to_string(),
            shares,
            state: TransactionState::Open,
            purchase_price: money::from_cents(purchase_cents),
            sale_price: None,
            gain_loss: None,
            purchased_at: Utc::now(),
            sold_at: None,
        }
    }

    #[tokio::test]
    async fn buy_tick_opens_a_transaction() {
        let mut svc = service();
        let exchange = FixedExchange {
            price_cents: 17_500,
            shares: 5,
        };

        let outcome = run_tick(&mut svc, None, &FixedOracle(Decision::Yes), &exchange)
            .await
            .unwrap();

        let TickOutcome::Bought(new_txn) = outcome else {
            panic!("expected Bought, got {outcome:?}");
        };
        assert_eq!(new_txn.shares, 5);
        assert_eq!(svc.fund_balance, money::from_cents(12_500));
        assert_eq!(svc.mode, ServiceMode::Sell);
        assert_eq!(svc.buy_count, 1);
    }

    #[tokio::test]
    async fn oracle_no_leaves_everything_alone() {
        let mut svc = service();
        let exchange = FixedExchange {
            price_cents: 17_500,
            shares: 5,
        };

        let outcome = run_tick(&mut svc, None, &FixedOracle(Decision::No), &exchange)
            .await
            .unwrap();

        assert!(matches!(outcome, TickOutcome::Idle));
        assert_eq!(svc.fund_balance, money::from_cents(100_000));
        assert_eq!(svc.mode, ServiceMode::Buy);
        assert_eq!(svc.buy_count, 0);
    }

    #[tokio::test]
    async fn sell_tick_closes_the_transaction() {
        let mut svc = service();
        svc.mode = ServiceMode::Sell;
        svc.shares_held = 5;
        svc.fund_balance = money::from_cents(12_500);
        let mut txn = open_transaction(5, 17_500);
        let exchange = FixedExchange {
            price_cents: 18_000,
            shares: 0,
        };

        let outcome = run_tick(
            &mut svc,
            Some(&mut txn),
            &FixedOracle(Decision::Yes),
            &exchange,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, TickOutcome::Sold));
        assert_eq!(txn.state, TransactionState::Closed);
        assert_eq!(txn.gain_loss, Some(money::from_cents(2_500)));
        assert_eq!(svc.fund_balance, money::from_cents(102_500));
        assert_eq!(svc.mode, ServiceMode::Buy);
        assert_eq!(svc.shares_held, 0);
    }

    #[tokio::test]
    async fn empty_sell_mode_recovers_to_buy() {
        let mut svc = service();
        svc.mode = ServiceMode::Sell;
        let exchange = FixedExchange {
            price_cents: 18_000,
            shares: 0,
        };

        let outcome = run_tick(&mut svc, None, &FixedOracle(Decision::Yes), &exchange)
            .await
            .unwrap();

        assert!(matches!(outcome, TickOutcome::Recovered));
        assert_eq!(svc.mode, ServiceMode::Buy);
    }

    #[tokio::test]
    async fn sell_mode_with_holdings_but_no_transaction_is_invalid_state() {
        let mut svc = service();
        svc.mode = ServiceMode::Sell;
        svc.shares_held = 5;
        let exchange = FixedExchange {
            price_cents: 18_000,
            shares: 0,
        };

        let err = run_tick(&mut svc, None, &FixedOracle(Decision::Yes), &exchange).await;
        assert!(matches!(err, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn declined_order_is_skipped_not_fatal() {
        let mut svc = service();

        let outcome = run_tick(&mut svc, None, &FixedOracle(Decision::Yes), &BrokenExchange)
            .await
            .unwrap();

        assert!(matches!(outcome, TickOutcome::Skipped(_)));
        // Ledger untouched, still in BUY mode for the next tick.
        assert_eq!(svc.fund_balance, money::from_cents(100_000));
        assert_eq!(svc.mode, ServiceMode::Buy);
    }

    fn registry_state() -> SharedState {
        use crate::config::Config;
        use crate::state::AppState;
        use std::sync::atomic::AtomicU64;
        use std::sync::Arc;
        use std::time::Duration;

        // connect_lazy never touches the network; good enough for registry
        // bookkeeping tests.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/daytrader")
            .unwrap();
        let (broadcast_tx, _) = tokio::sync::broadcast::channel(16);

        Arc::new(AppState {
            config: Arc::new(Config {
                bind_addr: "127.0.0.1:0".to_string(),
                database_url: "postgres://localhost/daytrader".to_string(),
                poll_interval: Duration::from_millis(5),
            }),
            pool,
            broadcast_tx,
            oracle: Arc::new(crate::engine::oracle::RandomOracle),
            exchange: Arc::new(crate::engine::execution::MockExchange),
            workers: Default::default(),
            tick_count: Arc::new(AtomicU64::new(0)),
            trade_count: Arc::new(AtomicU64::new(0)),
        })
    }

    #[tokio::test]
    async fn exited_worker_is_forgotten() {
        let state = registry_state();

        // A loop that already exited has dropped its receiver.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        drop(cancel_rx);
        state.register_worker(1, WorkerHandle { cancel_tx }).await;

        state.forget_worker(1).await;
        assert!(!state.cancel_worker(1).await, "stale entry was not removed");
    }

    #[tokio::test]
    async fn forget_leaves_a_live_replacement_alone() {
        let state = registry_state();

        let (cancel_tx, _cancel_rx) = watch::channel(false);
        state.register_worker(1, WorkerHandle { cancel_tx }).await;

        // A late deregistration from a previous worker under the same id must
        // not evict the live one.
        state.forget_worker(1).await;
        assert!(state.cancel_worker(1).await, "live worker was evicted");
    }

    #[tokio::test]
    async fn inactive_service_never_trades() {
        let mut svc = service();
        svc.state = ServiceState::Inactive;
        let exchange = FixedExchange {
            price_cents: 17_500,
            shares: 5,
        };

        let outcome = run_tick(&mut svc, None, &FixedOracle(Decision::Yes), &exchange)
            .await
            .unwrap();

        assert!(matches!(outcome, TickOutcome::Idle));
        assert_eq!(svc.buy_count, 0);
    }
}
