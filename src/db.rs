//! # db — PostgreSQL storage layer
//!
//! Runtime-bound `sqlx` queries over two tables: `trading_services` (one
//! mutable ledger row per service) and `transactions` (append-only buy/sell
//! pairings). Every tick mutation happens inside one `pool.begin()` …
//! `commit()` pair so a mid-tick failure rolls back to the previous committed
//! state; a unique partial index keeps at most one OPEN transaction per
//! service even under concurrent external writes.

use anyhow::Context;
use bigdecimal::BigDecimal;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tracing::info;

use crate::error::AppError;
use crate::models::{
    NewTransaction, ServiceMode, ServiceState, TradingService, Transaction, TransactionState,
};

// ─── Pool Init ────────────────────────────────────────────────────────────────

/// Create the PgPool and apply the embedded migration.
pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    pool.execute(include_str!("../migrations/001_init.sql"))
        .await
        .context("Failed to run migration 001_init.sql")?;

    info!("PostgreSQL connected and migrations applied");
    Ok(pool)
}

// ─── Trading Services ─────────────────────────────────────────────────────────

/// Insert a fresh ACTIVE/BUY service with `fund_balance == starting_balance`.
pub async fn create_service(
    pool: &PgPool,
    symbol: &str,
    starting_balance: &BigDecimal,
) -> Result<TradingService, AppError> {
    let service = sqlx::query_as::<_, TradingService>(
        "INSERT INTO trading_services (symbol, starting_balance, fund_balance)
         VALUES ($1, $2, $2)
         RETURNING *",
    )
    .bind(symbol)
    .bind(starting_balance)
    .fetch_one(pool)
    .await?;

    Ok(service)
}

pub async fn get_service(pool: &PgPool, id: i64) -> Result<Option<TradingService>, AppError> {
    let service = sqlx::query_as::<_, TradingService>(
        "SELECT * FROM trading_services WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(service)
}

pub async fn list_services(pool: &PgPool) -> Result<Vec<TradingService>, AppError> {
    let services = sqlx::query_as::<_, TradingService>(
        "SELECT * FROM trading_services ORDER BY started_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(services)
}

/// Services left ACTIVE in storage — used at boot to respawn their workers.
pub async fn list_active_services(pool: &PgPool) -> Result<Vec<TradingService>, AppError> {
    let services = sqlx::query_as::<_, TradingService>(
        "SELECT * FROM trading_services WHERE state = 'ACTIVE' ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(services)
}

pub async fn count_active_services(pool: &PgPool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM trading_services WHERE state = 'ACTIVE'",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Flip a service's lifecycle state, optionally forcing the mode (used by
/// start, which infers BUY/SELL from the current holdings).
pub async fn set_service_state(
    pool: &PgPool,
    id: i64,
    state: ServiceState,
    mode: Option<ServiceMode>,
) -> Result<TradingService, AppError> {
    let service = sqlx::query_as::<_, TradingService>(
        "UPDATE trading_services
         SET state = $2, mode = COALESCE($3, mode)
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(state)
    .bind(mode)
    .fetch_one(pool)
    .await?;

    Ok(service)
}

/// Persist a defensive mode flip outside a full tick commit.
pub async fn set_service_mode(
    pool: &PgPool,
    id: i64,
    mode: ServiceMode,
) -> Result<(), AppError> {
    sqlx::query("UPDATE trading_services SET mode = $2 WHERE id = $1")
        .bind(id)
        .bind(mode)
        .execute(pool)
        .await?;

    Ok(())
}

// ─── Tick Commits ─────────────────────────────────────────────────────────────

/// Commit one BUY tick: the updated ledger row and the newly opened
/// transaction land atomically.
pub async fn commit_buy(
    pool: &PgPool,
    service: &TradingService,
    new_txn: &NewTransaction,
) -> Result<Transaction, AppError> {
    let mut tx = pool.begin().await?;

    update_ledger(&mut tx, service).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        "INSERT INTO transactions (service_id, symbol, shares, purchase_price, purchased_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(new_txn.service_id)
    .bind(&new_txn.symbol)
    .bind(new_txn.shares)
    .bind(&new_txn.purchase_price)
    .bind(new_txn.purchased_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(transaction)
}

/// Commit one SELL tick: the updated ledger row and the closed transaction
/// (all three sale fields together) land atomically.
pub async fn commit_sell(
    pool: &PgPool,
    service: &TradingService,
    transaction: &Transaction,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    update_ledger(&mut tx, service).await?;

    sqlx::query(
        "UPDATE transactions
         SET state = $2, sale_price = $3, gain_loss = $4, sold_at = $5
         WHERE id = $1",
    )
    .bind(transaction.id)
    .bind(transaction.state)
    .bind(&transaction.sale_price)
    .bind(&transaction.gain_loss)
    .bind(transaction.sold_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn update_ledger(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    service: &TradingService,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE trading_services
         SET fund_balance = $2, total_gain_loss = $3, shares_held = $4,
             mode = $5, buy_count = $6, sell_count = $7
         WHERE id = $1",
    )
    .bind(service.id)
    .bind(&service.fund_balance)
    .bind(&service.total_gain_loss)
    .bind(service.shares_held)
    .bind(service.mode)
    .bind(service.buy_count)
    .bind(service.sell_count)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// The single open transaction for a service, if any. The partial unique
/// index guarantees there is never more than one.
pub async fn find_open_transaction(
    pool: &PgPool,
    service_id: i64,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions
         WHERE service_id = $1 AND state = 'OPEN'
         ORDER BY purchased_at DESC
         LIMIT 1",
    )
    .bind(service_id)
    .fetch_optional(pool)
    .await?;

    Ok(transaction)
}

/// Most-recent-first transaction listing with optional service and open/closed
/// filters.
pub async fn list_transactions(
    pool: &PgPool,
    service_id: Option<i64>,
    state: Option<TransactionState>,
    limit: i64,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions
         WHERE ($1::BIGINT IS NULL OR service_id = $1)
           AND ($2::transaction_state IS NULL OR state = $2)
         ORDER BY purchased_at DESC
         LIMIT $3",
    )
    .bind(service_id)
    .bind(state)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}
