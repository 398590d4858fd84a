//! # models
//!
//! Persistent data model: one [`TradingService`] row per symbol-tracking
//! session, owning N [`Transaction`] rows (one per buy/sell pairing).

pub mod service;
pub mod transaction;

pub use service::{ServiceMode, ServiceState, TradingService};
pub use transaction::{NewTransaction, Transaction, TransactionState};
