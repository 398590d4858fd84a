//! # routes
//!
//! HTTP surface, one module per loop:
//! - `services`     — service lifecycle (create / start / stop / inspect)
//! - `transactions` — transaction history queries
//! - `monitor`      — WebSocket event stream + server stats + health

pub mod monitor;
pub mod services;
pub mod transactions;
