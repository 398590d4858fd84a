//! # engine
//!
//! The trading cycle core: probabilistic BUY/SELL decisions ([`oracle`]),
//! simulated fills ([`execution`]), exact ledger arithmetic ([`ledger`]), and
//! the per-service polling worker that ties them together ([`cycle`]).

pub mod cycle;
pub mod execution;
pub mod ledger;
pub mod oracle;
