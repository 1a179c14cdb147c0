//! # Ledger storage contract
//!
//! This module defines the interface that ledger *backends* must implement to be used by the loyalty engine.
//!
//! * [`LedgerStore`] owns users, orders, and withdrawals. It is the only component allowed to change a balance or an
//!   order status, and it does so transactionally.
//! * [`LedgerError`] is the failure taxonomy every backend reports in.
//!
//! Two backends ship with the engine: [`crate::PostgresDatabase`] for production and [`crate::MemoryLedger`], which
//! honours the same contract in process and is used for deterministic tests.
mod ledger_store;

pub use ledger_store::{LedgerError, LedgerStore};
