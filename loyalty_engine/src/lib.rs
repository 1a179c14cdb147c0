//! Loyalty Engine
//!
//! The loyalty engine keeps the books for a loyalty points programme. Users upload the numbers of purchase orders; an
//! external accrual authority decides how many points each order is worth; users spend their points by withdrawing
//! them against new purchase order numbers.
//!
//! The library is divided into these sections:
//! 1. Ledger storage ([`mod@db`]). The [`LedgerStore`] trait is the transactional contract for users, orders and
//!    withdrawals. [`PostgresDatabase`] is the production backend and [`MemoryLedger`] an in-process one for tests.
//!    The data types used by the ledger are defined in [`db_types`] and are public.
//! 2. The accrual authority adapter ([`mod@accrual`]).
//! 3. Background reconciliation ([`mod@reconciliation`]). A fixed pool of workers fetches accruals for new orders and
//!    applies them to the ledger.
//! 4. The public API ([`OrderService`] and [`AccountApi`]) used by the HTTP server.
pub mod accrual;
mod db;
pub mod db_types;
pub mod helpers;
mod lps_api;
pub mod reconciliation;

#[cfg(all(feature = "postgres", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use accrual::{AccrualApi, AccrualClient, AccrualError, AccrualResult, AccrualStatus};
pub use db::{
    memory::MemoryLedger,
    traits::{LedgerError, LedgerStore},
};
#[cfg(feature = "postgres")]
pub use db::postgres::PostgresDatabase;
pub use lps_api::{
    accounts_api::AccountApi,
    errors::OrderServiceError,
    order_service::{OrderService, SubmitOrderResult},
};
pub use reconciliation::{DispatcherConfig, DispatcherHandle, ReconciliationDispatcher};
