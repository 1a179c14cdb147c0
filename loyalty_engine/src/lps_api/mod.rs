//! # Loyalty engine public API
//!
//! The `lps_api` module exposes the programmatic API that the HTTP layer uses.
//!
//! * [`order_service`] orchestrates order submission, withdrawals and the user-facing order, balance and withdrawal
//!   histories. It hands new orders to the reconciliation dispatcher.
//! * [`accounts_api`] registers users and looks them up for authentication.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements [`crate::LedgerStore`]:
//!
//! ```rust,ignore
//! use loyalty_engine::{AccountApi, PostgresDatabase};
//! let db = PostgresDatabase::new_with_url(url, 25).await?;
//! let api = AccountApi::new(db);
//! let user = api.user_by_login("alice").await?;
//! ```

pub mod accounts_api;
pub mod errors;
pub mod order_service;
