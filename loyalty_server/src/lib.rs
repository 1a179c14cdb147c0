//! # Loyalty points server
//! This crate hosts the HTTP server for the loyalty points ledger. It is responsible for:
//! * Registering users and issuing session tokens.
//! * Accepting order uploads and handing them to the engine's reconciliation workers.
//! * Serving balances, order histories and withdrawals.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /api/user/register`, `POST /api/user/login`: account creation and login. Both set the session cookie.
//! * `POST /api/user/orders`, `GET /api/user/orders`: upload an order number, list uploaded orders.
//! * `GET /api/user/balance`, `POST /api/user/balance/withdraw`: the current balance, and spending it.
//! * `GET /api/user/withdrawals`: past withdrawals.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
