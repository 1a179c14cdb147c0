mod db;

pub mod orders;
pub mod users;
pub mod withdrawals;

use std::env;

pub use db::PostgresDatabase;
use log::*;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::LedgerError;

const POSTGRES_DB_URL: &str = "postgres://postgres@localhost:5432/loyalty";

pub fn db_url() -> String {
    let result = env::var("LPS_DATABASE_URL").unwrap_or_else(|_| {
        warn!("🗃️ LPS_DATABASE_URL is not set. Using the default, {POSTGRES_DB_URL}.");
        POSTGRES_DB_URL.to_string()
    });
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<PgPool, LedgerError> {
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Maps a unique-constraint violation onto the conflict error that the calling query understands. Every other error
/// is a storage error.
pub(crate) fn on_unique_violation<F>(e: sqlx::Error, conflict: F) -> LedgerError
where F: FnOnce() -> LedgerError {
    if matches!(&e, sqlx::Error::Database(db_err) if db_err.is_unique_violation()) {
        conflict()
    } else {
        LedgerError::from(e)
    }
}
