use std::env;

use log::*;

use crate::{helpers::luhn_check_digit, PostgresDatabase};

pub const TEST_DATABASE_URL: &str = "LPS_TEST_DATABASE_URL";

/// Connects to the database in `LPS_TEST_DATABASE_URL` and applies the migrations.
///
/// Returns `None` when the variable is not set, so that Postgres tests can be skipped on machines without a database.
pub async fn prepare_test_env() -> Option<PostgresDatabase> {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    let Ok(url) = env::var(TEST_DATABASE_URL) else {
        warn!("🚨️ {TEST_DATABASE_URL} is not set. Skipping Postgres test. The Postgres store is NOT being tested.");
        return None;
    };
    let db = PostgresDatabase::new_with_url(&url, 10).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    Some(db)
}

/// A login that will not collide with any other test sharing the database.
pub fn random_login() -> String {
    format!("user_{:016x}", rand::random::<u64>())
}

/// A random order number with a valid Luhn checksum.
pub fn random_order_number() -> String {
    let payload = format!("{}", rand::random::<u64>() % 1_000_000_000_000 + 1_000_000_000_000);
    let check = luhn_check_digit(&payload).expect("payload is all digits");
    format!("{payload}{check}")
}
