//! Database layer for data persistence and access.
//!
//! SQLx over PostgreSQL, split the usual way:
//!
//! - [`models`]: row structures matching table schemas, plus the typed
//!   create/update request structs services hand to the stores
//! - [`handlers`]: Postgres implementations of the store traits the
//!   services define at their seams
//! - [`errors`]: database error classification ([`errors::DbError`])
//!
//! Services never hold a pool directly; they take their store trait, which
//! keeps the whole service layer testable against in-memory fakes.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod errors;
pub mod handlers;
pub mod models;

/// Migrator for the subsystem's schema.
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to Postgres and bring the schema up to date.
///
/// The acquire timeout bounds every query in the subsystem: a saturated pool
/// surfaces as an explicit error instead of an indefinite stall.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    migrator().run(&pool).await?;
    Ok(pool)
}
