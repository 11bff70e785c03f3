//! Database layer
//!
//! This module provides database abstraction for the mediapress backend.
//! It supports:
//! - SQLite (default, for single-binary deployment and tests)
//! - PostgreSQL (production; full-text search and materialized views)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use mediapress::config::DatabaseConfig;
//! use mediapress::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, PostgresDatabase, SqliteDatabase,
};

/// Run the same query body against whichever backend the pool wraps.
///
/// The body is expanded once per driver, so it must only use SQL and bind
/// types that both SQLite and PostgreSQL accept (`$n` placeholders work on both).
///
/// ```ignore
/// let user = with_pool!(self.pool, |conn| {
///     sqlx::query_as::<_, User>("SELECT ... WHERE id = $1")
///         .bind(id)
///         .fetch_optional(conn)
///         .await
/// })
/// .context("Failed to get user")?;
/// ```
#[macro_export]
macro_rules! with_pool {
    ($pool:expr, |$conn:ident| $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => match $pool.as_sqlite() {
                Some($conn) => $body.map_err(::anyhow::Error::from),
                None => Err(::anyhow::anyhow!("SQLite pool unavailable")),
            },
            $crate::config::DatabaseDriver::Postgres => match $pool.as_postgres() {
                Some($conn) => $body.map_err(::anyhow::Error::from),
                None => Err(::anyhow::anyhow!("PostgreSQL pool unavailable")),
            },
        }
    };
}

/// Database constraint that rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    Unique,
    ForeignKey,
    Check,
}

/// Find the constraint violation behind a repository error, if any.
///
/// Repository errors carry context layers, so the whole chain is searched
/// for the originating `sqlx::Error`.
pub fn constraint_violation(err: &anyhow::Error) -> Option<ConstraintViolation> {
    err.chain().find_map(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => {
            if db_err.is_unique_violation() {
                Some(ConstraintViolation::Unique)
            } else if db_err.is_foreign_key_violation() {
                Some(ConstraintViolation::ForeignKey)
            } else if db_err.is_check_violation() {
                Some(ConstraintViolation::Check)
            } else {
                None
            }
        }
        _ => None,
    })
}
