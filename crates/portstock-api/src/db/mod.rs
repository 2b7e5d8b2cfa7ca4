//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! table is loaded into memory on startup and every mutation is written
//! through. When absent, the application operates in in-memory-only mode
//! (suitable for development and testing).
//!
//! All statements are parameterized. The two per-terminal stock columns are
//! selected by matching on [`portstock_core::Terminal`] into fixed SQL
//! strings; no column name is ever built from input.

pub mod audit;
pub mod departments;
pub mod items;
pub mod movements;
pub mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = connect(&url).await?;
    migrate(&pool).await?;
    Ok(Some(pool))
}

/// Open a connection pool.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Whether the error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Wrap a row-to-record conversion failure.
pub(crate) fn decode_error(
    table: &'static str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    tracing::error!(table, error = %err, "invalid row in database");
    sqlx::Error::Decode(Box::new(err))
}
