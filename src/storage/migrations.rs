//! Database migration management.

use sqlx::{Pool, Sqlite};

use crate::error_handling::DatabaseError;

/// Runs SQLx migrations embedded from the `migrations/` directory.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
