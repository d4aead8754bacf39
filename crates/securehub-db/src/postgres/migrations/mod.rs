use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Arbitrary but fixed key for the Postgres advisory lock that serialises
/// migration runs so concurrent connections don't race.
const MIGRATION_LOCK_KEY: i64 = 0x7365_6375_7265_6875; // "securehu" as hex

pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(pool)
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?;

    let result = run_inner(pool).await;

    // Always release the advisory lock, even on error.
    let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(pool)
        .await;

    result
}

async fn run_inner(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Internal(e.to_string()))?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?;

    if current < 1 {
        info!("applying postgres migration v1 (attachments)");
        sqlx::raw_sql(include_str!("sql/V1__attachments.sql"))
            .execute(pool)
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?;
    }

    Ok(())
}
