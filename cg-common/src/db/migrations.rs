//! Versioned schema migrations
//!
//! Tables are created in their latest shape by `init`, so on a fresh database
//! every migration is a no-op apart from recording its version. Databases
//! created by older builds are brought forward here.
//!
//! Migrations must stay idempotent: check before altering.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Increment when adding a migration
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Latest applied version, 0 when nothing has been recorded
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply every migration newer than the recorded version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// v1: lookup indexes for the hot foreign keys
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_segments_session ON transcription_segments(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_logs_session ON transcription_logs(session_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_records_run ON transcription_records(run_id)",
        "CREATE INDEX IF NOT EXISTS idx_records_session ON transcription_records(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_status ON transcription_sessions(status, scheduled_start)",
        "CREATE INDEX IF NOT EXISTS idx_allocations_txn ON paypal_allocations(pp_transaction_id)",
        "CREATE INDEX IF NOT EXISTS idx_line_items_order ON auction_line_items(order_id)",
        "CREATE INDEX IF NOT EXISTS idx_ebay_items_order ON ebay_order_items(ebay_order_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Migration v1: created lookup indexes");
    Ok(())
}

/// v2: eBay orders gained a `source` column (which mailbox/export the row
/// came from); older databases lack it
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('ebay_orders') WHERE name = 'source'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query("ALTER TABLE ebay_orders ADD COLUMN source TEXT")
            .execute(pool)
            .await?;
        info!("Migration v2: added source to ebay_orders");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schema_version_zero_without_table() {
        let pool = memory_pool().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migrate_v2_adds_missing_column() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE ebay_orders (ebay_order_id INTEGER PRIMARY KEY, order_number TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        migrate_v2(&pool).await.unwrap();
        // Second run must be a no-op
        migrate_v2(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('ebay_orders') WHERE name = 'source'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
