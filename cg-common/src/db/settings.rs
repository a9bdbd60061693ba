//! Key/value access to the `settings` table

use crate::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

/// Settings key holding the scheduler endpoint key
pub const SCHEDULER_KEY_SETTING: &str = "scheduler_key";
/// Settings key holding the last cleanup timestamp (storage format)
pub const LAST_CLEANUP_SETTING: &str = "last_cleanup_at";
/// Seconds between in-process scheduler passes
pub const SCHEDULER_INTERVAL_SETTING: &str = "scheduler_interval_secs";
/// Minimum seconds between two retention cleanups
pub const CLEANUP_INTERVAL_SETTING: &str = "cleanup_min_interval_secs";

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Integer setting, falling back to `default` when absent or unparseable
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    Ok(get_setting(pool, key)
        .await?
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default))
}

/// Return the stored scheduler key, generating and persisting one if absent
///
/// Keys are 40 random alphanumeric characters.
pub async fn load_or_create_scheduler_key(pool: &SqlitePool) -> Result<String> {
    if let Some(key) = get_setting(pool, SCHEDULER_KEY_SETTING).await? {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }

    let key: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();

    set_setting(pool, SCHEDULER_KEY_SETTING, &key).await?;
    info!("Generated new scheduler key");

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool_with_settings() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init::create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_set_then_get_overwrites() {
        let pool = pool_with_settings().await;
        assert_eq!(get_setting(&pool, "a").await.unwrap(), None);

        set_setting(&pool, "a", "1").await.unwrap();
        set_setting(&pool, "a", "2").await.unwrap();
        assert_eq!(get_setting(&pool, "a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_get_setting_i64_default() {
        let pool = pool_with_settings().await;
        set_setting(&pool, "n", "abc").await.unwrap();
        assert_eq!(get_setting_i64(&pool, "n", 7).await.unwrap(), 7);
        assert_eq!(get_setting_i64(&pool, "missing", 9).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_scheduler_key_is_stable() {
        let pool = pool_with_settings().await;
        let first = load_or_create_scheduler_key(&pool).await.unwrap();
        let second = load_or_create_scheduler_key(&pool).await.unwrap();
        assert_eq!(first.len(), 40);
        assert_eq!(first, second);
    }
}
