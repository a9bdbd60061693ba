//! Database creation, idempotent re-initialization and default rows

use cg_common::db::init_database;
use cg_common::db::settings::get_setting;
use sqlx::Row;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

#[tokio::test]
async fn test_init_database_creates_all_tables() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("nested").join("cardgraph.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables = table_names(&pool).await;
    for expected in [
        "settings",
        "schema_version",
        "players",
        "player_nicknames",
        "teams",
        "card_makers",
        "card_styles",
        "card_specialties",
        "transcription_settings",
        "transcription_sessions",
        "transcription_segments",
        "transcription_logs",
        "transcription_parse_runs",
        "transcription_records",
        "livestreams",
        "auction_line_items",
        "paypal_transactions",
        "paypal_allocations",
        "ebay_orders",
        "ebay_order_items",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_init_database_twice_is_safe() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("cardgraph.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO transcription_sessions (auction_name, auction_url, scheduled_start) VALUES ('A', 'http://x', '2026-01-01 10:00:00')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcription_sessions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let versions: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(versions, 2);
}

#[tokio::test]
async fn test_default_rows_present() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("cardgraph.db")).await.unwrap();

    let row = sqlx::query(
        "SELECT segment_length_minutes, whisper_model, acquisition_mode, audio_retention_days FROM transcription_settings WHERE setting_id = 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.get::<i64, _>("segment_length_minutes"), 15);
    assert_eq!(row.get::<String, _>("whisper_model"), "base");
    assert_eq!(row.get::<String, _>("acquisition_mode"), "direct_stream");
    assert_eq!(row.get::<i64, _>("audio_retention_days"), 30);

    assert_eq!(
        get_setting(&pool, "scheduler_interval_secs").await.unwrap().as_deref(),
        Some("60")
    );
}

#[tokio::test]
async fn test_session_delete_cascades_to_children() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("cardgraph.db")).await.unwrap();

    let session_id: i64 = sqlx::query_scalar(
        "INSERT INTO transcription_sessions (auction_name, auction_url, scheduled_start) VALUES ('A', 'http://x', '2026-01-01 10:00:00') RETURNING session_id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO transcription_logs (session_id, log_level, event_type, message) VALUES (?, 'INFO', 'created', 'x')")
        .bind(session_id)
        .execute(&pool)
        .await
        .unwrap();

    sqlx::query("DELETE FROM transcription_sessions WHERE session_id = ?")
        .bind(session_id)
        .execute(&pool)
        .await
        .unwrap();

    let logs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcription_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(logs, 0);
}
