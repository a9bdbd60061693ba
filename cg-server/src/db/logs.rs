//! Session event log rows

use cg_common::Result;
use sqlx::SqlitePool;

use crate::models::{LogLevel, SessionLog};
use crate::pagination::PageRequest;

pub async fn insert_log(
    pool: &SqlitePool,
    session_id: i64,
    level: LogLevel,
    event_type: &str,
    message: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO transcription_logs (session_id, log_level, event_type, message) VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(level)
    .bind(event_type)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest `limit` entries
pub async fn recent_logs(pool: &SqlitePool, session_id: i64, limit: i64) -> Result<Vec<SessionLog>> {
    let rows = sqlx::query_as::<_, SessionLog>(
        r#"
        SELECT log_id, session_id, log_level, event_type, message, created_at
        FROM transcription_logs WHERE session_id = ?
        ORDER BY log_id DESC LIMIT ?
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_logs(
    pool: &SqlitePool,
    session_id: i64,
    level: Option<LogLevel>,
    page: &PageRequest,
) -> Result<(Vec<SessionLog>, i64)> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transcription_logs WHERE session_id = ? AND (? IS NULL OR log_level = ?)",
    )
    .bind(session_id)
    .bind(level)
    .bind(level)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, SessionLog>(
        r#"
        SELECT log_id, session_id, log_level, event_type, message, created_at
        FROM transcription_logs
        WHERE session_id = ? AND (? IS NULL OR log_level = ?)
        ORDER BY log_id DESC LIMIT ? OFFSET ?
        "#,
    )
    .bind(session_id)
    .bind(level)
    .bind(level)
    .bind(page.per_page)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}
