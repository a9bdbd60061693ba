//! Parse run bookkeeping

use cg_common::time::{now_local, to_db};
use cg_common::Result;
use sqlx::SqlitePool;

use crate::models::ParseRun;

pub async fn create_run(pool: &SqlitePool, session_id: i64, run_by: Option<i64>) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO transcription_parse_runs (session_id, status, run_by) VALUES (?, 'running', ?)",
    )
    .bind(session_id)
    .bind(run_by)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn complete_run(
    pool: &SqlitePool,
    run_id: i64,
    total_records: i64,
    high_confidence: i64,
    low_confidence: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_parse_runs SET
            status = 'complete', total_records = ?, high_confidence = ?,
            low_confidence = ?, completed_at = ?
        WHERE run_id = ?
        "#,
    )
    .bind(total_records)
    .bind(high_confidence)
    .bind(low_confidence)
    .bind(to_db(&now_local()))
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fail_run(pool: &SqlitePool, run_id: i64, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE transcription_parse_runs SET status = 'error', error_message = ?, completed_at = ? WHERE run_id = ?",
    )
    .bind(message)
    .bind(to_db(&now_local()))
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_runs(pool: &SqlitePool, session_id: i64) -> Result<Vec<ParseRun>> {
    let rows = sqlx::query_as::<_, ParseRun>(
        r#"
        SELECT run_id, session_id, status, total_records, high_confidence, low_confidence,
               error_message, run_by, started_at, completed_at
        FROM transcription_parse_runs WHERE session_id = ?
        ORDER BY run_id DESC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn latest_complete_run(pool: &SqlitePool, session_id: i64) -> Result<Option<i64>> {
    let run_id = sqlx::query_scalar(
        r#"
        SELECT run_id FROM transcription_parse_runs
        WHERE session_id = ? AND status = 'complete'
        ORDER BY run_id DESC LIMIT 1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(run_id)
}
