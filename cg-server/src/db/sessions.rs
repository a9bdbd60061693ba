//! Transcription session persistence

use cg_common::Result;
use sqlx::SqlitePool;

use crate::models::session::SessionOverrides;
use crate::models::{Session, SessionListItem, SessionStatus};
use crate::pagination::PageRequest;

pub(crate) const SESSION_COLUMNS: &str = r#"
    s.session_id, s.auction_name, s.auction_url, s.scheduled_start,
    s.actual_start_time, s.end_time, s.status, s.stop_reason, s.session_dir,
    s.total_segments, s.total_duration_sec, s.override_segment_length,
    s.override_silence_timeout, s.override_max_duration, s.override_cpu_limit,
    s.override_acquisition_mode, s.created_by, s.created_at
"#;

pub async fn get_session(pool: &SqlitePool, session_id: i64) -> Result<Option<Session>> {
    let sql = format!(
        "SELECT {} FROM transcription_sessions s WHERE s.session_id = ?",
        SESSION_COLUMNS
    );
    let session = sqlx::query_as::<_, Session>(&sql)
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

    Ok(session)
}

/// One page of sessions, newest scheduled first, with transcription counts
pub async fn list_sessions(
    pool: &SqlitePool,
    status: Option<SessionStatus>,
    page: &PageRequest,
) -> Result<(Vec<SessionListItem>, i64)> {
    let status = status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transcription_sessions WHERE (? IS NULL OR status = ?)",
    )
    .bind(status)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        r#"
        SELECT {},
            (SELECT COUNT(*) FROM transcription_segments g
              WHERE g.session_id = s.session_id AND g.transcription_status = 'complete') AS tx_complete,
            (SELECT COUNT(*) FROM transcription_segments g
              WHERE g.session_id = s.session_id AND g.transcription_status = 'pending') AS tx_pending,
            (SELECT COUNT(*) FROM transcription_segments g
              WHERE g.session_id = s.session_id AND g.transcription_status = 'transcribing') AS tx_active
        FROM transcription_sessions s
        WHERE (? IS NULL OR s.status = ?)
        ORDER BY s.scheduled_start DESC, s.session_id DESC
        LIMIT ? OFFSET ?
        "#,
        SESSION_COLUMNS
    );

    let rows = sqlx::query_as::<_, SessionListItem>(&sql)
        .bind(status)
        .bind(status)
        .bind(page.per_page)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

pub async fn create_session(
    pool: &SqlitePool,
    auction_name: &str,
    auction_url: &str,
    scheduled_start: &str,
    overrides: &SessionOverrides,
    created_by: Option<i64>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO transcription_sessions (
            auction_name, auction_url, scheduled_start,
            override_segment_length, override_silence_timeout, override_max_duration,
            override_cpu_limit, override_acquisition_mode, created_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auction_name)
    .bind(auction_url)
    .bind(scheduled_start)
    .bind(overrides.override_segment_length)
    .bind(overrides.override_silence_timeout)
    .bind(overrides.override_max_duration)
    .bind(overrides.override_cpu_limit)
    .bind(&overrides.override_acquisition_mode)
    .bind(created_by)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Apply an edit
///
/// Name, URL and start are kept when `None`; overrides are always replaced.
/// With `reschedule` the session returns to `scheduled` and its run fields
/// are cleared.
pub async fn update_session(
    pool: &SqlitePool,
    session_id: i64,
    auction_name: Option<&str>,
    auction_url: Option<&str>,
    scheduled_start: Option<&str>,
    overrides: &SessionOverrides,
    reschedule: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_sessions SET
            auction_name = COALESCE(?, auction_name),
            auction_url = COALESCE(?, auction_url),
            scheduled_start = COALESCE(?, scheduled_start),
            override_segment_length = ?,
            override_silence_timeout = ?,
            override_max_duration = ?,
            override_cpu_limit = ?,
            override_acquisition_mode = ?
        WHERE session_id = ?
        "#,
    )
    .bind(auction_name)
    .bind(auction_url)
    .bind(scheduled_start)
    .bind(overrides.override_segment_length)
    .bind(overrides.override_silence_timeout)
    .bind(overrides.override_max_duration)
    .bind(overrides.override_cpu_limit)
    .bind(&overrides.override_acquisition_mode)
    .bind(session_id)
    .execute(pool)
    .await?;

    if reschedule {
        sqlx::query(
            r#"
            UPDATE transcription_sessions SET
                status = 'scheduled', stop_reason = NULL,
                actual_start_time = NULL, end_time = NULL
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Delete a session and every row that belongs to it
pub async fn delete_session(pool: &SqlitePool, session_id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    for sql in [
        "DELETE FROM transcription_records WHERE session_id = ?",
        "DELETE FROM transcription_parse_runs WHERE session_id = ?",
        "DELETE FROM transcription_logs WHERE session_id = ?",
        "DELETE FROM transcription_segments WHERE session_id = ?",
        "DELETE FROM transcription_sessions WHERE session_id = ?",
    ] {
        sqlx::query(sql).bind(session_id).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn set_status(pool: &SqlitePool, session_id: i64, status: SessionStatus) -> Result<()> {
    sqlx::query("UPDATE transcription_sessions SET status = ? WHERE session_id = ?")
        .bind(status)
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// `scheduled → recording`; false when the session was not scheduled
pub async fn mark_recording(pool: &SqlitePool, session_id: i64, started_at: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transcription_sessions
        SET status = 'recording', actual_start_time = ?
        WHERE session_id = ? AND status = 'scheduled'
        "#,
    )
    .bind(started_at)
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Undo [`mark_recording`] for a session whose task never started
pub async fn revert_to_scheduled(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_sessions
        SET status = 'scheduled', actual_start_time = NULL
        WHERE session_id = ? AND status = 'recording'
        "#,
    )
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Move to a terminal state and stamp `end_time`
pub async fn finish_session(
    pool: &SqlitePool,
    session_id: i64,
    status: SessionStatus,
    stop_reason: Option<&str>,
    end_time: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_sessions
        SET status = ?, stop_reason = COALESCE(?, stop_reason), end_time = ?
        WHERE session_id = ?
        "#,
    )
    .bind(status)
    .bind(stop_reason)
    .bind(end_time)
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_session_dir(pool: &SqlitePool, session_id: i64, dir: &str) -> Result<()> {
    sqlx::query("UPDATE transcription_sessions SET session_dir = ? WHERE session_id = ?")
        .bind(dir)
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Recompute `total_segments` and `total_duration_sec` from the segment rows
pub async fn refresh_totals(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_sessions SET
            total_segments = (SELECT COUNT(*) FROM transcription_segments WHERE session_id = ?),
            total_duration_sec = (SELECT COALESCE(SUM(duration_seconds), 0)
                                  FROM transcription_segments WHERE session_id = ?)
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .bind(session_id)
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Scheduled sessions whose start time has passed, oldest first
pub async fn due_sessions(pool: &SqlitePool, now: &str) -> Result<Vec<Session>> {
    let sql = format!(
        r#"
        SELECT {} FROM transcription_sessions s
        WHERE s.status = 'scheduled' AND s.scheduled_start <= ?
        ORDER BY s.scheduled_start ASC, s.session_id ASC
        "#,
        SESSION_COLUMNS
    );
    let sessions = sqlx::query_as::<_, Session>(&sql)
        .bind(now)
        .fetch_all(pool)
        .await?;

    Ok(sessions)
}

/// Finished sessions that ended before `cutoff`
pub async fn expired_sessions(pool: &SqlitePool, cutoff: &str) -> Result<Vec<Session>> {
    let sql = format!(
        r#"
        SELECT {} FROM transcription_sessions s
        WHERE s.status IN ('complete', 'stopped', 'error')
          AND s.end_time IS NOT NULL AND s.end_time < ?
        ORDER BY s.end_time ASC
        "#,
        SESSION_COLUMNS
    );
    let sessions = sqlx::query_as::<_, Session>(&sql)
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

    Ok(sessions)
}
