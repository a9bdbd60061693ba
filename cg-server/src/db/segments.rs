//! Segment rows: recording progress and transcription queue

use cg_common::Result;
use sqlx::SqlitePool;

use crate::models::{Segment, SegmentSummary, TranscriptionStatus};

const SEGMENT_COLUMNS: &str = r#"
    segment_id, session_id, segment_number, filename_audio, filename_transcript,
    recording_status, transcription_status, transcription_progress,
    duration_seconds, file_size_bytes, started_at, completed_at, error_message
"#;

pub async fn list_segments(pool: &SqlitePool, session_id: i64) -> Result<Vec<Segment>> {
    let sql = format!(
        "SELECT {} FROM transcription_segments WHERE session_id = ? ORDER BY segment_number",
        SEGMENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, Segment>(&sql)
        .bind(session_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn get_segment(pool: &SqlitePool, segment_id: i64) -> Result<Option<Segment>> {
    let sql = format!(
        "SELECT {} FROM transcription_segments WHERE segment_id = ?",
        SEGMENT_COLUMNS
    );
    let row = sqlx::query_as::<_, Segment>(&sql)
        .bind(segment_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Segments whose transcript is complete, in recording order
pub async fn transcribed_segments(pool: &SqlitePool, session_id: i64) -> Result<Vec<Segment>> {
    let sql = format!(
        r#"
        SELECT {} FROM transcription_segments
        WHERE session_id = ? AND transcription_status = 'complete'
        ORDER BY segment_number
        "#,
        SEGMENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, Segment>(&sql)
        .bind(session_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn summarize(pool: &SqlitePool, session_id: i64) -> Result<SegmentSummary> {
    let summary = sqlx::query_as::<_, SegmentSummary>(
        r#"
        SELECT
            COUNT(*) AS total_segments,
            COALESCE(SUM(recording_status = 'complete'), 0) AS rec_complete,
            COALESCE(SUM(recording_status = 'recording'), 0) AS rec_active,
            COALESCE(SUM(transcription_status = 'complete'), 0) AS tx_complete,
            COALESCE(SUM(transcription_status = 'transcribing'), 0) AS tx_active,
            COALESCE(SUM(transcription_status = 'pending'), 0) AS tx_pending,
            COALESCE(SUM(duration_seconds), 0) AS total_duration,
            COALESCE(SUM(file_size_bytes), 0) AS total_size
        FROM transcription_segments
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

/// Start time of the segment currently being recorded
pub async fn active_segment_started(pool: &SqlitePool, session_id: i64) -> Result<Option<String>> {
    let started: Option<Option<String>> = sqlx::query_scalar(
        r#"
        SELECT started_at FROM transcription_segments
        WHERE session_id = ? AND recording_status = 'recording'
        ORDER BY segment_number DESC LIMIT 1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(started.flatten())
}

pub async fn next_segment_number(pool: &SqlitePool, session_id: i64) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(segment_number) FROM transcription_segments WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(max.unwrap_or(0) + 1)
}

/// Insert a segment whose recording has just connected
pub async fn insert_recording(
    pool: &SqlitePool,
    session_id: i64,
    segment_number: i64,
    filename_audio: &str,
    started_at: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO transcription_segments (
            session_id, segment_number, filename_audio, recording_status, started_at
        ) VALUES (?, ?, ?, 'recording', ?)
        "#,
    )
    .bind(session_id)
    .bind(segment_number)
    .bind(filename_audio)
    .bind(started_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn complete_recording(
    pool: &SqlitePool,
    segment_id: i64,
    duration_seconds: i64,
    file_size_bytes: i64,
    completed_at: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_segments SET
            recording_status = 'complete', duration_seconds = ?,
            file_size_bytes = ?, completed_at = ?
        WHERE segment_id = ?
        "#,
    )
    .bind(duration_seconds)
    .bind(file_size_bytes)
    .bind(completed_at)
    .bind(segment_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// A recording that produced no usable audio; never queued for transcription
pub async fn fail_recording(pool: &SqlitePool, segment_id: i64, message: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_segments SET
            recording_status = 'error', transcription_status = 'skipped', error_message = ?
        WHERE segment_id = ?
        "#,
    )
    .bind(message)
    .bind(segment_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Register an audio file produced outside the per-segment recorder
///
/// Returns false when the file is already known.
pub async fn register_completed_audio(
    pool: &SqlitePool,
    session_id: i64,
    filename_audio: &str,
    file_size_bytes: i64,
    duration_seconds: i64,
    timestamp: &str,
) -> Result<bool> {
    let known: Option<i64> = sqlx::query_scalar(
        "SELECT segment_id FROM transcription_segments WHERE session_id = ? AND filename_audio = ?",
    )
    .bind(session_id)
    .bind(filename_audio)
    .fetch_optional(pool)
    .await?;

    if known.is_some() {
        return Ok(false);
    }

    let number = next_segment_number(pool, session_id).await?;
    sqlx::query(
        r#"
        INSERT INTO transcription_segments (
            session_id, segment_number, filename_audio, recording_status,
            duration_seconds, file_size_bytes, started_at, completed_at
        ) VALUES (?, ?, ?, 'complete', ?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(number)
    .bind(filename_audio)
    .bind(duration_seconds)
    .bind(file_size_bytes)
    .bind(timestamp)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(true)
}

/// First pending segment whose audio is fully recorded
pub async fn next_pending(pool: &SqlitePool, session_id: i64) -> Result<Option<Segment>> {
    let sql = format!(
        r#"
        SELECT {} FROM transcription_segments
        WHERE session_id = ? AND transcription_status = 'pending' AND recording_status = 'complete'
        ORDER BY segment_number LIMIT 1
        "#,
        SEGMENT_COLUMNS
    );
    let row = sqlx::query_as::<_, Segment>(&sql)
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn count_pending(pool: &SqlitePool, session_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM transcription_segments
        WHERE session_id = ? AND transcription_status = 'pending' AND recording_status = 'complete'
        "#,
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Re-queue skipped and failed segments that have complete audio
pub async fn requeue_failed(pool: &SqlitePool, session_id: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transcription_segments
        SET transcription_status = 'pending', transcription_progress = 0, error_message = NULL
        WHERE session_id = ? AND recording_status = 'complete'
          AND transcription_status IN ('skipped', 'error')
        "#,
    )
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn mark_transcribing(pool: &SqlitePool, segment_id: i64) -> Result<()> {
    set_transcription_status(pool, segment_id, TranscriptionStatus::Transcribing, None).await
}

pub async fn mark_skipped(pool: &SqlitePool, segment_id: i64, message: Option<&str>) -> Result<()> {
    set_transcription_status(pool, segment_id, TranscriptionStatus::Skipped, message).await
}

pub async fn mark_transcription_error(pool: &SqlitePool, segment_id: i64, message: &str) -> Result<()> {
    set_transcription_status(pool, segment_id, TranscriptionStatus::Error, Some(message)).await
}

async fn set_transcription_status(
    pool: &SqlitePool,
    segment_id: i64,
    status: TranscriptionStatus,
    message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE transcription_segments SET transcription_status = ?, error_message = ? WHERE segment_id = ?",
    )
    .bind(status)
    .bind(message)
    .bind(segment_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn complete_transcription(
    pool: &SqlitePool,
    segment_id: i64,
    filename_transcript: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcription_segments SET
            transcription_status = 'complete', transcription_progress = 100,
            filename_transcript = ?, error_message = NULL
        WHERE segment_id = ?
        "#,
    )
    .bind(filename_transcript)
    .bind(segment_id)
    .execute(pool)
    .await?;

    Ok(())
}
