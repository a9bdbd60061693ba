//! End-to-end lifecycle runs against stub recorder and transcriber

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;

use cg_server::db::segments;
use cg_server::models::TranscriptionStatus;

use helpers::{
    app_with_runtime, get, post, session_status, stub_runtime, test_pool, use_archive_dir, wait_for, StubRecorder,
    StubTranscriber,
};

const SPOKEN: &str = "Next up we have a Mike Trout refractor numbered to ninety nine going to Dave";

async fn create(app: &axum::Router) -> i64 {
    let (status, body) = post(
        app,
        "/api/transcription/sessions",
        json!({
            "auction_name": "Friday Night Breaks",
            "auction_url": "https://example.com/live/42",
            "scheduled_start": "2026-03-06 20:00:00",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["session_id"].as_i64().unwrap()
}

async fn session_dir(pool: &SqlitePool, id: i64) -> PathBuf {
    let dir: Option<String> = sqlx::query_scalar("SELECT session_dir FROM transcription_sessions WHERE session_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap();
    PathBuf::from(dir.expect("session_dir set"))
}

async fn count_transcribed(pool: &SqlitePool, id: i64) -> usize {
    segments::list_segments(pool, id)
        .await
        .unwrap()
        .iter()
        .filter(|s| s.transcription_status == TranscriptionStatus::Complete)
        .count()
}

#[tokio::test]
async fn test_start_record_stop_completes_session() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 2,
            exit_when_done: false,
        },
        StubTranscriber::saying(SPOKEN),
    );
    let (app, state) = app_with_runtime(runtime);
    let id = create(&app).await;

    let (status, body) = post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "started");
    assert!(state.runtime.is_running(id).await);

    // Registered sessions cannot be started or transcribed twice
    let (status, _) = post(&app, &format!("/api/transcription/sessions/{}/transcribe", id), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert!(wait_for(|| async { count_transcribed(&pool, id).await == 2 }).await);

    let (status, body) = get(&app, &format!("/api/transcription/sessions/{}/status", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "recording");
    assert_eq!(body["segments"]["tx_complete"], 2);

    let (status, _) = post(&app, &format!("/api/transcription/sessions/{}/stop", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    assert!(wait_for(|| async { session_status(&pool, id).await == "complete" }).await);
    assert!(wait_for(|| async { !state.runtime.is_running(id).await }).await);

    let transcripts = session_dir(&pool, id).await.join("transcripts");
    assert!(transcripts.join("seg_001.txt").exists());
    assert!(transcripts.join("seg_002.txt").exists());

    let master = std::fs::read_dir(&transcripts)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .find(|n| n.ends_with("_FULL.txt"))
        .expect("master transcript written");
    let text = std::fs::read_to_string(transcripts.join(master)).unwrap();
    assert!(text.starts_with("# Transcription: Friday Night Breaks"));
    assert_eq!(text.matches(SPOKEN).count(), 2);

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}/logs?per_page=200", id)).await;
    let events: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["event_type"].as_str())
        .collect();
    assert!(events.contains(&"session_started"));
    assert!(events.contains(&"session_complete"));
}

#[tokio::test]
async fn test_recorder_exit_completes_session() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 1,
            exit_when_done: true,
        },
        StubTranscriber::saying(SPOKEN),
    );
    let (app, _state) = app_with_runtime(runtime);
    let id = create(&app).await;

    let (status, _) = post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    assert!(wait_for(|| async { session_status(&pool, id).await == "complete" }).await);
    assert_eq!(count_transcribed(&pool, id).await, 1);
}

#[tokio::test]
async fn test_cancel_stops_session_and_marks_segment() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 1,
            exit_when_done: false,
        },
        StubTranscriber {
            text: String::new(),
            fail: false,
            hang: true,
        },
    );
    let (app, state) = app_with_runtime(runtime);
    let id = create(&app).await;

    post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert!(
        wait_for(|| async {
            segments::list_segments(&pool, id)
                .await
                .unwrap()
                .iter()
                .any(|s| s.transcription_status == TranscriptionStatus::Transcribing)
        })
        .await
    );

    let (status, body) = post(&app, &format!("/api/transcription/sessions/{}/cancel", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancel_signaled");

    assert!(wait_for(|| async { session_status(&pool, id).await == "stopped" }).await);
    assert!(wait_for(|| async { !state.runtime.is_running(id).await }).await);

    let reason: Option<String> = sqlx::query_scalar("SELECT stop_reason FROM transcription_sessions WHERE session_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(reason.as_deref(), Some("user_cancel"));

    let segs = segments::list_segments(&pool, id).await.unwrap();
    assert_eq!(segs[0].transcription_status, TranscriptionStatus::Error);
    assert_eq!(segs[0].error_message.as_deref(), Some("Cancelled"));
}

#[tokio::test]
async fn test_failed_segments_are_requeued_by_transcribe() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;

    // First run: every transcription fails
    let failing = stub_runtime(
        &pool,
        StubRecorder {
            segments: 2,
            exit_when_done: true,
        },
        StubTranscriber {
            text: String::new(),
            fail: true,
            hang: false,
        },
    );
    let (app, _) = app_with_runtime(failing);
    let id = create(&app).await;
    post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert!(wait_for(|| async { session_status(&pool, id).await == "complete" }).await);

    let segs = segments::list_segments(&pool, id).await.unwrap();
    assert!(segs.iter().all(|s| s.transcription_status == TranscriptionStatus::Error));
    assert_eq!(segs[0].error_message.as_deref(), Some("whisper exploded"));

    // Second runtime over the same database transcribes the re-queued segments
    let working = stub_runtime(
        &pool,
        StubRecorder {
            segments: 0,
            exit_when_done: true,
        },
        StubTranscriber::saying(SPOKEN),
    );
    let (app, state) = app_with_runtime(working);
    let (status, body) = post(
        &app,
        &format!("/api/transcription/sessions/{}/transcribe", id),
        json!({ "model": "tiny" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["pending_count"], 2);

    assert!(wait_for(|| async { count_transcribed(&pool, id).await == 2 }).await);
    assert!(wait_for(|| async { !state.runtime.is_running(id).await }).await);
}

#[tokio::test]
async fn test_delete_running_session_removes_archive() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 1,
            exit_when_done: false,
        },
        StubTranscriber::saying(SPOKEN),
    );
    let (app, state) = app_with_runtime(runtime);
    let id = create(&app).await;

    post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert!(wait_for(|| async { count_transcribed(&pool, id).await == 1 }).await);
    let dir = session_dir(&pool, id).await;
    assert!(dir.exists());

    let (status, body) = helpers::delete(&app, &format!("/api/transcription/sessions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["files_deleted"].as_u64().unwrap() >= 3);
    assert!(!dir.exists());
    assert!(!state.runtime.is_running(id).await);

    let (status, _) = get(&app, &format!("/api/transcription/sessions/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn stop_reason(pool: &SqlitePool, id: i64) -> Option<String> {
    sqlx::query_scalar("SELECT stop_reason FROM transcription_sessions WHERE session_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_max_duration_completes_session() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let mut runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 1,
            exit_when_done: false,
        },
        StubTranscriber::saying(SPOKEN),
    );
    runtime.max_duration = Some(Duration::from_millis(300));
    let (app, state) = app_with_runtime(runtime);
    let id = create(&app).await;

    let (status, _) = post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    assert!(wait_for(|| async { session_status(&pool, id).await == "complete" }).await);
    assert!(wait_for(|| async { !state.runtime.is_running(id).await }).await);
    assert_eq!(stop_reason(&pool, id).await.as_deref(), Some("max_duration"));
    assert_eq!(count_transcribed(&pool, id).await, 1);

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}/logs?per_page=200", id)).await;
    let events: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["event_type"].as_str())
        .collect();
    assert!(events.contains(&"max_duration"));
    assert!(events.contains(&"processing"));
    assert!(events.contains(&"session_complete"));
}

#[tokio::test]
async fn test_manager_failure_marks_session_error() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    // A regular file where the archive directory should be
    let blocker = archive.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    use_archive_dir(&pool, &blocker).await;

    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 1,
            exit_when_done: true,
        },
        StubTranscriber::saying(SPOKEN),
    );
    let (app, state) = app_with_runtime(runtime);
    let id = create(&app).await;

    let (status, _) = post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    assert!(wait_for(|| async { session_status(&pool, id).await == "error" }).await);
    assert!(wait_for(|| async { !state.runtime.is_running(id).await }).await);

    let reason = stop_reason(&pool, id).await.expect("stop_reason set");
    assert!(!reason.is_empty());
    assert!(reason.chars().count() <= 100);

    let end_time: Option<String> = sqlx::query_scalar("SELECT end_time FROM transcription_sessions WHERE session_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(end_time.is_some());

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}/logs?level=error", id)).await;
    assert_eq!(body["data"][0]["event_type"], "manager_error");
}
