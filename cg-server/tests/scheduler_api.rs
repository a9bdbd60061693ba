//! Scheduler tick and retention cleanup endpoints

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use cg_common::config::ToolsConfig;
use cg_common::db::settings::{set_setting, LAST_CLEANUP_SETTING};
use cg_server::db::settings as settings_db;
use cg_server::services::transcription_worker::WorkerSettings;
use cg_server::services::SessionRuntime;

use helpers::{
    app_with_runtime, get, post, post_form, session_status, stub_runtime, test_app, test_pool, use_archive_dir,
    wait_for, StubRecorder, StubTranscriber, TEST_KEY,
};

const TICK: &str = "/api/transcription/scheduler-tick";
const CLEANUP: &str = "/api/transcription/cleanup";

async fn create(app: &axum::Router, name: &str, start: &str, mode: Option<&str>) -> i64 {
    let (status, body) = post(
        app,
        "/api/transcription/sessions",
        json!({
            "auction_name": name,
            "auction_url": "https://example.com/live/3",
            "scheduled_start": start,
            "override_acquisition_mode": mode,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["session_id"].as_i64().unwrap()
}

async fn finished_long_ago(pool: &SqlitePool, id: i64) {
    sqlx::query(
        "UPDATE transcription_sessions SET status = 'complete', end_time = '2025-01-01 00:00:00' WHERE session_id = ?",
    )
    .bind(id)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_key_is_required() {
    let (app, _pool) = test_app().await;

    let (status, body) = post(&app, TICK, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Forbidden");

    let (status, _) = post(&app, TICK, json!({ "key": "guess" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post_form(&app, CLEANUP, "key=guess").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&app, TICK, json!({ "key": TEST_KEY })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Started 0 session(s)");

    let (status, body) = post_form(&app, TICK, &format!("key={}", TEST_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_tick_starts_due_sessions_only() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 1,
            exit_when_done: true,
        },
        StubTranscriber::saying("going once going twice sold to the chat"),
    );
    let (app, _state) = app_with_runtime(runtime);

    let due = create(&app, "Overdue", "2026-01-01 12:00:00", None).await;
    let future = create(&app, "Next year", "2099-01-01 12:00:00", None).await;

    let (status, body) = post(&app, TICK, json!({ "key": TEST_KEY })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Started 1 session(s)");
    assert_eq!(body["started"], json!([due]));

    assert!(wait_for(|| async { session_status(&pool, due).await == "complete" }).await);
    assert_eq!(session_status(&pool, future).await, "scheduled");

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}/logs", due)).await;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l["event_type"] == "auto_started"));
}

#[tokio::test]
async fn test_tick_skips_running_session() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 0,
            exit_when_done: false,
        },
        StubTranscriber::saying(""),
    );
    let (app, state) = app_with_runtime(runtime);
    let id = create(&app, "Held", "2026-01-01 12:00:00", None).await;

    // A registered task blocks the scheduler even while the row says scheduled
    let _handle = state.runtime.registry.register(id).await.unwrap();
    let (_, body) = post(&app, TICK, json!({ "key": TEST_KEY })).await;
    assert_eq!(body["skipped"], json!([id]));
    assert_eq!(session_status(&pool, id).await, "scheduled");
}

#[tokio::test]
async fn test_tick_fails_browser_session_without_docker() {
    let archive = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    use_archive_dir(&pool, archive.path()).await;
    let tools = ToolsConfig {
        docker: "/nonexistent/bin/docker".to_string(),
        ..ToolsConfig::default()
    };
    let runtime = SessionRuntime::with_components(
        pool.clone(),
        tools,
        Arc::new(StubRecorder {
            segments: 0,
            exit_when_done: true,
        }),
        Arc::new(StubTranscriber::saying("")),
        WorkerSettings {
            poll_interval: Duration::from_millis(20),
            max_idle_polls: 3,
        },
    );
    let (app, _state) = app_with_runtime(runtime);
    let id = create(&app, "Headless", "2026-01-01 12:00:00", Some("browser_automation")).await;

    let (_, body) = post(&app, TICK, json!({ "key": TEST_KEY })).await;
    assert_eq!(body["failed"], json!([id]));
    assert_eq!(session_status(&pool, id).await, "error");

    let reason: Option<String> = sqlx::query_scalar("SELECT stop_reason FROM transcription_sessions WHERE session_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(reason.as_deref(), Some("Docker not available"));
}

#[tokio::test]
async fn test_cleanup_removes_expired_sessions_then_throttles() {
    let (app, pool) = test_app().await;
    let old = create(&app, "Ancient", "2024-12-31 19:00:00", None).await;
    let recent = create(&app, "Recent", "2026-10-01 19:00:00", None).await;
    finished_long_ago(&pool, old).await;

    let (status, body) = post(&app, CLEANUP, json!({ "key": TEST_KEY })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "cleaned");
    assert_eq!(body["message"], "Cleanup complete");
    assert_eq!(body["cleaned"], 1);
    assert_eq!(body["retention_days"], 30);

    let (status, _) = get(&app, &format!("/api/transcription/sessions/{}", old)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(session_status(&pool, recent).await, "scheduled");

    let (_, body) = post(&app, CLEANUP, json!({ "key": TEST_KEY })).await;
    assert_eq!(body["outcome"], "throttled");
    assert_eq!(body["message"], "Skipped, last cleanup less than 1 hour ago");
}

#[tokio::test]
async fn test_cleanup_disabled_retention() {
    let (app, pool) = test_app().await;
    let old = create(&app, "Keep forever", "2024-12-31 19:00:00", None).await;
    finished_long_ago(&pool, old).await;

    let mut settings = settings_db::load_transcription_settings(&pool).await.unwrap();
    settings.audio_retention_days = 0;
    settings_db::save_transcription_settings(&pool, &settings).await.unwrap();
    set_setting(&pool, LAST_CLEANUP_SETTING, "2020-01-01 00:00:00").await.unwrap();

    let (_, body) = post_form(&app, CLEANUP, &format!("key={}", TEST_KEY)).await;
    assert_eq!(body["outcome"], "disabled");
    assert_eq!(session_status(&pool, old).await, "complete");
}

#[tokio::test]
async fn test_failed_launch_returns_session_to_scheduled() {
    let (app, state) = app_with_runtime(stub_runtime(
        &test_pool().await,
        StubRecorder {
            segments: 0,
            exit_when_done: true,
        },
        StubTranscriber::saying(""),
    ));
    let pool = state.db.clone();
    let id = create(&app, "Raced", "2026-01-01 12:00:00", None).await;

    // Another task grabbed the session after it was marked recording
    let _held = state.runtime.registry.register(id).await.unwrap();
    assert!(cg_server::db::sessions::mark_recording(&pool, id, "2026-01-01 12:00:05").await.unwrap());
    assert_eq!(session_status(&pool, id).await, "recording");

    assert!(state.runtime.launch_or_revert(id).await.is_err());
    assert_eq!(session_status(&pool, id).await, "scheduled");

    let started: Option<String> =
        sqlx::query_scalar("SELECT actual_start_time FROM transcription_sessions WHERE session_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(started.is_none());
}
