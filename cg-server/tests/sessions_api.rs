//! Integration tests for the session, settings and lifecycle endpoints

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{delete, get, post, put, session_status, test_app};

async fn create(app: &axum::Router, name: &str) -> i64 {
    let (status, body) = post(
        app,
        "/api/transcription/sessions",
        json!({
            "auction_name": name,
            "auction_url": "https://example.com/live/1",
            "scheduled_start": "2026-03-01T19:30",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["session_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = test_app().await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cardgraph");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_create_and_get_session() {
    let (app, _pool) = test_app().await;
    let id = create(&app, "Sunday Breaks").await;

    let (status, body) = get(&app, &format!("/api/transcription/sessions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["auction_name"], "Sunday Breaks");
    assert_eq!(body["session"]["status"], "scheduled");
    assert_eq!(body["session"]["scheduled_start"], "2026-03-01 19:30:00");
    assert_eq!(body["segment_length_min"], 15);
    assert_eq!(body["segments"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_session_validation() {
    let (app, _pool) = test_app().await;

    let (status, body) = post(
        &app,
        "/api/transcription/sessions",
        json!({ "auction_name": "x", "scheduled_start": "2026-03-01 19:30:00" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Missing required field: auction_url");

    let (status, body) = post(
        &app,
        "/api/transcription/sessions",
        json!({ "auction_name": "x", "auction_url": "u", "scheduled_start": "next tuesday" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid scheduled_start datetime");

    let (status, _) = post(
        &app,
        "/api/transcription/sessions",
        json!({
            "auction_name": "x",
            "auction_url": "u",
            "scheduled_start": "2026-03-01 19:30:00",
            "override_acquisition_mode": "carrier_pigeon",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_sessions_filters_and_pages() {
    let (app, pool) = test_app().await;
    for n in 0..3 {
        create(&app, &format!("Show {}", n)).await;
    }
    sqlx::query("UPDATE transcription_sessions SET status = 'complete' WHERE auction_name = 'Show 0'")
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = get(&app, "/api/transcription/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pages"], 1);

    let (_, body) = get(&app, "/api/transcription/sessions?status=complete").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["auction_name"], "Show 0");

    let (status, _) = get(&app, "/api/transcription/sessions?status=dancing").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_reschedules_stopped_session() {
    let (app, pool) = test_app().await;
    let id = create(&app, "Replay").await;
    sqlx::query(
        "UPDATE transcription_sessions SET status = 'stopped', stop_reason = 'user_cancel', \
         actual_start_time = '2026-03-01 19:30:00' WHERE session_id = ?",
    )
    .bind(id)
    .execute(&pool)
    .await
    .unwrap();

    let (status, body) = put(
        &app,
        &format!("/api/transcription/sessions/{}", id),
        json!({ "scheduled_start": "2026-03-08 19:30" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}", id)).await;
    assert_eq!(body["session"]["status"], "scheduled");
    assert_eq!(body["session"]["scheduled_start"], "2026-03-08 19:30:00");
    assert!(body["session"]["stop_reason"].is_null());
    assert!(body["session"]["actual_start_time"].is_null());
}

#[tokio::test]
async fn test_update_rejects_active_session() {
    let (app, pool) = test_app().await;
    let id = create(&app, "Live").await;
    sqlx::query("UPDATE transcription_sessions SET status = 'recording' WHERE session_id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, _) = put(
        &app,
        &format!("/api/transcription/sessions/{}", id),
        json!({ "auction_name": "Renamed" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_session() {
    let (app, _pool) = test_app().await;
    let id = create(&app, "Doomed").await;

    let (status, body) = delete(&app, &format!("/api/transcription/sessions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files_deleted"], 0);

    let (status, body) = get(&app, &format!("/api/transcription/sessions/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Session not found");
}

#[tokio::test]
async fn test_status_of_scheduled_session() {
    let (app, _pool) = test_app().await;
    let id = create(&app, "Later").await;

    let (status, body) = get(&app, &format!("/api/transcription/sessions/{}/status", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["elapsed_sec"], 0);
    assert!(body["active_seg_started"].is_null());
}

#[tokio::test]
async fn test_logs_level_filter() {
    let (app, pool) = test_app().await;
    let id = create(&app, "Chatty").await;
    for (level, event) in [("info", "a"), ("warning", "b"), ("info", "c")] {
        sqlx::query(
            "INSERT INTO transcription_logs (session_id, log_level, event_type, message) VALUES (?, ?, ?, 'm')",
        )
        .bind(id)
        .bind(level)
        .bind(event)
        .execute(&pool)
        .await
        .unwrap();
    }

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}/logs", id)).await;
    assert_eq!(body["total"], 3);

    let (_, body) = get(&app, &format!("/api/transcription/sessions/{}/logs?level=warning", id)).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["event_type"], "b");

    let (status, _) = get(&app, &format!("/api/transcription/sessions/{}/logs?level=loud", id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_requires_scheduled() {
    let (app, pool) = test_app().await;
    let id = create(&app, "Done").await;
    sqlx::query("UPDATE transcription_sessions SET status = 'complete' WHERE session_id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = post(&app, &format!("/api/transcription/sessions/{}/start", id), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Session must be in \"scheduled\" status to start"
    );

    let (status, _) = post(&app, "/api/transcription/sessions/999/start", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stop_and_cancel_without_running_task() {
    let (app, pool) = test_app().await;
    let stopped = create(&app, "Orphan stop").await;
    let cancelled = create(&app, "Orphan cancel").await;
    sqlx::query("UPDATE transcription_sessions SET status = 'recording'")
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = post(&app, &format!("/api/transcription/sessions/{}/stop", stopped), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stop_signaled");
    assert_eq!(session_status(&pool, stopped).await, "complete");

    let (status, body) = post(&app, &format!("/api/transcription/sessions/{}/cancel", cancelled), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancel_signaled");
    assert_eq!(session_status(&pool, cancelled).await, "stopped");

    let (status, _) = post(&app, &format!("/api/transcription/sessions/{}/stop", stopped), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transcribe_without_pending_segments() {
    let (app, _pool) = test_app().await;
    let id = create(&app, "Quiet").await;

    let (status, body) = post(&app, &format!("/api/transcription/sessions/{}/transcribe", id), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No pending segments to transcribe");
}

#[tokio::test]
async fn test_settings_round_trip() {
    let (app, _pool) = test_app().await;

    let (status, body) = put(
        &app,
        "/api/transcription/settings",
        json!({ "segment_length_minutes": 20, "whisper_model": "small" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Settings updated");
    assert_eq!(body["settings"]["segment_length_minutes"], 20);

    let (_, body) = get(&app, "/api/transcription/settings").await;
    assert_eq!(body["whisper_model"], "small");
    // Omitted fields fall back to defaults
    assert_eq!(body["max_cpu_cores"], 2);

    let (status, _) = put(
        &app,
        "/api/transcription/settings",
        json!({ "segment_length_minutes": 90 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_env_check_reports_every_tool() {
    let (app, _pool) = test_app().await;

    let (status, body) = get(&app, "/api/transcription/env-check").await;
    assert_eq!(status, StatusCode::OK);
    for tool in ["ffmpeg", "whisper", "docker"] {
        assert!(body[tool]["available"].is_boolean(), "{} missing", tool);
    }
    assert_eq!(body["disk"]["min_free_gb"], 5);
    assert!(body["cpu"]["available"].is_boolean());
}
