//! Shared fixtures for the cg-server integration tests
//!
//! In-memory database, stub recorder and transcriber, and request helpers
//! driving the router through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

use cg_common::config::ToolsConfig;
use cg_common::time::{now_local, to_db};
use cg_server::db::{segments, settings as settings_db};
use cg_server::services::recorder::{Recorder, RecordingContext};
use cg_server::services::session_paths;
use cg_server::services::transcriber::{TranscribeRequest, Transcriber};
use cg_server::services::transcription_worker::WorkerSettings;
use cg_server::services::SessionRuntime;
use cg_server::AppState;

pub const TEST_KEY: &str = "test-scheduler-key";

/// Single-connection in-memory pool with the full schema
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    cg_common::db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

/// Point the archive directory at `dir`
pub async fn use_archive_dir(pool: &SqlitePool, dir: &Path) {
    let mut settings = settings_db::load_transcription_settings(pool).await.unwrap();
    settings.base_archive_dir = dir.to_string_lossy().into_owned();
    settings.folder_structure = "flat".to_string();
    settings_db::save_transcription_settings(pool, &settings).await.unwrap();
}

/// Writes `segments` small WAV files, registering each, then waits for stop
pub struct StubRecorder {
    pub segments: u32,
    /// Return right after writing instead of waiting for the stop signal
    pub exit_when_done: bool,
}

#[async_trait]
impl Recorder for StubRecorder {
    async fn record(&self, ctx: &RecordingContext, stop: CancellationToken) -> anyhow::Result<u32> {
        let audio = session_paths::audio_dir(&ctx.session_dir);
        tokio::fs::create_dir_all(&audio).await?;

        for n in 1..=self.segments {
            let name = format!("seg_{:03}.wav", n);
            tokio::fs::write(audio.join(&name), vec![0u8; 1024]).await?;
            segments::register_completed_audio(&ctx.pool, ctx.session_id, &name, 1024, 60, &to_db(&now_local()))
                .await?;
        }

        if !self.exit_when_done {
            stop.cancelled().await;
        }
        Ok(self.segments)
    }
}

/// Writes a fixed transcript for every segment; optionally fails or hangs
pub struct StubTranscriber {
    pub text: String,
    pub fail: bool,
    pub hang: bool,
}

impl StubTranscriber {
    pub fn saying(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail: false,
            hang: false,
        }
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, request: &TranscribeRequest<'_>) -> anyhow::Result<String> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            anyhow::bail!("whisper exploded");
        }

        let stem = request
            .audio
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("segment");
        tokio::fs::write(request.output_dir.join(format!("{}.txt", stem)), &self.text).await?;
        Ok(self.text.clone())
    }
}

/// Runtime wired to the stubs with a fast-polling worker
pub fn stub_runtime(pool: &SqlitePool, recorder: StubRecorder, transcriber: StubTranscriber) -> SessionRuntime {
    SessionRuntime::with_components(
        pool.clone(),
        ToolsConfig::default(),
        Arc::new(recorder),
        Arc::new(transcriber),
        WorkerSettings {
            poll_interval: Duration::from_millis(20),
            max_idle_polls: 3,
        },
    )
}

pub fn app_with_runtime(runtime: SessionRuntime) -> (Router, AppState) {
    let state = AppState::new(runtime, TEST_KEY.to_string());
    (cg_server::build_router(state.clone()), state)
}

/// Router over a fresh database with stub components that do nothing
pub async fn test_app() -> (Router, SqlitePool) {
    let pool = test_pool().await;
    let runtime = stub_runtime(
        &pool,
        StubRecorder {
            segments: 0,
            exit_when_done: false,
        },
        StubTranscriber::saying(""),
    );
    let (app, _) = app_with_runtime(runtime);
    (app, pool)
}

/// Send a request and decode the JSON response (Null for empty bodies)
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// POST a urlencoded form body
pub async fn post_form(app: &Router, uri: &str, form: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::DELETE, uri, None).await
}

/// Poll `check` every 20 ms for up to 5 s
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Status text of a session row
pub async fn session_status(pool: &SqlitePool, session_id: i64) -> String {
    sqlx::query_scalar("SELECT status FROM transcription_sessions WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
