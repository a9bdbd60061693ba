//! Session lifecycle endpoints: start, stop, cancel and manual transcription

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use cg_common::time::{now_local, to_db};

use super::sessions::load_session;
use crate::db::{segments, sessions, settings as settings_db};
use crate::models::{AcquisitionMode, SessionStatus};
use crate::services::session_events;
use crate::services::transcriber::choose_model;
use crate::{ApiError, ApiResult, AppState};

/// Body of `POST /sessions/{id}/transcribe`
#[derive(Debug, Default, Deserialize)]
pub struct TranscribeRequestBody {
    #[serde(default)]
    pub model: Option<String>,
}

/// POST /api/transcription/sessions/{id}/start handler
///
/// **Response:** `{"status": "started"}`, or `{"status": "queued"}` for
/// browser-automation sessions
///
/// **Errors:**
/// - 404 Not Found
/// - 400 Bad Request: session is not `scheduled`
/// - 409 Conflict: a task is already registered for the session
pub async fn start_session(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let session = load_session(&state.db, id).await?;
    if session.status != SessionStatus::Scheduled {
        return Err(ApiError::bad_request(
            "Session must be in \"scheduled\" status to start",
        ));
    }
    if state.runtime.is_running(id).await {
        return Err(ApiError::Conflict("Session already running".to_string()));
    }

    let settings = settings_db::load_transcription_settings(&state.db).await?;
    let mode = session.acquisition_mode(&settings);

    if !sessions::mark_recording(&state.db, id, &to_db(&now_local())).await? {
        return Err(ApiError::bad_request(
            "Session must be in \"scheduled\" status to start",
        ));
    }

    if let Err(e) = state.runtime.launch_or_revert(id).await {
        state.record_error(format!("Session {} launch failed: {}", id, e)).await;
        return Err(e.into());
    }

    let body = match mode {
        AcquisitionMode::BrowserAutomation => {
            session_events::info(
                &state.db,
                id,
                "session_queued",
                "Session queued for browser_automation start",
            )
            .await;
            json!({ "status": "queued", "message": "Browser automation session queued" })
        }
        AcquisitionMode::DirectStream => {
            session_events::info(&state.db, id, "session_started", "Recording session started").await;
            json!({ "status": "started" })
        }
    };

    Ok(Json(body))
}

/// POST /api/transcription/sessions/{id}/stop handler
///
/// Recording ends; queued segments are still transcribed. A session left
/// active without a running task is completed directly.
///
/// **Response:** `{"status": "stop_signaled"}`
///
/// **Errors:**
/// - 400 Bad Request: session is not recording or processing
pub async fn stop_session(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let session = load_session(&state.db, id).await?;
    if !session.status.is_active() {
        return Err(ApiError::bad_request(
            "Session must be recording or processing to stop",
        ));
    }

    session_events::info(
        &state.db,
        id,
        "stop_requested",
        "User requested stop, recording will stop and transcription continues",
    )
    .await;

    if !state.runtime.signal_stop(id).await {
        info!(session_id = id, "No running task; completing session");
        sessions::finish_session(&state.db, id, SessionStatus::Complete, None, &to_db(&now_local())).await?;
    }

    Ok(Json(json!({ "status": "stop_signaled" })))
}

/// POST /api/transcription/sessions/{id}/cancel handler
///
/// Recording and transcription both end immediately.
///
/// **Response:** `{"status": "cancel_signaled"}`
///
/// **Errors:**
/// - 400 Bad Request: session is not recording or processing
pub async fn cancel_session(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let session = load_session(&state.db, id).await?;
    if !session.status.is_active() {
        return Err(ApiError::bad_request(
            "Session must be recording or processing to cancel",
        ));
    }

    session_events::warning(
        &state.db,
        id,
        "cancel_requested",
        "User requested cancel, all processes will stop",
    )
    .await;

    if !state.runtime.signal_cancel(id).await {
        info!(session_id = id, "No running task; marking session stopped");
        sessions::finish_session(
            &state.db,
            id,
            SessionStatus::Stopped,
            Some("user_cancel"),
            &to_db(&now_local()),
        )
        .await?;
    }

    Ok(Json(json!({ "status": "cancel_signaled" })))
}

/// POST /api/transcription/sessions/{id}/transcribe handler
///
/// Re-queues skipped and failed segments and launches a worker.
///
/// **Request:** `{"model": "small"}` (optional)
/// **Response:** `{"ok": true, "pending_count", "model", "message"}`
///
/// **Errors:**
/// - 404 Not Found
/// - 409 Conflict: a task is already registered for the session
/// - 400 Bad Request: nothing pending, or no archive directory yet
pub async fn transcribe_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<TranscribeRequestBody>>,
) -> ApiResult<Json<Value>> {
    load_session(&state.db, id).await?;
    if state.runtime.is_running(id).await {
        return Err(ApiError::Conflict(
            "Transcription already in progress for this session".to_string(),
        ));
    }

    let requeued = segments::requeue_failed(&state.db, id).await?;
    let pending = segments::count_pending(&state.db, id).await?;
    if pending == 0 {
        return Err(ApiError::bad_request("No pending segments to transcribe"));
    }

    let requested = body.and_then(|Json(b)| b.model);
    let settings = settings_db::load_transcription_settings(&state.db).await?;
    let model = choose_model(
        requested.as_deref(),
        &settings.whisper_model,
        state.runtime.tools.whisper_model_dir.as_deref(),
    );

    state.runtime.launch_worker(id, model.clone()).await?;
    session_events::info(
        &state.db,
        id,
        "transcribe_triggered",
        &format!(
            "Manual transcription triggered ({} pending segments, model: {})",
            pending, model
        ),
    )
    .await;
    info!(session_id = id, pending, requeued, model = %model, "Transcription worker launched");

    Ok(Json(json!({
        "ok": true,
        "pending_count": pending,
        "model": model,
        "message": format!("Transcription started for {} pending segment(s)", pending),
    })))
}

/// Build lifecycle routes
pub fn lifecycle_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transcription/sessions/:id/start", post(start_session))
        .route("/api/transcription/sessions/:id/stop", post(stop_session))
        .route("/api/transcription/sessions/:id/cancel", post(cancel_session))
        .route("/api/transcription/sessions/:id/transcribe", post(transcribe_session))
}
