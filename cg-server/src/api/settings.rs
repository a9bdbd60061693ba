//! Transcription settings and environment check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::actor::Actor;
use crate::db::settings as settings_db;
use crate::models::settings::SettingsUpdate;
use crate::models::TranscriptionSettings;
use crate::services::env_check::{self, EnvReport};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/transcription/settings handler
///
/// **Response:** the global settings row
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<TranscriptionSettings>> {
    Ok(Json(settings_db::load_transcription_settings(&state.db).await?))
}

/// PUT /api/transcription/settings handler
///
/// **Request:** any subset of the settings fields
/// **Response:** `{"message": "Settings updated", "settings": {...}}`
///
/// The row is replaced as a whole; fields left out return to their defaults.
///
/// **Errors:**
/// - 400 Bad Request: a value outside its range or not one of the accepted values
pub async fn update_settings(
    State(state): State<AppState>,
    actor: Actor,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Value>> {
    let settings = update.into_settings(actor.0).map_err(ApiError::BadRequest)?;
    settings_db::save_transcription_settings(&state.db, &settings).await?;
    info!(updated_by = ?actor.0, "Transcription settings updated");

    let saved = settings_db::load_transcription_settings(&state.db).await?;
    Ok(Json(json!({ "message": "Settings updated", "settings": saved })))
}

/// GET /api/transcription/env-check handler
///
/// **Response:** availability of ffmpeg, whisper, docker and the recorder
/// image, free space at the archive directory and the CPU count
pub async fn env_check(State(state): State<AppState>) -> ApiResult<Json<EnvReport>> {
    let settings = settings_db::load_transcription_settings(&state.db).await?;
    let report = env_check::check_environment(
        &state.runtime.tools,
        &settings.base_archive_dir,
        settings.min_free_disk_gb,
    )
    .await;
    Ok(Json(report))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/transcription/settings",
            get(get_settings).put(update_settings),
        )
        .route("/api/transcription/env-check", get(env_check))
}
