//! Parsing and card record endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::actor::Actor;
use super::sessions::load_session;
use crate::db::{parse_runs, records};
use crate::models::de;
use crate::models::{ParseRun, RecordRow, RecordUpdate, SegmentText};
use crate::services::session_parser::{self, ParseSummary};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RecordListQuery {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub run_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    /// Run the records belong to; `None` when the session was never parsed
    pub run_id: Option<i64>,
    pub total: usize,
    pub records: Vec<RecordRow>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptText {
    pub segments: Vec<SegmentText>,
    pub total_chars: usize,
}

/// POST /api/transcription/sessions/{id}/parse handler
///
/// **Response:** `{"run_id", "total_records", "high_confidence", "low_confidence"}`
///
/// **Errors:**
/// - 404 Not Found
/// - 400 Bad Request: no completed transcripts, or too little text
/// - 500 Internal Server Error: extraction failed (the run is marked `error`)
pub async fn parse_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    actor: Actor,
) -> ApiResult<Json<ParseSummary>> {
    let summary = session_parser::parse_session(&state.db, id, actor.0).await?;
    Ok(Json(summary))
}

/// GET /api/transcription/sessions/{id}/records handler
///
/// **Query:** `run_id` (default: latest complete run), `min_confidence`
pub async fn list_records(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RecordListQuery>,
) -> ApiResult<Json<RecordList>> {
    load_session(&state.db, id).await?;

    let run_id = match query.run_id {
        Some(run_id) => Some(run_id),
        None => parse_runs::latest_complete_run(&state.db, id).await?,
    };
    let rows = match run_id {
        Some(run_id) => records::list_records(&state.db, run_id, query.min_confidence).await?,
        None => Vec::new(),
    };

    Ok(Json(RecordList {
        run_id,
        total: rows.len(),
        records: rows,
    }))
}

/// PUT /api/transcription/records/{id} handler
///
/// **Request:** any of the reference ids, `raw_parallel`, `raw_card_number`,
/// `lot_number`, the flags, `is_verified` and `notes`
/// **Response:** `{"success": true}`
///
/// **Errors:**
/// - 400 Bad Request: no updatable field in the body
/// - 404 Not Found
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    actor: Actor,
    Json(update): Json<RecordUpdate>,
) -> ApiResult<Json<Value>> {
    if update.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    if !records::update_record(&state.db, id, &update, actor.0).await? {
        return Err(ApiError::not_found("Record not found"));
    }
    info!(record_id = id, "Record updated");

    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/transcription/records/{id} handler
pub async fn delete_record(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    if !records::delete_record(&state.db, id).await? {
        return Err(ApiError::not_found("Record not found"));
    }
    Ok(Json(json!({ "success": true })))
}

/// GET /api/transcription/sessions/{id}/transcript-text handler
///
/// **Response:** per-segment transcript text and the combined length
pub async fn transcript_text(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TranscriptText>> {
    let segments = session_parser::transcript_texts(&state.db, id).await?;
    let total_chars = segments.iter().map(|s| s.text.chars().count()).sum();

    Ok(Json(TranscriptText { segments, total_chars }))
}

/// GET /api/transcription/sessions/{id}/parse-runs handler
pub async fn list_parse_runs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<ParseRun>>> {
    load_session(&state.db, id).await?;
    Ok(Json(parse_runs::list_runs(&state.db, id).await?))
}

/// Build record routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transcription/sessions/:id/parse", post(parse_session))
        .route("/api/transcription/sessions/:id/records", get(list_records))
        .route(
            "/api/transcription/sessions/:id/transcript-text",
            get(transcript_text),
        )
        .route("/api/transcription/sessions/:id/parse-runs", get(list_parse_runs))
        .route(
            "/api/transcription/records/:id",
            put(update_record).delete(delete_record),
        )
}
