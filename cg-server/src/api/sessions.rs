//! Transcription session endpoints: list, create, detail, edit, delete,
//! status polling and the event log

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

use cg_common::time::{elapsed_seconds, now_local, parse_datetime, to_db};

use super::actor::Actor;
use crate::db::{logs, segments, sessions, settings as settings_db};
use crate::models::de;
use crate::models::session::{CreateSessionRequest, UpdateSessionRequest};
use crate::models::{LogLevel, Segment, SegmentSummary, Session, SessionListItem, SessionLog, SessionStatus};
use crate::pagination::{PageRequest, LOG_PAGES, SESSION_PAGES};
use crate::{ApiError, ApiResult, AppState};

/// Latest log entries included in the session detail
const DETAIL_LOG_LIMIT: i64 = 50;

/// Fetch a session or fail with 404
pub(crate) async fn load_session(db: &SqlitePool, session_id: i64) -> ApiResult<Session> {
    sessions::get_session(db, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))
}

/// Paginated list response shared by the list endpoints
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: &PageRequest) -> Self {
        Self {
            data,
            total,
            page: page.page,
            pages: page.total_pages(total),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionListQuery {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub per_page: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogListQuery {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub per_page: Option<i64>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub segments: Vec<Segment>,
    pub logs: Vec<SessionLog>,
    pub segment_length_min: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: i64,
    pub status: SessionStatus,
    pub elapsed_sec: i64,
    pub segments: SegmentSummary,
    pub segment_length_min: i64,
    pub active_seg_started: Option<String>,
    pub server_time: String,
}

/// Trimmed value of a required text field
fn required<'a>(value: &'a Option<String>, field: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {}", field)))
}

fn parse_start(value: &str) -> ApiResult<String> {
    parse_datetime(value)
        .map(|dt| to_db(&dt))
        .ok_or_else(|| ApiError::bad_request("Invalid scheduled_start datetime"))
}

/// GET /api/transcription/sessions handler
///
/// **Query:** `page`, `per_page` (10-50, default 20), `status`
/// **Response:** `{"data": [...], "total", "page", "pages"}`; each row
/// carries `tx_complete`, `tx_pending` and `tx_active`
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<Json<PageResponse<SessionListItem>>> {
    let page = PageRequest::new(query.page, query.per_page, SESSION_PAGES);
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            SessionStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };

    let (rows, total) = sessions::list_sessions(&state.db, status, &page).await?;
    Ok(Json(PageResponse::new(rows, total, &page)))
}

/// POST /api/transcription/sessions handler
///
/// **Request:** `{"auction_name", "auction_url", "scheduled_start", "override_*"...}`
/// **Response:** 201 `{"session_id": N}`
///
/// **Errors:**
/// - 400 Bad Request: missing field, unparseable start, unknown acquisition mode
pub async fn create_session(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let auction_name = required(&body.auction_name, "auction_name")?;
    let auction_url = required(&body.auction_url, "auction_url")?;
    let scheduled_start = parse_start(required(&body.scheduled_start, "scheduled_start")?)?;
    let overrides = body.overrides.clone().normalized().map_err(ApiError::BadRequest)?;

    let session_id = sessions::create_session(
        &state.db,
        auction_name,
        auction_url,
        &scheduled_start,
        &overrides,
        actor.0,
    )
    .await?;
    info!(session_id, scheduled_start = %scheduled_start, "Session created");

    Ok((StatusCode::CREATED, Json(json!({ "session_id": session_id }))))
}

/// GET /api/transcription/sessions/{id} handler
///
/// **Response:** session, segments by number, the latest 50 log entries and
/// the effective segment length
pub async fn get_session(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<SessionDetail>> {
    let session = load_session(&state.db, id).await?;
    let settings = settings_db::load_transcription_settings(&state.db).await?;

    Ok(Json(SessionDetail {
        segment_length_min: session.effective_segment_length(&settings),
        segments: segments::list_segments(&state.db, id).await?,
        logs: logs::recent_logs(&state.db, id, DETAIL_LOG_LIMIT).await?,
        session,
    }))
}

/// PUT /api/transcription/sessions/{id} handler
///
/// **Request:** any of `auction_name`, `auction_url`, `scheduled_start`;
/// the override fields are always replaced
/// **Response:** `{"success": true}`
///
/// A new start time on an `error` or `stopped` session puts it back to
/// `scheduled` and clears its previous run.
///
/// **Errors:**
/// - 404 Not Found
/// - 400 Bad Request: session recording or processing, bad start time
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateSessionRequest>,
) -> ApiResult<Json<Value>> {
    let session = load_session(&state.db, id).await?;
    if !session.status.is_editable() {
        return Err(ApiError::bad_request(
            "Cannot edit a session that is currently recording or processing",
        ));
    }

    let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let scheduled_start = match present(&body.scheduled_start) {
        Some(start) => Some(parse_start(&start)?),
        None => None,
    };
    let overrides = body.overrides.clone().normalized().map_err(ApiError::BadRequest)?;
    let reschedule = scheduled_start.is_some()
        && matches!(session.status, SessionStatus::Error | SessionStatus::Stopped);

    sessions::update_session(
        &state.db,
        id,
        present(&body.auction_name).as_deref(),
        present(&body.auction_url).as_deref(),
        scheduled_start.as_deref(),
        &overrides,
        reschedule,
    )
    .await?;
    info!(session_id = id, reschedule, "Session updated");

    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/transcription/sessions/{id} handler
///
/// Cancels a running session, removes its archive directory and deletes
/// its segments, logs, parse runs and records.
///
/// **Response:** `{"success": true, "files_deleted": N}`
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let session = load_session(&state.db, id).await?;
    let files_deleted = state.runtime.purge_session(&session).await?;

    Ok(Json(json!({ "success": true, "files_deleted": files_deleted })))
}

/// GET /api/transcription/sessions/{id}/status handler
///
/// Lightweight poll: elapsed seconds, segment counts and the start of the
/// segment being recorded.
pub async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SessionStatusResponse>> {
    let session = load_session(&state.db, id).await?;
    let settings = settings_db::load_transcription_settings(&state.db).await?;
    let now = now_local();

    let elapsed_sec = match session.actual_start_time.as_deref().and_then(parse_datetime) {
        Some(start) => {
            let end = session
                .end_time
                .as_deref()
                .and_then(parse_datetime)
                .unwrap_or(now);
            elapsed_seconds(&start, &end)
        }
        None => 0,
    };

    Ok(Json(SessionStatusResponse {
        session_id: session.session_id,
        status: session.status,
        elapsed_sec,
        segments: segments::summarize(&state.db, id).await?,
        segment_length_min: session.effective_segment_length(&settings),
        active_seg_started: segments::active_segment_started(&state.db, id).await?,
        server_time: to_db(&now),
    }))
}

/// GET /api/transcription/sessions/{id}/logs handler
///
/// **Query:** `page`, `per_page` (20-100, default 50), `level`
/// **Response:** newest entries first
pub async fn session_logs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<LogListQuery>,
) -> ApiResult<Json<PageResponse<SessionLog>>> {
    let page = PageRequest::new(query.page, query.per_page, LOG_PAGES);
    let level = match query.level.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(l) => Some(LogLevel::parse(l).ok_or_else(|| ApiError::BadRequest(format!("Unknown log level: {}", l)))?),
        None => None,
    };

    let (rows, total) = logs::list_logs(&state.db, id, level, &page).await?;
    Ok(Json(PageResponse::new(rows, total, &page)))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/transcription/sessions",
            get(list_sessions).post(create_session),
        )
        .route(
            "/api/transcription/sessions/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/api/transcription/sessions/:id/status", get(session_status))
        .route("/api/transcription/sessions/:id/logs", get(session_logs))
}
