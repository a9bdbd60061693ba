//! Externally triggered scheduler tick and retention cleanup
//!
//! Both endpoints require the scheduler key, sent either as JSON
//! `{"key": "..."}` or as the form field `key`.

use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use cg_common::time::now_local;

use crate::services::scheduler::{self, CleanupOutcome, TickReport};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
struct KeyBody {
    #[serde(default)]
    key: Option<String>,
}

/// Scheduler key from a JSON or form body; `None` when absent or unreadable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerKey(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for SchedulerKey {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let body = if is_form {
            Form::<KeyBody>::from_request(req, state).await.ok().map(|Form(b)| b)
        } else {
            Json::<KeyBody>::from_request(req, state).await.ok().map(|Json(b)| b)
        };

        Ok(SchedulerKey(body.and_then(|b| b.key)))
    }
}

impl SchedulerKey {
    fn authorize(&self, state: &AppState) -> ApiResult<()> {
        match self.0.as_deref() {
            Some(key) if key == state.scheduler_key.as_str() => Ok(()),
            _ => {
                warn!("Scheduler request with missing or wrong key");
                Err(ApiError::Forbidden("Forbidden".to_string()))
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: TickReport,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: CleanupOutcome,
}

/// POST /api/transcription/scheduler-tick handler
///
/// **Request:** `{"key": "..."}` or `key=...`
/// **Response:** `{"message", "started": [...], "skipped": [...], "failed": [...]}`
///
/// **Errors:**
/// - 403 Forbidden: wrong or missing key
pub async fn scheduler_tick(State(state): State<AppState>, key: SchedulerKey) -> ApiResult<Json<TickResponse>> {
    key.authorize(&state)?;

    let report = scheduler::tick(&state.runtime, &now_local()).await?;
    Ok(Json(TickResponse {
        message: format!("Started {} session(s)", report.started.len()),
        report,
    }))
}

/// POST /api/transcription/cleanup handler
///
/// **Response:** `{"message", "outcome": "throttled" | "disabled" | "cleaned", ...}`
///
/// **Errors:**
/// - 403 Forbidden: wrong or missing key
pub async fn cleanup(State(state): State<AppState>, key: SchedulerKey) -> ApiResult<Json<CleanupResponse>> {
    key.authorize(&state)?;

    let outcome = scheduler::cleanup(&state.runtime, &now_local()).await?;
    Ok(Json(CleanupResponse {
        message: outcome.message().to_string(),
        outcome,
    }))
}

/// Build scheduler routes
pub fn scheduler_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transcription/scheduler-tick", post(scheduler_tick))
        .route("/api/transcription/cleanup", post(cleanup))
}
