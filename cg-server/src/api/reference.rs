//! Reference data endpoints for the matching tables (list and create)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::reference::{self, NamedTable};
use crate::models::de;
use crate::models::reference::{NamedEntry, NewNamedEntry, NewNickname, NewPlayer, NewTeam, Player, Team};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ActiveQuery {
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub active_only: Option<bool>,
}

type Created = (StatusCode, Json<Value>);

fn required_text<'a>(value: &'a Option<String>, field: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {}", field)))
}

fn created(id: i64) -> Created {
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

/// GET /api/reference/players handler
pub async fn list_players(State(state): State<AppState>) -> ApiResult<Json<Vec<Player>>> {
    Ok(Json(reference::list_players(&state.db).await?))
}

/// POST /api/reference/players handler
///
/// **Request:** `{"first_name", "last_name", "current_team_id", "is_active", "popularity_score"}`
/// **Response:** 201 `{"id": N}`
pub async fn create_player(State(state): State<AppState>, Json(body): Json<NewPlayer>) -> ApiResult<Created> {
    let first = required_text(&body.first_name, "first_name")?;
    let last = required_text(&body.last_name, "last_name")?;

    let id = reference::create_player(
        &state.db,
        first,
        last,
        body.current_team_id,
        body.is_active.unwrap_or(true),
        body.popularity_score.unwrap_or(0).max(0),
    )
    .await?;
    info!(player_id = id, "Player created");
    Ok(created(id))
}

/// POST /api/reference/players/{id}/nicknames handler
///
/// **Errors:**
/// - 404 Not Found: unknown player
pub async fn add_nickname(
    State(state): State<AppState>,
    Path(player_id): Path<i64>,
    Json(body): Json<NewNickname>,
) -> ApiResult<Created> {
    let nickname = required_text(&body.nickname, "nickname")?;
    if !reference::player_exists(&state.db, player_id).await? {
        return Err(ApiError::not_found("Player not found"));
    }

    let id = reference::add_nickname(&state.db, player_id, nickname).await?;
    Ok(created(id))
}

/// GET /api/reference/teams handler
pub async fn list_teams(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(
        reference::list_teams(&state.db, query.active_only.unwrap_or(false)).await?,
    ))
}

/// POST /api/reference/teams handler
pub async fn create_team(State(state): State<AppState>, Json(body): Json<NewTeam>) -> ApiResult<Created> {
    let name = required_text(&body.team_name, "team_name")?;
    let abbreviation = body
        .abbreviation
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let id = reference::create_team(&state.db, name, abbreviation, body.mlb_id).await?;
    Ok(created(id))
}

async fn list_named(db: &SqlitePool, table: NamedTable, query: ActiveQuery) -> ApiResult<Json<Vec<NamedEntry>>> {
    Ok(Json(
        reference::list_named(db, table, query.active_only.unwrap_or(false)).await?,
    ))
}

async fn create_named(db: &SqlitePool, table: NamedTable, body: NewNamedEntry) -> ApiResult<Created> {
    let name = required_text(&body.name, "name")?;
    Ok(created(reference::create_named(db, table, name).await?))
}

/// GET /api/reference/makers handler
pub async fn list_makers(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> ApiResult<Json<Vec<NamedEntry>>> {
    list_named(&state.db, NamedTable::Makers, query).await
}

/// POST /api/reference/makers handler
pub async fn create_maker(State(state): State<AppState>, Json(body): Json<NewNamedEntry>) -> ApiResult<Created> {
    create_named(&state.db, NamedTable::Makers, body).await
}

/// GET /api/reference/styles handler
pub async fn list_styles(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> ApiResult<Json<Vec<NamedEntry>>> {
    list_named(&state.db, NamedTable::Styles, query).await
}

/// POST /api/reference/styles handler
pub async fn create_style(State(state): State<AppState>, Json(body): Json<NewNamedEntry>) -> ApiResult<Created> {
    create_named(&state.db, NamedTable::Styles, body).await
}

/// GET /api/reference/specialties handler
pub async fn list_specialties(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> ApiResult<Json<Vec<NamedEntry>>> {
    list_named(&state.db, NamedTable::Specialties, query).await
}

/// POST /api/reference/specialties handler
pub async fn create_specialty(
    State(state): State<AppState>,
    Json(body): Json<NewNamedEntry>,
) -> ApiResult<Created> {
    create_named(&state.db, NamedTable::Specialties, body).await
}

/// Build reference data routes
pub fn reference_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reference/players", get(list_players).post(create_player))
        .route("/api/reference/players/:id/nicknames", post(add_nickname))
        .route("/api/reference/teams", get(list_teams).post(create_team))
        .route("/api/reference/makers", get(list_makers).post(create_maker))
        .route("/api/reference/styles", get(list_styles).post(create_style))
        .route(
            "/api/reference/specialties",
            get(list_specialties).post(create_specialty),
        )
}
