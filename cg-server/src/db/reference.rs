//! Reference tables: players, nicknames, teams, makers, styles, specialties

use cg_common::Result;
use sqlx::SqlitePool;

use crate::models::reference::{NamedEntry, Nickname, Player, Team};

/// The three single-name lookup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTable {
    Makers,
    Styles,
    Specialties,
}

impl NamedTable {
    fn table(&self) -> &'static str {
        match self {
            NamedTable::Makers => "card_makers",
            NamedTable::Styles => "card_styles",
            NamedTable::Specialties => "card_specialties",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            NamedTable::Makers => "maker_id",
            NamedTable::Styles => "style_id",
            NamedTable::Specialties => "specialty_id",
        }
    }

    fn name_column(&self) -> &'static str {
        match self {
            NamedTable::Styles => "style_name",
            _ => "name",
        }
    }
}

pub async fn list_players(pool: &SqlitePool) -> Result<Vec<Player>> {
    let rows = sqlx::query_as::<_, Player>(
        r#"
        SELECT player_id, first_name, last_name, current_team_id, is_active, popularity_score
        FROM players ORDER BY last_name, first_name, player_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Players eligible for matching, in insertion order
pub async fn matchable_players(pool: &SqlitePool) -> Result<Vec<Player>> {
    let rows = sqlx::query_as::<_, Player>(
        r#"
        SELECT player_id, first_name, last_name, current_team_id, is_active, popularity_score
        FROM players WHERE is_active = 1 OR popularity_score > 0
        ORDER BY player_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn create_player(
    pool: &SqlitePool,
    first_name: &str,
    last_name: &str,
    current_team_id: Option<i64>,
    is_active: bool,
    popularity_score: i64,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO players (first_name, last_name, current_team_id, is_active, popularity_score)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(current_team_id)
    .bind(is_active)
    .bind(popularity_score)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn player_exists(pool: &SqlitePool, player_id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT player_id FROM players WHERE player_id = ?")
        .bind(player_id)
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

pub async fn list_nicknames(pool: &SqlitePool) -> Result<Vec<Nickname>> {
    let rows = sqlx::query_as::<_, Nickname>(
        "SELECT nickname_id, player_id, nickname FROM player_nicknames ORDER BY nickname_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn add_nickname(pool: &SqlitePool, player_id: i64, nickname: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO player_nicknames (player_id, nickname) VALUES (?, ?)")
        .bind(player_id)
        .bind(nickname)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn list_teams(pool: &SqlitePool, active_only: bool) -> Result<Vec<Team>> {
    let rows = sqlx::query_as::<_, Team>(
        r#"
        SELECT team_id, team_name, abbreviation, mlb_id, is_active
        FROM teams WHERE (? = 0 OR is_active = 1)
        ORDER BY team_id
        "#,
    )
    .bind(active_only)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn create_team(
    pool: &SqlitePool,
    team_name: &str,
    abbreviation: Option<&str>,
    mlb_id: Option<i64>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO teams (team_name, abbreviation, mlb_id) VALUES (?, ?, ?)")
        .bind(team_name)
        .bind(abbreviation)
        .bind(mlb_id)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn list_named(pool: &SqlitePool, table: NamedTable, active_only: bool) -> Result<Vec<NamedEntry>> {
    let sql = format!(
        "SELECT {id} AS id, {name} AS name, is_active FROM {table} WHERE (? = 0 OR is_active = 1) ORDER BY {id}",
        id = table.id_column(),
        name = table.name_column(),
        table = table.table(),
    );
    let rows = sqlx::query_as::<_, NamedEntry>(&sql)
        .bind(active_only)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn create_named(pool: &SqlitePool, table: NamedTable, name: &str) -> Result<i64> {
    let sql = format!(
        "INSERT INTO {} ({}) VALUES (?)",
        table.table(),
        table.name_column()
    );
    let result = sqlx::query(&sql).bind(name).execute(pool).await?;

    Ok(result.last_insert_rowid())
}
