//! Reference tables used for matching transcript text

use serde::{Deserialize, Serialize};

use super::de;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Team {
    pub team_id: i64,
    pub team_name: String,
    pub abbreviation: Option<String>,
    pub mlb_id: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Player {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub current_team_id: Option<i64>,
    pub is_active: bool,
    pub popularity_score: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Nickname {
    pub nickname_id: i64,
    pub player_id: i64,
    pub nickname: String,
}

/// Maker, style and specialty rows share one shape
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NamedEntry {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewTeam {
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub mlb_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewPlayer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub current_team_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub popularity_score: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewNickname {
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Body for makers, styles and specialties
#[derive(Debug, Deserialize)]
pub struct NewNamedEntry {
    #[serde(default, alias = "style_name")]
    pub name: Option<String>,
}
