//! Parse runs and the card records they produce

use serde::{Deserialize, Serialize};

use super::de;

/// One card mention extracted from a transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CardRecord {
    pub sequence_number: i64,
    pub player_id: Option<i64>,
    pub team_id: Option<i64>,
    pub maker_id: Option<i64>,
    pub style_id: Option<i64>,
    pub specialty_id: Option<i64>,
    pub raw_player: String,
    pub raw_team: Option<String>,
    pub raw_maker: Option<String>,
    pub raw_style: Option<String>,
    pub raw_specialty: Option<String>,
    pub raw_parallel: Option<String>,
    pub raw_card_number: Option<String>,
    pub lot_number: Option<i64>,
    pub is_rookie: bool,
    pub is_autograph: bool,
    pub is_relic: bool,
    pub is_giveaway: bool,
    pub confidence: f64,
    pub raw_text_excerpt: String,
    pub segment_id: Option<i64>,
    pub segment_number: Option<i64>,
    pub text_position: i64,
    pub estimated_at: Option<String>,
}

/// A stored record joined with reference display names
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecordRow {
    pub record_id: i64,
    pub run_id: i64,
    pub session_id: i64,
    pub sequence_number: i64,
    pub player_id: Option<i64>,
    pub team_id: Option<i64>,
    pub maker_id: Option<i64>,
    pub style_id: Option<i64>,
    pub specialty_id: Option<i64>,
    pub raw_player: Option<String>,
    pub raw_team: Option<String>,
    pub raw_maker: Option<String>,
    pub raw_style: Option<String>,
    pub raw_specialty: Option<String>,
    pub raw_parallel: Option<String>,
    pub raw_card_number: Option<String>,
    pub lot_number: Option<i64>,
    pub is_rookie: bool,
    pub is_autograph: bool,
    pub is_relic: bool,
    pub is_giveaway: bool,
    pub confidence: f64,
    pub raw_text_excerpt: Option<String>,
    pub segment_id: Option<i64>,
    pub segment_number: Option<i64>,
    pub text_position: Option<i64>,
    pub estimated_at: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub player_name: Option<String>,
    pub team_name: Option<String>,
    pub team_abbr: Option<String>,
    pub team_mlb_id: Option<i64>,
    pub maker_name: Option<String>,
    pub style_name: Option<String>,
    pub specialty_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ParseRunStatus {
    Running,
    Complete,
    Error,
}

/// A `transcription_parse_runs` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ParseRun {
    pub run_id: i64,
    pub session_id: i64,
    pub status: ParseRunStatus,
    pub total_records: i64,
    pub high_confidence: i64,
    pub low_confidence: i64,
    pub error_message: Option<String>,
    pub run_by: Option<i64>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Body of `PUT /api/transcription/records/{id}`
///
/// Only fields present in the body are written; `null` clears a column.
#[derive(Debug, Default, Deserialize)]
pub struct RecordUpdate {
    #[serde(default, deserialize_with = "de::nullable_i64")]
    pub player_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::nullable_i64")]
    pub team_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::nullable_i64")]
    pub maker_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::nullable_i64")]
    pub style_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::nullable_i64")]
    pub specialty_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub raw_parallel: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub raw_card_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::nullable_i64")]
    pub lot_number: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub is_rookie: Option<bool>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub is_autograph: Option<bool>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub is_relic: Option<bool>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub is_giveaway: Option<bool>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub is_verified: Option<bool>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub notes: Option<Option<String>>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.player_id.is_none()
            && self.team_id.is_none()
            && self.maker_id.is_none()
            && self.style_id.is_none()
            && self.specialty_id.is_none()
            && self.raw_parallel.is_none()
            && self.raw_card_number.is_none()
            && self.lot_number.is_none()
            && self.is_rookie.is_none()
            && self.is_autograph.is_none()
            && self.is_relic.is_none()
            && self.is_giveaway.is_none()
            && self.is_verified.is_none()
            && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_leave_update_empty() {
        let update: RecordUpdate = serde_json::from_str(r#"{"record_id": 5, "run_id": 2}"#).unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_explicit_null_clears() {
        let update: RecordUpdate =
            serde_json::from_str(r#"{"maker_id": null, "is_verified": 1}"#).unwrap();
        assert!(!update.is_empty());
        assert_eq!(update.maker_id, Some(None));
        assert_eq!(update.is_verified, Some(true));
        assert_eq!(update.player_id, None);
    }
}
