//! Global transcription settings

use serde::{Deserialize, Serialize};

use super::de;

pub const DEFAULT_ARCHIVE_DIR: &str = "/volume1/auction_archive/";

/// Inclusive bounds for the integer settings
pub const SEGMENT_LENGTH_RANGE: (i64, i64) = (5, 60);
pub const SILENCE_THRESHOLD_RANGE: (i64, i64) = (-60, -30);
pub const SILENCE_TIMEOUT_RANGE: (i64, i64) = (1, 30);
pub const MAX_SESSION_HOURS_RANGE: (i64, i64) = (1, 24);
pub const MAX_CPU_CORES_RANGE: (i64, i64) = (1, 3);
pub const MIN_FREE_DISK_RANGE: (i64, i64) = (1, 50);
pub const RETENTION_DAYS_RANGE: (i64, i64) = (7, 365);

pub const SAMPLE_RATES: &[&str] = &["8000", "16000", "22050"];
pub const AUDIO_CHANNELS: &[&str] = &["mono", "stereo"];
pub const AUDIO_FORMATS: &[&str] = &["wav", "flac"];
pub const WHISPER_MODELS: &[&str] = &["tiny", "base", "small", "medium", "large"];
pub const PRIORITY_MODES: &[&str] = &["low", "normal"];
pub const FOLDER_STRUCTURES: &[&str] = &["year-based", "flat"];
pub const ACQUISITION_MODES: &[&str] = &["direct_stream", "browser_automation"];

/// Row 1 of `transcription_settings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TranscriptionSettings {
    pub segment_length_minutes: i64,
    pub sample_rate: String,
    pub audio_channels: String,
    pub audio_format: String,
    pub silence_threshold_dbfs: i64,
    pub silence_timeout_minutes: i64,
    pub max_session_hours: i64,
    pub max_cpu_cores: i64,
    pub whisper_model: String,
    pub priority_mode: String,
    pub base_archive_dir: String,
    pub folder_structure: String,
    pub min_free_disk_gb: i64,
    pub acquisition_mode: String,
    pub audio_retention_days: i64,
    pub updated_by: Option<i64>,
    pub updated_at: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            segment_length_minutes: 15,
            sample_rate: "16000".to_string(),
            audio_channels: "mono".to_string(),
            audio_format: "wav".to_string(),
            silence_threshold_dbfs: -48,
            silence_timeout_minutes: 10,
            max_session_hours: 10,
            max_cpu_cores: 2,
            whisper_model: "base".to_string(),
            priority_mode: "low".to_string(),
            base_archive_dir: DEFAULT_ARCHIVE_DIR.to_string(),
            folder_structure: "year-based".to_string(),
            min_free_disk_gb: 5,
            acquisition_mode: "direct_stream".to_string(),
            audio_retention_days: 30,
            updated_by: None,
            updated_at: None,
        }
    }
}

/// Body of `PUT /api/transcription/settings`
///
/// The update replaces the whole row: any field left out is reset to its
/// default.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub segment_length_minutes: Option<i64>,
    #[serde(default, deserialize_with = "de::string_or_number")]
    pub sample_rate: Option<String>,
    #[serde(default)]
    pub audio_channels: Option<String>,
    #[serde(default)]
    pub audio_format: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub silence_threshold_dbfs: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub silence_timeout_minutes: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub max_session_hours: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub max_cpu_cores: Option<i64>,
    #[serde(default)]
    pub whisper_model: Option<String>,
    #[serde(default)]
    pub priority_mode: Option<String>,
    #[serde(default)]
    pub base_archive_dir: Option<String>,
    #[serde(default)]
    pub folder_structure: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub min_free_disk_gb: Option<i64>,
    #[serde(default)]
    pub acquisition_mode: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub audio_retention_days: Option<i64>,
}

fn check_range(field: &str, value: Option<i64>, (min, max): (i64, i64)) -> Result<(), String> {
    match value {
        Some(v) if v < min || v > max => {
            Err(format!("{} must be between {} and {}", field, min, max))
        }
        _ => Ok(()),
    }
}

/// Reject a value outside `allowed`, naming the accepted values
pub fn check_enum(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<(), String> {
    match value {
        Some(v) if !allowed.contains(&v) => {
            Err(format!("{} must be one of: {}", field, allowed.join(", ")))
        }
        _ => Ok(()),
    }
}

impl SettingsUpdate {
    /// Validate and produce the replacement row
    ///
    /// # Returns
    /// The full settings row, or the first validation message
    pub fn into_settings(self, updated_by: Option<i64>) -> Result<TranscriptionSettings, String> {
        check_range("segment_length_minutes", self.segment_length_minutes, SEGMENT_LENGTH_RANGE)?;
        check_range("silence_threshold_dbfs", self.silence_threshold_dbfs, SILENCE_THRESHOLD_RANGE)?;
        check_range("silence_timeout_minutes", self.silence_timeout_minutes, SILENCE_TIMEOUT_RANGE)?;
        check_range("max_session_hours", self.max_session_hours, MAX_SESSION_HOURS_RANGE)?;
        check_range("max_cpu_cores", self.max_cpu_cores, MAX_CPU_CORES_RANGE)?;
        check_range("min_free_disk_gb", self.min_free_disk_gb, MIN_FREE_DISK_RANGE)?;
        check_range("audio_retention_days", self.audio_retention_days, RETENTION_DAYS_RANGE)?;

        check_enum("sample_rate", self.sample_rate.as_deref(), SAMPLE_RATES)?;
        check_enum("audio_channels", self.audio_channels.as_deref(), AUDIO_CHANNELS)?;
        check_enum("audio_format", self.audio_format.as_deref(), AUDIO_FORMATS)?;
        check_enum("whisper_model", self.whisper_model.as_deref(), WHISPER_MODELS)?;
        check_enum("priority_mode", self.priority_mode.as_deref(), PRIORITY_MODES)?;
        check_enum("folder_structure", self.folder_structure.as_deref(), FOLDER_STRUCTURES)?;
        check_enum("acquisition_mode", self.acquisition_mode.as_deref(), ACQUISITION_MODES)?;

        let defaults = TranscriptionSettings::default();
        let base_archive_dir = self
            .base_archive_dir
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or(defaults.base_archive_dir);

        Ok(TranscriptionSettings {
            segment_length_minutes: self.segment_length_minutes.unwrap_or(defaults.segment_length_minutes),
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            audio_channels: self.audio_channels.unwrap_or(defaults.audio_channels),
            audio_format: self.audio_format.unwrap_or(defaults.audio_format),
            silence_threshold_dbfs: self.silence_threshold_dbfs.unwrap_or(defaults.silence_threshold_dbfs),
            silence_timeout_minutes: self.silence_timeout_minutes.unwrap_or(defaults.silence_timeout_minutes),
            max_session_hours: self.max_session_hours.unwrap_or(defaults.max_session_hours),
            max_cpu_cores: self.max_cpu_cores.unwrap_or(defaults.max_cpu_cores),
            whisper_model: self.whisper_model.unwrap_or(defaults.whisper_model),
            priority_mode: self.priority_mode.unwrap_or(defaults.priority_mode),
            base_archive_dir,
            folder_structure: self.folder_structure.unwrap_or(defaults.folder_structure),
            min_free_disk_gb: self.min_free_disk_gb.unwrap_or(defaults.min_free_disk_gb),
            acquisition_mode: self.acquisition_mode.unwrap_or(defaults.acquisition_mode),
            audio_retention_days: self.audio_retention_days.unwrap_or(defaults.audio_retention_days),
            updated_by,
            updated_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> SettingsUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_empty_update_resets_to_defaults() {
        let settings = update("{}").into_settings(None).unwrap();
        assert_eq!(settings, TranscriptionSettings::default());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        assert!(update(r#"{"segment_length_minutes": 5}"#).into_settings(None).is_ok());
        assert!(update(r#"{"segment_length_minutes": 60}"#).into_settings(None).is_ok());

        let err = update(r#"{"segment_length_minutes": 61}"#)
            .into_settings(None)
            .unwrap_err();
        assert_eq!(err, "segment_length_minutes must be between 5 and 60");

        let err = update(r#"{"silence_threshold_dbfs": -29}"#)
            .into_settings(None)
            .unwrap_err();
        assert_eq!(err, "silence_threshold_dbfs must be between -60 and -30");
    }

    #[test]
    fn test_enum_membership() {
        let err = update(r#"{"whisper_model": "huge"}"#)
            .into_settings(None)
            .unwrap_err();
        assert_eq!(err, "whisper_model must be one of: tiny, base, small, medium, large");

        let ok = update(r#"{"sample_rate": 22050, "acquisition_mode": "browser_automation"}"#)
            .into_settings(Some(3))
            .unwrap();
        assert_eq!(ok.sample_rate, "22050");
        assert_eq!(ok.acquisition_mode, "browser_automation");
        assert_eq!(ok.updated_by, Some(3));
    }

    #[test]
    fn test_archive_dir_trimmed() {
        let ok = update(r#"{"base_archive_dir": "  /srv/archive  "}"#)
            .into_settings(None)
            .unwrap();
        assert_eq!(ok.base_archive_dir, "/srv/archive");
    }
}
