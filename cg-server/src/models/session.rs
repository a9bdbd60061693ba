//! Transcription sessions and their effective configuration

use serde::{Deserialize, Serialize};

use super::de;
use super::settings::{check_enum, TranscriptionSettings, ACQUISITION_MODES};

/// Session lifecycle
///
/// `scheduled → recording → processing → complete`, with `stopped` (user
/// cancel) and `error` as the other terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Recording,
    Processing,
    Complete,
    Stopped,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Recording => "recording",
            SessionStatus::Processing => "processing",
            SessionStatus::Complete => "complete",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            SessionStatus::Scheduled,
            SessionStatus::Recording,
            SessionStatus::Processing,
            SessionStatus::Complete,
            SessionStatus::Stopped,
            SessionStatus::Error,
        ]
        .into_iter()
        .find(|s| s.as_str() == value)
    }

    /// Recording or processing
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Recording | SessionStatus::Processing)
    }

    /// States a session may be edited in
    pub fn is_editable(&self) -> bool {
        !self.is_active()
    }
}

/// How audio is captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// ffmpeg reads the auction URL directly
    DirectStream,
    /// A headless browser container plays the page and captures its audio
    BrowserAutomation,
}

impl AcquisitionMode {
    pub fn parse(value: &str) -> Self {
        if value == "browser_automation" {
            AcquisitionMode::BrowserAutomation
        } else {
            AcquisitionMode::DirectStream
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::DirectStream => "direct_stream",
            AcquisitionMode::BrowserAutomation => "browser_automation",
        }
    }
}

/// A `transcription_sessions` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub session_id: i64,
    pub auction_name: String,
    pub auction_url: String,
    pub scheduled_start: String,
    pub actual_start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: SessionStatus,
    pub stop_reason: Option<String>,
    pub session_dir: Option<String>,
    pub total_segments: i64,
    pub total_duration_sec: i64,
    pub override_segment_length: Option<i64>,
    pub override_silence_timeout: Option<i64>,
    pub override_max_duration: Option<i64>,
    pub override_cpu_limit: Option<i64>,
    pub override_acquisition_mode: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

impl Session {
    /// Override when set, otherwise the global segment length
    pub fn effective_segment_length(&self, settings: &TranscriptionSettings) -> i64 {
        positive(self.override_segment_length).unwrap_or(settings.segment_length_minutes)
    }

    pub fn acquisition_mode(&self, settings: &TranscriptionSettings) -> AcquisitionMode {
        let mode = self
            .override_acquisition_mode
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&settings.acquisition_mode);
        AcquisitionMode::parse(mode)
    }
}

/// Session list row with per-session transcription counts
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub session: Session,
    pub tx_complete: i64,
    pub tx_pending: i64,
    pub tx_active: i64,
}

/// Per-session override columns shared by create and update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionOverrides {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub override_segment_length: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub override_silence_timeout: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub override_max_duration: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub override_cpu_limit: Option<i64>,
    #[serde(default)]
    pub override_acquisition_mode: Option<String>,
}

impl SessionOverrides {
    /// Blank acquisition mode means "use the global setting"
    pub fn normalized(mut self) -> Result<Self, String> {
        self.override_acquisition_mode = self
            .override_acquisition_mode
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        check_enum(
            "override_acquisition_mode",
            self.override_acquisition_mode.as_deref(),
            ACQUISITION_MODES,
        )?;
        Ok(self)
    }
}

/// Body of `POST /api/transcription/sessions`
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub auction_name: Option<String>,
    #[serde(default)]
    pub auction_url: Option<String>,
    #[serde(default)]
    pub scheduled_start: Option<String>,
    #[serde(flatten)]
    pub overrides: SessionOverrides,
}

/// Body of `PUT /api/transcription/sessions/{id}`
///
/// Name, URL and start keep their stored value when absent; the override
/// columns are always replaced.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub auction_name: Option<String>,
    #[serde(default)]
    pub auction_url: Option<String>,
    #[serde(default)]
    pub scheduled_start: Option<String>,
    #[serde(flatten)]
    pub overrides: SessionOverrides,
}

fn positive(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v > 0)
}

/// Global settings merged with one session's overrides
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub segment_length_minutes: i64,
    pub silence_timeout_minutes: i64,
    pub max_session_hours: i64,
    pub max_cpu_cores: i64,
    pub acquisition_mode: String,
    pub sample_rate: String,
    pub audio_channels: String,
    pub audio_format: String,
    pub silence_threshold_dbfs: i64,
    pub whisper_model: String,
    pub priority_mode: String,
    pub base_archive_dir: String,
    pub folder_structure: String,
    pub min_free_disk_gb: i64,
}

impl SessionConfig {
    pub fn merge(session: &Session, settings: &TranscriptionSettings) -> Self {
        Self {
            segment_length_minutes: session.effective_segment_length(settings),
            silence_timeout_minutes: positive(session.override_silence_timeout)
                .unwrap_or(settings.silence_timeout_minutes),
            max_session_hours: positive(session.override_max_duration)
                .unwrap_or(settings.max_session_hours),
            max_cpu_cores: positive(session.override_cpu_limit).unwrap_or(settings.max_cpu_cores),
            acquisition_mode: session.acquisition_mode(settings).as_str().to_string(),
            sample_rate: settings.sample_rate.clone(),
            audio_channels: settings.audio_channels.clone(),
            audio_format: settings.audio_format.clone(),
            silence_threshold_dbfs: settings.silence_threshold_dbfs,
            whisper_model: settings.whisper_model.clone(),
            priority_mode: settings.priority_mode.clone(),
            base_archive_dir: settings.base_archive_dir.clone(),
            folder_structure: settings.folder_structure.clone(),
            min_free_disk_gb: settings.min_free_disk_gb,
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::parse(&self.acquisition_mode)
    }

    pub fn segment_seconds(&self) -> u64 {
        (self.segment_length_minutes.max(1) as u64) * 60
    }

    pub fn max_duration_seconds(&self) -> u64 {
        (self.max_session_hours.max(1) as u64) * 3600
    }

    pub fn channel_count(&self) -> u8 {
        if self.audio_channels == "stereo" {
            2
        } else {
            1
        }
    }
}
