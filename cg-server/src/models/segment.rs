//! Recorded audio segments and their transcription state

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecordingStatus {
    Recording,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Pending,
    Transcribing,
    Complete,
    Error,
    Skipped,
}

/// A `transcription_segments` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Segment {
    pub segment_id: i64,
    pub session_id: i64,
    pub segment_number: i64,
    pub filename_audio: Option<String>,
    pub filename_transcript: Option<String>,
    pub recording_status: RecordingStatus,
    pub transcription_status: TranscriptionStatus,
    pub transcription_progress: i64,
    pub duration_seconds: Option<i64>,
    pub file_size_bytes: Option<i64>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

/// Aggregate counts reported by the status endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct SegmentSummary {
    pub total_segments: i64,
    pub rec_complete: i64,
    pub rec_active: i64,
    pub tx_complete: i64,
    pub tx_active: i64,
    pub tx_pending: i64,
    pub total_duration: i64,
    pub total_size: i64,
}

/// Transcript text of one segment
#[derive(Debug, Clone, Serialize)]
pub struct SegmentText {
    pub segment_number: i64,
    pub text: String,
}
