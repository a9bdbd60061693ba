//! Operator-facing session event log

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// A `transcription_logs` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionLog {
    pub log_id: i64,
    pub session_id: i64,
    pub log_level: LogLevel,
    pub event_type: String,
    pub message: Option<String>,
    pub created_at: String,
}
