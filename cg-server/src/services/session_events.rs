//! Operator-facing session event log
//!
//! Events go to `tracing` and to `transcription_logs`. A failed insert is
//! logged and otherwise ignored so it never aborts the runtime.

use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::db::logs;
use crate::models::LogLevel;

pub async fn log_event(pool: &SqlitePool, session_id: i64, level: LogLevel, event_type: &str, message: &str) {
    match level {
        LogLevel::Info => info!(session_id, event = event_type, "{}", message),
        LogLevel::Warning => warn!(session_id, event = event_type, "{}", message),
        LogLevel::Error => error!(session_id, event = event_type, "{}", message),
    }

    if let Err(e) = logs::insert_log(pool, session_id, level, event_type, message).await {
        warn!(session_id, event = event_type, error = %e, "Failed to persist session event");
    }
}

pub async fn info(pool: &SqlitePool, session_id: i64, event_type: &str, message: &str) {
    log_event(pool, session_id, LogLevel::Info, event_type, message).await
}

pub async fn warning(pool: &SqlitePool, session_id: i64, event_type: &str, message: &str) {
    log_event(pool, session_id, LogLevel::Warning, event_type, message).await
}

pub async fn error(pool: &SqlitePool, session_id: i64, event_type: &str, message: &str) {
    log_event(pool, session_id, LogLevel::Error, event_type, message).await
}
