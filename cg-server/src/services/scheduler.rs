//! Scheduled session starts and archive retention
//!
//! Both operations are idempotent table scans. They run from the in-process
//! interval loop and can also be triggered over HTTP with the scheduler key.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cg_common::db::settings::{
    get_setting, get_setting_i64, set_setting, CLEANUP_INTERVAL_SETTING, LAST_CLEANUP_SETTING,
};
use cg_common::time::{parse_datetime, to_db};

use super::env_check;
use super::session_events;
use super::session_manager::{RuntimeError, SessionRuntime};
use crate::db::{sessions, settings as settings_db};
use crate::models::{AcquisitionMode, SessionStatus};

/// Minimum spacing between two cleanup passes unless the settings table
/// says otherwise
pub const CLEANUP_THROTTLE_SECS: i64 = 3600;

/// Loop cadence of the in-process scheduler
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one scheduler tick
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TickReport {
    pub started: Vec<i64>,
    /// Due sessions that already had a running task
    pub skipped: Vec<i64>,
    /// Due sessions that could not be started
    pub failed: Vec<i64>,
}

/// Result of one cleanup request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Last pass is inside the throttle window
    Throttled,
    /// Retention is below one day
    Disabled,
    Cleaned {
        cleaned: u32,
        files_deleted: u64,
        retention_days: i64,
    },
}

impl CleanupOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CleanupOutcome::Throttled => "Skipped, last cleanup less than 1 hour ago",
            CleanupOutcome::Disabled => "Retention disabled (days < 1)",
            CleanupOutcome::Cleaned { .. } => "Cleanup complete",
        }
    }

    pub fn cleaned(&self) -> u32 {
        match self {
            CleanupOutcome::Cleaned { cleaned, .. } => *cleaned,
            _ => 0,
        }
    }
}

/// Start every scheduled session whose start time has passed
///
/// Sessions with a registered task are skipped. Browser-automation
/// sessions need docker; without it they are moved to `error`.
pub async fn tick(runtime: &SessionRuntime, now: &NaiveDateTime) -> Result<TickReport, RuntimeError> {
    let pool = &runtime.pool;
    let now_text = to_db(now);
    let due = sessions::due_sessions(pool, &now_text).await?;
    if due.is_empty() {
        debug!("No sessions due");
        return Ok(TickReport::default());
    }

    let settings = settings_db::load_transcription_settings(pool).await?;
    let mut report = TickReport::default();

    for session in due {
        let id = session.session_id;
        if runtime.is_running(id).await {
            report.skipped.push(id);
            continue;
        }

        let mode = session.acquisition_mode(&settings);
        if mode == AcquisitionMode::BrowserAutomation && !env_check::docker_available(&runtime.tools.docker).await {
            sessions::finish_session(pool, id, SessionStatus::Error, Some("Docker not available"), &now_text).await?;
            session_events::error(
                pool,
                id,
                "docker_unavailable",
                "Docker not available for browser automation",
            )
            .await;
            report.failed.push(id);
            continue;
        }

        if !sessions::mark_recording(pool, id, &now_text).await? {
            continue;
        }
        session_events::info(pool, id, "auto_started", "Session auto-started by scheduler").await;

        match runtime.launch_or_revert(id).await {
            Ok(_) => report.started.push(id),
            Err(_) => report.failed.push(id),
        }
    }

    if !report.started.is_empty() {
        info!(started = ?report.started, "Scheduler started sessions");
    }
    Ok(report)
}

/// Delete finished sessions older than the retention period
///
/// Runs at most once per throttle window (default
/// [`CLEANUP_THROTTLE_SECS`]); the last run time is kept in the `settings`
/// table.
pub async fn cleanup(runtime: &SessionRuntime, now: &NaiveDateTime) -> Result<CleanupOutcome, RuntimeError> {
    let pool = &runtime.pool;

    let throttle = get_setting_i64(pool, CLEANUP_INTERVAL_SETTING, CLEANUP_THROTTLE_SECS).await?;
    let last_run = get_setting(pool, LAST_CLEANUP_SETTING)
        .await?
        .as_deref()
        .and_then(parse_datetime);
    if let Some(last) = last_run {
        if (*now - last).num_seconds() < throttle {
            return Ok(CleanupOutcome::Throttled);
        }
    }
    set_setting(pool, LAST_CLEANUP_SETTING, &to_db(now)).await?;

    let days = settings_db::load_transcription_settings(pool)
        .await?
        .audio_retention_days;
    if days < 1 {
        return Ok(CleanupOutcome::Disabled);
    }

    let cutoff = to_db(&(*now - ChronoDuration::days(days)));
    let expired = sessions::expired_sessions(pool, &cutoff).await?;

    let mut cleaned = 0u32;
    let mut files_deleted = 0u64;
    for session in &expired {
        match runtime.purge_session(session).await {
            Ok(files) => {
                cleaned += 1;
                files_deleted += files;
            }
            Err(e) => warn!(session_id = session.session_id, error = %e, "Failed to remove expired session"),
        }
    }

    if cleaned > 0 {
        info!(cleaned, files_deleted, retention_days = days, "Expired sessions removed");
    }
    Ok(CleanupOutcome::Cleaned {
        cleaned,
        files_deleted,
        retention_days: days,
    })
}

/// Run tick and cleanup on an interval until `shutdown` fires
pub async fn run_scheduler_loop(runtime: SessionRuntime, interval: Duration, shutdown: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Scheduler loop started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = cg_common::time::now_local();
        if let Err(e) = tick(&runtime, &now).await {
            error!(error = %e, "Scheduler tick failed");
        }
        if let Err(e) = cleanup(&runtime, &now).await {
            error!(error = %e, "Retention cleanup failed");
        }
    }

    info!("Scheduler loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_outcome_serialization() {
        let json = serde_json::to_value(CleanupOutcome::Cleaned {
            cleaned: 2,
            files_deleted: 9,
            retention_days: 30,
        })
        .unwrap();
        assert_eq!(json["outcome"], "cleaned");
        assert_eq!(json["cleaned"], 2);
        assert_eq!(json["retention_days"], 30);

        assert_eq!(serde_json::to_value(CleanupOutcome::Throttled).unwrap()["outcome"], "throttled");
        assert_eq!(CleanupOutcome::Disabled.cleaned(), 0);
    }
}
