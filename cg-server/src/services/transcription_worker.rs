//! Transcription worker
//!
//! Polls a session's segments and transcribes each pending one whose audio
//! is fully recorded, oldest first. The worker exits when nothing is pending
//! and the session is no longer recording or processing, or after
//! `max_idle_polls` empty polls while processing.

use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::session_events;
use super::session_paths;
use super::transcriber::{TranscribeRequest, Transcriber};
use crate::db::{segments, sessions};
use crate::models::{Segment, SessionStatus};

/// Stored error messages are cut to this many characters
pub const MAX_ERROR_CHARS: usize = 500;

/// Polling cadence
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub max_idle_polls: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_idle_polls: 60,
        }
    }
}

/// One worker's session and Whisper options
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub pool: SqlitePool,
    pub session_id: i64,
    pub session_dir: PathBuf,
    pub model: String,
    pub threads: i64,
    pub low_priority: bool,
}

/// Segment outcomes over one worker run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub transcribed: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

enum Outcome {
    Transcribed,
    Skipped,
    Failed,
    Cancelled,
}

async fn process_segment(
    ctx: &WorkerContext,
    transcriber: &dyn Transcriber,
    segment: &Segment,
    cancel: &CancellationToken,
) -> cg_common::Result<Outcome> {
    let pool = &ctx.pool;
    let sid = ctx.session_id;
    let number = segment.segment_number;

    let Some(audio_file) = segment.filename_audio.as_deref().filter(|f| !f.is_empty()) else {
        segments::mark_skipped(pool, segment.segment_id, None).await?;
        return Ok(Outcome::Skipped);
    };

    let audio = session_paths::audio_dir(&ctx.session_dir).join(audio_file);
    if !tokio::fs::try_exists(&audio).await.unwrap_or(false) {
        session_events::warning(pool, sid, "audio_missing", &format!("Audio file not found: {}", audio_file)).await;
        segments::mark_skipped(pool, segment.segment_id, Some("Audio file not found")).await?;
        return Ok(Outcome::Skipped);
    }

    segments::mark_transcribing(pool, segment.segment_id).await?;
    session_events::info(
        pool,
        sid,
        "transcribing",
        &format!("Transcribing segment {}: {}", number, audio_file),
    )
    .await;

    let output_dir = session_paths::transcripts_dir(&ctx.session_dir);
    tokio::fs::create_dir_all(&output_dir).await?;
    let request = TranscribeRequest {
        audio: &audio,
        output_dir: &output_dir,
        model: &ctx.model,
        threads: ctx.threads,
        low_priority: ctx.low_priority,
    };

    let result = tokio::select! {
        result = transcriber.transcribe(&request) => Some(result),
        _ = cancel.cancelled() => None,
    };

    match result {
        Some(Ok(text)) => {
            segments::complete_transcription(pool, segment.segment_id, &session_paths::transcript_filename(audio_file))
                .await?;
            session_events::info(
                pool,
                sid,
                "transcription_complete",
                &format!("Segment {} transcribed: {} words", number, text.split_whitespace().count()),
            )
            .await;
            Ok(Outcome::Transcribed)
        }
        Some(Err(e)) => {
            let message = e.to_string();
            session_events::error(
                pool,
                sid,
                "transcription_error",
                &format!("Segment {} failed: {}", number, message),
            )
            .await;
            segments::mark_transcription_error(pool, segment.segment_id, truncate_chars(&message, MAX_ERROR_CHARS))
                .await?;
            Ok(Outcome::Failed)
        }
        None => {
            // Left as an error so a later transcribe request re-queues it
            segments::mark_transcription_error(pool, segment.segment_id, "Cancelled").await?;
            Ok(Outcome::Cancelled)
        }
    }
}

/// Run the worker loop until it runs out of work or is cancelled
pub async fn run_worker(
    ctx: WorkerContext,
    transcriber: Arc<dyn Transcriber>,
    settings: WorkerSettings,
    cancel: CancellationToken,
) -> cg_common::Result<WorkerStats> {
    let pool = &ctx.pool;
    let sid = ctx.session_id;
    let mut stats = WorkerStats::default();
    let mut idle_polls = 0u32;

    session_events::info(
        pool,
        sid,
        "worker_started",
        &format!("Transcription worker started (model: {})", ctx.model),
    )
    .await;

    while !cancel.is_cancelled() {
        if let Some(segment) = segments::next_pending(pool, sid).await? {
            idle_polls = 0;
            match process_segment(&ctx, transcriber.as_ref(), &segment, &cancel).await? {
                Outcome::Transcribed => stats.transcribed += 1,
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Failed => stats.failed += 1,
                Outcome::Cancelled => break,
            }
            continue;
        }

        let status = sessions::get_session(pool, sid).await?.map(|s| s.status);
        match status {
            None => break,
            Some(SessionStatus::Recording) | Some(SessionStatus::Processing) => {}
            Some(_) => {
                session_events::info(pool, sid, "worker_done", "No more pending segments, session not active").await;
                break;
            }
        }

        idle_polls += 1;
        if idle_polls >= settings.max_idle_polls && status == Some(SessionStatus::Processing) {
            session_events::info(pool, sid, "worker_timeout", "Worker idle timeout, no new segments").await;
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }

    session_events::info(pool, sid, "worker_stopped", "Transcription worker finished").await;
    Ok(stats)
}
