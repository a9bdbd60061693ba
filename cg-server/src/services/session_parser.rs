//! Parse a session's transcripts into card records
//!
//! Reads every completed segment transcript from the session archive, runs
//! extraction over the joined text and stores the records under a new parse
//! run, replacing the records of earlier runs.

use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use super::confidence::ConfidenceBand;
use super::reference_index::ReferenceIndex;
use super::session_paths;
use super::transcript_parser::{extract_card_records, SegmentTimeline};
use crate::db::{parse_runs, records, segments, sessions};
use crate::models::{Segment, SegmentText};

/// Joined transcripts shorter than this are not worth parsing
pub const MIN_TEXT_LENGTH: usize = 50;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("No completed transcript segments found for this session")]
    NoTranscripts,

    #[error("Transcript text too short to parse")]
    TextTooShort,

    /// Failure after the parse run was created; the run is marked as error
    #[error("Parse failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Common(#[from] cg_common::Error),
}

/// Totals reported for a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseSummary {
    pub run_id: i64,
    pub total_records: i64,
    pub high_confidence: i64,
    pub low_confidence: i64,
}

/// Read the non-blank transcripts of `segments` from the session archive
///
/// Segments without a transcript file name, or whose file is missing or
/// blank, are left out.
pub async fn read_transcripts(session_dir: &Path, segments: Vec<Segment>) -> Vec<(Segment, String)> {
    let mut texts = Vec::with_capacity(segments.len());

    for segment in segments {
        let Some(name) = segment.filename_transcript.as_deref() else {
            continue;
        };
        let path = session_paths::transcripts_dir(session_dir).join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.trim().is_empty() => texts.push((segment, text)),
            Ok(_) => {}
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to read transcript");
                }
            }
        }
    }

    texts
}

/// Per-segment transcript text for display
pub async fn transcript_texts(pool: &SqlitePool, session_id: i64) -> Result<Vec<SegmentText>, ParseError> {
    let session = sessions::get_session(pool, session_id)
        .await?
        .ok_or(ParseError::SessionNotFound)?;
    let Some(dir) = session.session_dir else {
        return Ok(Vec::new());
    };

    let segments = segments::transcribed_segments(pool, session_id).await?;
    Ok(read_transcripts(Path::new(&dir), segments)
        .await
        .into_iter()
        .map(|(segment, text)| SegmentText {
            segment_number: segment.segment_number,
            text: text.trim().to_string(),
        })
        .collect())
}

/// Parse all completed transcripts of a session
///
/// # Arguments
/// * `session_id` - session to parse
/// * `run_by` - acting user, stored on the parse run
///
/// # Returns
/// Record totals for the new run
pub async fn parse_session(
    pool: &SqlitePool,
    session_id: i64,
    run_by: Option<i64>,
) -> Result<ParseSummary, ParseError> {
    let session = sessions::get_session(pool, session_id)
        .await?
        .ok_or(ParseError::SessionNotFound)?;

    let complete = segments::transcribed_segments(pool, session_id).await?;
    let session_dir = match session.session_dir {
        Some(dir) if !dir.is_empty() && !complete.is_empty() => dir,
        _ => return Err(ParseError::NoTranscripts),
    };

    let mut timeline = SegmentTimeline::new();
    for (segment, text) in read_transcripts(Path::new(&session_dir), complete).await {
        timeline.push(
            segment.segment_id,
            segment.segment_number,
            segment.started_at.as_deref().and_then(cg_common::time::parse_datetime),
            segment.duration_seconds.unwrap_or(0),
            &text,
        );
    }

    if timeline.text().trim().len() < MIN_TEXT_LENGTH {
        return Err(ParseError::TextTooShort);
    }

    let run_id = parse_runs::create_run(pool, session_id, run_by).await?;

    match run_extraction(pool, session_id, run_id, &timeline).await {
        Ok(summary) => {
            info!(
                session_id,
                run_id,
                total = summary.total_records,
                high = summary.high_confidence,
                "Parse run complete"
            );
            Ok(summary)
        }
        Err(e) => {
            let message = e.to_string();
            warn!(session_id, run_id, error = %message, "Parse run failed");
            parse_runs::fail_run(pool, run_id, &message).await?;
            Err(ParseError::Failed(message))
        }
    }
}

async fn run_extraction(
    pool: &SqlitePool,
    session_id: i64,
    run_id: i64,
    timeline: &SegmentTimeline,
) -> cg_common::Result<ParseSummary> {
    let index = ReferenceIndex::load(pool).await?;
    let extracted = extract_card_records(timeline, &index);

    records::replace_session_records(pool, session_id, run_id, &extracted).await?;

    let total = extracted.len() as i64;
    let high = extracted
        .iter()
        .filter(|r| ConfidenceBand::of(r.confidence) == ConfidenceBand::High)
        .count() as i64;

    parse_runs::complete_run(pool, run_id, total, high, total - high).await?;

    Ok(ParseSummary {
        run_id,
        total_records: total,
        high_confidence: high,
        low_confidence: total - high,
    })
}
