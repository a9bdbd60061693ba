//! Session archive layout
//!
//! ```text
//! {base}/{YYYY}/{YYYYMMDD}_S{id}_{safe_name}/     (year-based)
//! {base}/{YYYYMMDD}_S{id}_{safe_name}/            (flat)
//!     session.json
//!     audio/{YYYYMMDD}_Session{id}_SEG{NNN}.{fmt}
//!     transcripts/{audio stem}.txt
//!     transcripts/{YYYYMMDD}_{safe_name}_FULL.txt
//! ```

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::{Session, SessionConfig};

pub const AUDIO_DIR: &str = "audio";
pub const TRANSCRIPTS_DIR: &str = "transcripts";
pub const METADATA_FILE: &str = "session.json";
const MASTER_SUFFIX: &str = "_FULL";

/// Auction name reduced to a file-system safe token
///
/// Keeps alphanumerics, `-`, `_` and spaces, trims, then turns spaces into `_`.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// Directory for one session under the archive base
pub fn session_dir(
    base: &str,
    folder_structure: &str,
    session_id: i64,
    auction_name: &str,
    now: &NaiveDateTime,
) -> PathBuf {
    let base = Path::new(base.trim_end_matches('/'));
    let leaf = format!(
        "{}_S{}_{}",
        cg_common::time::date_stamp(now),
        session_id,
        safe_name(auction_name)
    );

    if folder_structure == "year-based" {
        base.join(now.format("%Y").to_string()).join(leaf)
    } else {
        base.join(leaf)
    }
}

pub fn audio_dir(session_dir: &Path) -> PathBuf {
    session_dir.join(AUDIO_DIR)
}

pub fn transcripts_dir(session_dir: &Path) -> PathBuf {
    session_dir.join(TRANSCRIPTS_DIR)
}

/// `{YYYYMMDD}_Session{id}_SEG{NNN}.{fmt}`
pub fn segment_filename(now: &NaiveDateTime, session_id: i64, segment_number: i64, format: &str) -> String {
    format!(
        "{}_Session{}_SEG{:03}.{}",
        cg_common::time::date_stamp(now),
        session_id,
        segment_number,
        format
    )
}

/// Transcript file name for an audio file: same stem, `.txt`
pub fn transcript_filename(audio_filename: &str) -> String {
    let stem = Path::new(audio_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(audio_filename);
    format!("{}.txt", stem)
}

pub fn master_transcript_filename(now: &NaiveDateTime, auction_name: &str) -> String {
    format!(
        "{}_{}{}.txt",
        cg_common::time::date_stamp(now),
        safe_name(auction_name),
        MASTER_SUFFIX
    )
}

#[derive(Debug, Serialize)]
struct SessionMetadata<'a> {
    session_id: i64,
    auction_name: &'a str,
    auction_url: &'a str,
    scheduled_start: &'a str,
    config: &'a SessionConfig,
    created_at: String,
}

/// Create the archive directories and write `session.json`
pub async fn create_session_dir(
    dir: &Path,
    session: &Session,
    config: &SessionConfig,
    now: &NaiveDateTime,
) -> cg_common::Result<()> {
    tokio::fs::create_dir_all(audio_dir(dir)).await?;
    tokio::fs::create_dir_all(transcripts_dir(dir)).await?;

    let metadata = SessionMetadata {
        session_id: session.session_id,
        auction_name: &session.auction_name,
        auction_url: &session.auction_url,
        scheduled_start: &session.scheduled_start,
        config,
        created_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    };
    tokio::fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(&metadata)?).await?;

    Ok(())
}

/// Join every segment transcript into the master transcript
///
/// Segment files are taken in name order, which is recording order. Returns
/// the path written, or `None` when the session has no transcripts folder.
pub async fn write_master_transcript(
    dir: &Path,
    session: &Session,
    now: &NaiveDateTime,
) -> cg_common::Result<Option<PathBuf>> {
    let tx_dir = transcripts_dir(dir);
    if !tokio::fs::try_exists(&tx_dir).await? {
        return Ok(None);
    }

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(&tx_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".txt") && !name.contains(MASTER_SUFFIX) {
            names.push(name);
        }
    }
    names.sort();

    let date = cg_common::time::date_stamp(now);
    let mut out = format!(
        "# Transcription: {}\n# Date: {}\n# Session ID: {}\n\n",
        session.auction_name, date, session.session_id
    );
    for name in &names {
        let text = tokio::fs::read_to_string(tx_dir.join(name)).await?;
        out.push_str(&format!("\n--- {} ---\n\n", name));
        out.push_str(&text);
        out.push('\n');
    }

    let path = tx_dir.join(master_transcript_filename(now, &session.auction_name));
    tokio::fs::write(&path, out).await?;
    Ok(Some(path))
}

/// Remove a session directory tree, returning the number of files deleted
///
/// A missing directory counts as zero files.
pub async fn remove_session_dir(dir: &Path) -> cg_common::Result<u64> {
    if !tokio::fs::try_exists(dir).await? {
        return Ok(0);
    }

    let mut files = 0u64;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                files += 1;
            }
        }
    }

    tokio::fs::remove_dir_all(dir).await?;
    Ok(files)
}
