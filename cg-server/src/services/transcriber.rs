//! Speech-to-text for recorded segments
//!
//! The production transcriber shells out to the Whisper CLI. The worker only
//! sees the [`Transcriber`] trait, so tests drive it with a stub.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::models::settings::WHISPER_MODELS;

pub const DEFAULT_MODEL: &str = "base";

/// Cached model preference when the requested one is not downloaded
const MODELS_LARGEST_FIRST: &[&str] = &["large", "medium", "small", "base", "tiny"];

/// One segment to transcribe
#[derive(Debug, Clone)]
pub struct TranscribeRequest<'a> {
    pub audio: &'a Path,
    /// Directory receiving `<audio stem>.txt`
    pub output_dir: &'a Path,
    pub model: &'a str,
    pub threads: i64,
    pub low_priority: bool,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one file, writing the transcript next to the others
    ///
    /// # Returns
    /// The transcript text
    async fn transcribe(&self, request: &TranscribeRequest<'_>) -> anyhow::Result<String>;
}

/// Whisper command line tool
pub struct WhisperCli {
    program: String,
    model_dir: Option<PathBuf>,
}

impl WhisperCli {
    pub fn new(program: impl Into<String>, model_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            model_dir,
        }
    }

    fn command(&self, request: &TranscribeRequest<'_>) -> Command {
        let mut cmd = if request.low_priority {
            let mut nice = Command::new("nice");
            nice.args(["-n", "10"]).arg(&self.program);
            nice
        } else {
            Command::new(&self.program)
        };

        cmd.arg(request.audio)
            .args(["--model", request.model])
            .args(["--language", "en"])
            .args(["--fp16", "False"])
            .args(["--verbose", "False"])
            .args(["--output_format", "txt"])
            .arg("--output_dir")
            .arg(request.output_dir)
            .args(["--threads", &request.threads.max(1).to_string()]);
        if let Some(dir) = &self.model_dir {
            cmd.arg("--model_dir").arg(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Last `max` characters of process output
fn tail(text: &str, max: usize) -> &str {
    match text.char_indices().rev().nth(max.saturating_sub(1)) {
        Some((i, _)) => &text[i..],
        None => text,
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, request: &TranscribeRequest<'_>) -> anyhow::Result<String> {
        let output = self
            .command(request)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Whisper exited with {}: {}", output.status, tail(stderr.trim(), 300)));
        }

        let stem = request
            .audio
            .file_stem()
            .ok_or_else(|| anyhow!("Audio path has no file name"))?;
        let transcript = request.output_dir.join(stem).with_extension("txt");
        let text = tokio::fs::read_to_string(&transcript)
            .await
            .with_context(|| format!("Whisper produced no transcript at {}", transcript.display()))?;

        let text = text.trim().to_string();
        tokio::fs::write(&transcript, format!("{}\n", text)).await?;
        Ok(text)
    }
}

/// Pick the Whisper model for a run
///
/// Preference is the requested model, then the configured one, then
/// [`DEFAULT_MODEL`]. When a model cache directory exists but lacks
/// `<model>.pt`, the largest cached model is used instead.
pub fn choose_model(requested: Option<&str>, configured: &str, model_dir: Option<&Path>) -> String {
    let known = |m: &&str| WHISPER_MODELS.contains(m);
    let preferred = requested
        .map(str::trim)
        .filter(known)
        .or_else(|| Some(configured.trim()).filter(known))
        .unwrap_or(DEFAULT_MODEL);

    let Some(dir) = model_dir.filter(|d| d.is_dir()) else {
        return preferred.to_string();
    };
    if dir.join(format!("{}.pt", preferred)).exists() {
        return preferred.to_string();
    }

    MODELS_LARGEST_FIRST
        .iter()
        .find(|m| dir.join(format!("{}.pt", m)).exists())
        .unwrap_or(&DEFAULT_MODEL)
        .to_string()
}
