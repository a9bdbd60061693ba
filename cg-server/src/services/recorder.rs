//! Live stream audio capture
//!
//! [`FfmpegRecorder`] records the auction stream one segment at a time:
//! each segment is its own ffmpeg run, limited with `-t`, so a dropped
//! stream costs one segment rather than the session. A run that dies within
//! the connection check window is a failed connect, not a segment.
//!
//! [`DockerRecorder`] runs the browser-automation recorder image, which
//! writes segment files into `audio/`; they are registered as they appear.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cg_common::time::{now_local, to_db};

use super::{env_check, session_events, session_paths};
use crate::db::{segments, sessions};
use crate::models::SessionConfig;

const BYTES_PER_GB: u64 = 1_073_741_824;
const GRACEFUL_STOP: Duration = Duration::from_secs(5);
const WAV_HEADER_BYTES: u64 = 44;

/// What a recorder needs to know about its session
#[derive(Debug, Clone)]
pub struct RecordingContext {
    pub pool: SqlitePool,
    pub session_id: i64,
    pub stream_url: String,
    pub session_dir: PathBuf,
    pub config: SessionConfig,
}

/// Captures audio into `{session_dir}/audio` and registers segment rows
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Record until `stop` fires or the source gives out
    ///
    /// # Returns
    /// Number of segments recorded
    async fn record(&self, ctx: &RecordingContext, stop: CancellationToken) -> anyhow::Result<u32>;
}

/// Sleep for `duration` unless stopped first; true when stopped
async fn pause(stop: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = stop.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Linear back-off capped at `max_secs`
pub fn backoff(failures: u32, step_secs: u64, max_secs: u64) -> Duration {
    Duration::from_secs((step_secs * failures as u64).min(max_secs))
}

/// Ask ffmpeg to finish the file (`q` on stdin), killing it if it lingers
async fn finish_child(child: &mut Child) -> Option<ExitStatus> {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(b"q").await {
            debug!(error = %e, "ffmpeg stdin closed before quit request");
        }
    }

    match tokio::time::timeout(GRACEFUL_STOP, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        _ => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill ffmpeg");
            }
            None
        }
    }
}

enum ConnectCheck {
    Connected,
    Exited,
    Stopped,
}

/// Connection retry policy for [`FfmpegRecorder`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// ffmpeg must stay up this long to count as connected
    pub connect_check: Duration,
    pub max_connect_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_check: Duration::from_secs(5),
            max_connect_retries: 10,
        }
    }
}

/// Direct stream capture with ffmpeg
pub struct FfmpegRecorder {
    ffmpeg: String,
    policy: RetryPolicy,
}

impl FfmpegRecorder {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn spawn(&self, ctx: &RecordingContext, output: &Path) -> std::io::Result<Child> {
        Command::new(&self.ffmpeg)
            .args(ffmpeg_args(&ctx.stream_url, &ctx.config, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Arguments for one segment of `config.segment_seconds()` length
pub fn ffmpeg_args(stream_url: &str, config: &SessionConfig, output: &Path) -> Vec<String> {
    let codec = if config.audio_format == "flac" { "flac" } else { "pcm_s16le" };
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        stream_url.to_string(),
        "-t".to_string(),
        config.segment_seconds().to_string(),
        "-ar".to_string(),
        config.sample_rate.clone(),
        "-ac".to_string(),
        config.channel_count().to_string(),
        "-vn".to_string(),
        "-codec:a".to_string(),
        codec.to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

async fn file_size(path: &Path) -> i64 {
    tokio::fs::metadata(path).await.map(|m| m.len() as i64).unwrap_or(0)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial segment");
        }
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    async fn record(&self, ctx: &RecordingContext, stop: CancellationToken) -> anyhow::Result<u32> {
        let pool = &ctx.pool;
        let sid = ctx.session_id;
        let audio = session_paths::audio_dir(&ctx.session_dir);
        let segment_seconds = ctx.config.segment_seconds();
        let min_free = ctx.config.min_free_disk_gb.max(0) as u64 * BYTES_PER_GB;
        let max_retries = self.policy.max_connect_retries;

        session_events::info(pool, sid, "recorder_started", &format!("Recording from: {}", ctx.stream_url)).await;

        let mut segment_number = segments::next_segment_number(pool, sid).await? - 1;
        let mut recorded = 0u32;
        let mut failures = 0u32;

        while !stop.is_cancelled() {
            if let Some(free) = env_check::disk_free_bytes(&audio).await {
                if free < min_free {
                    session_events::warning(
                        pool,
                        sid,
                        "low_disk",
                        &format!(
                            "Low disk space: {:.1} GB free (min {} GB)",
                            free as f64 / BYTES_PER_GB as f64,
                            ctx.config.min_free_disk_gb
                        ),
                    )
                    .await;
                    break;
                }
            }

            let next = segment_number + 1;
            let now = now_local();
            let filename = session_paths::segment_filename(&now, sid, next, &ctx.config.audio_format);
            let path = audio.join(&filename);
            let started = Instant::now();

            let mut child = match self.spawn(ctx, &path) {
                Ok(child) => child,
                Err(e) => {
                    session_events::error(pool, sid, "ffmpeg_launch_error", &format!("Failed to launch ffmpeg: {}", e))
                        .await;
                    failures += 1;
                    if failures >= max_retries {
                        session_events::error(
                            pool,
                            sid,
                            "connect_failed",
                            &format!("Failed to connect after {} attempts", max_retries),
                        )
                        .await;
                        break;
                    }
                    if pause(&stop, backoff(failures, 5, 30)).await {
                        break;
                    }
                    continue;
                }
            };

            let check = tokio::select! {
                _ = child.wait() => ConnectCheck::Exited,
                _ = tokio::time::sleep(self.policy.connect_check) => ConnectCheck::Connected,
                _ = stop.cancelled() => ConnectCheck::Stopped,
            };

            match check {
                ConnectCheck::Stopped => {
                    finish_child(&mut child).await;
                    remove_partial(&path).await;
                    break;
                }
                ConnectCheck::Exited => {
                    failures += 1;
                    remove_partial(&path).await;
                    if failures >= max_retries {
                        session_events::error(
                            pool,
                            sid,
                            "connect_failed",
                            &format!("Stream connection failed {} times, giving up", max_retries),
                        )
                        .await;
                        break;
                    }
                    let wait = backoff(failures, 10, 60);
                    session_events::warning(
                        pool,
                        sid,
                        "connect_retry",
                        &format!(
                            "Stream connect failed (attempt {}/{}), retrying in {}s",
                            failures,
                            max_retries,
                            wait.as_secs()
                        ),
                    )
                    .await;
                    if pause(&stop, wait).await {
                        break;
                    }
                    continue;
                }
                ConnectCheck::Connected => {}
            }

            failures = 0;
            segment_number = next;
            let segment_id = segments::insert_recording(pool, sid, next, &filename, &to_db(&now)).await?;
            session_events::info(
                pool,
                sid,
                "segment_started",
                &format!("Recording segment {}: {}", next, filename),
            )
            .await;

            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = stop.cancelled() => None,
            };
            let status = match exited {
                Some(Ok(status)) => Some(status),
                Some(Err(e)) => {
                    warn!(session_id = sid, error = %e, "Failed to wait for ffmpeg");
                    None
                }
                None => finish_child(&mut child).await,
            };

            let duration = started.elapsed().as_secs();
            let size = file_size(&path).await;
            segments::complete_recording(pool, segment_id, duration as i64, size, &to_db(&now_local())).await?;
            sessions::refresh_totals(pool, sid).await?;
            recorded += 1;
            session_events::info(
                pool,
                sid,
                "segment_complete",
                &format!("Segment {} complete: {}s, {} bytes", next, duration, size),
            )
            .await;

            if stop.is_cancelled() {
                break;
            }

            let clean_exit = status.map_or(false, |s| s.success());
            if duration < segment_seconds / 2 && !clean_exit {
                failures += 1;
                if failures >= max_retries {
                    session_events::warning(pool, sid, "stream_dropped", "Stream dropped too many times, stopping")
                        .await;
                    break;
                }
                let wait = backoff(failures, 5, 30);
                session_events::warning(
                    pool,
                    sid,
                    "stream_interrupted",
                    &format!(
                        "Segment ended early ({}s vs {}s expected), retrying in {}s",
                        duration,
                        segment_seconds,
                        wait.as_secs()
                    ),
                )
                .await;
                if pause(&stop, wait).await {
                    break;
                }
            }
        }

        session_events::info(
            pool,
            sid,
            "recorder_stopped",
            &format!("Recorder finished after {} segments", recorded),
        )
        .await;

        Ok(recorded)
    }
}

/// Container name used for a session's browser recorder
pub fn container_name(session_id: i64) -> String {
    format!("cg_tx_recorder_{}", session_id)
}

/// Seconds of audio in a file, from the PCM size for WAV
pub fn estimate_duration(config: &SessionConfig, size_bytes: u64) -> i64 {
    let rate: u64 = config.sample_rate.parse().unwrap_or(16_000);
    if config.audio_format == "wav" && rate > 0 {
        let bytes_per_sec = rate * config.channel_count() as u64 * 2;
        (size_bytes.saturating_sub(WAV_HEADER_BYTES) / bytes_per_sec) as i64
    } else {
        config.segment_seconds() as i64
    }
}

/// Names ready for registration, in name order
///
/// The newest file may still be growing and is held back until `final_pass`.
pub fn settled_files(mut names: Vec<String>, final_pass: bool) -> Vec<String> {
    names.sort();
    if !final_pass {
        names.pop();
    }
    names
}

enum ContainerEvent {
    Exited(Option<ExitStatus>),
    Stop,
    Scan,
}

/// Browser-automation capture through the recorder container
pub struct DockerRecorder {
    docker: String,
    image: String,
    scan_interval: Duration,
}

impl DockerRecorder {
    pub fn new(docker: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            docker: docker.into(),
            image: image.into(),
            scan_interval: Duration::from_secs(15),
        }
    }

    async fn stop_container(&self, session_id: i64) {
        let name = container_name(session_id);
        let stopped = tokio::time::timeout(
            Duration::from_secs(20),
            Command::new(&self.docker).args(["stop", "-t", "10", &name]).output(),
        )
        .await;

        if !matches!(stopped, Ok(Ok(ref out)) if out.status.success()) {
            if let Err(e) = Command::new(&self.docker).args(["kill", &name]).output().await {
                warn!(session_id, error = %e, "Failed to kill recorder container");
            }
        }
    }

    /// Register settled audio files not seen before; returns how many
    async fn register_new(
        &self,
        ctx: &RecordingContext,
        seen: &mut HashSet<String>,
        final_pass: bool,
    ) -> anyhow::Result<u32> {
        let audio = session_paths::audio_dir(&ctx.session_dir);
        let suffix = format!(".{}", ctx.config.audio_format);

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&audio).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&suffix) && !seen.contains(&name) {
                names.push(name);
            }
        }

        let mut registered = 0;
        for name in settled_files(names, final_pass) {
            let size = tokio::fs::metadata(audio.join(&name)).await?.len();
            let duration = estimate_duration(&ctx.config, size);
            let now = to_db(&now_local());
            if segments::register_completed_audio(&ctx.pool, ctx.session_id, &name, size as i64, duration, &now)
                .await?
            {
                registered += 1;
                session_events::info(
                    &ctx.pool,
                    ctx.session_id,
                    "segment_complete",
                    &format!("Segment registered: {} ({}s, {} bytes)", name, duration, size),
                )
                .await;
            }
            seen.insert(name);
        }

        if registered > 0 {
            sessions::refresh_totals(&ctx.pool, ctx.session_id).await?;
        }
        Ok(registered)
    }
}

#[async_trait]
impl Recorder for DockerRecorder {
    async fn record(&self, ctx: &RecordingContext, stop: CancellationToken) -> anyhow::Result<u32> {
        let sid = ctx.session_id;
        let audio = session_paths::audio_dir(&ctx.session_dir);
        let config_json = serde_json::to_string(&ctx.config)?;

        let mut child = Command::new(&self.docker)
            .arg("run")
            .arg("--rm")
            .args(["--name", &container_name(sid)])
            .args(["--network", "host"])
            .arg("--shm-size=512m")
            .arg("-v")
            .arg(format!("{}:/output", audio.display()))
            .arg(&self.image)
            .args(["--session-id", &sid.to_string()])
            .args(["--url", &ctx.stream_url])
            .args(["--config", &config_json])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut seen = HashSet::new();
        let mut registered = 0;
        let mut ticker = tokio::time::interval(self.scan_interval);

        let status = loop {
            let event = tokio::select! {
                status = child.wait() => ContainerEvent::Exited(status.ok()),
                _ = stop.cancelled() => ContainerEvent::Stop,
                _ = ticker.tick() => ContainerEvent::Scan,
            };

            match event {
                ContainerEvent::Exited(status) => break status,
                ContainerEvent::Stop => {
                    self.stop_container(sid).await;
                    break child.wait().await.ok();
                }
                ContainerEvent::Scan => {
                    registered += self.register_new(ctx, &mut seen, false).await?;
                }
            }
        };

        registered += self.register_new(ctx, &mut seen, true).await?;

        match status {
            Some(s) if s.success() || stop.is_cancelled() => {}
            Some(s) => {
                session_events::warning(
                    &ctx.pool,
                    sid,
                    "recorder_exited",
                    &format!("Recorder container exited with {}", s),
                )
                .await;
            }
            None => {}
        }

        Ok(registered)
    }
}
