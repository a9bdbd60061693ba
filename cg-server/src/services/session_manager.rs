//! Session runtime: registry, manager task and worker launches
//!
//! A started session owns one manager task. The manager prepares the
//! archive directory, runs a recorder and a transcription worker side by
//! side, and watches for stop, cancel, the maximum duration and the
//! recorder finishing on its own:
//!
//! | Event | Recorder | Worker | Final status |
//! |-------|----------|--------|--------------|
//! | cancel | stopped | cancelled | `stopped` (`user_cancel`) |
//! | stop | stopped | drains | `complete` |
//! | max duration | stopped | drains | `complete` (`max_duration`) |
//! | recorder exits | - | drains | `complete` |
//!
//! Registry membership doubles as the per-session lock: a registered
//! session cannot be started or transcribed again until its task ends.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cg_common::config::ToolsConfig;
use cg_common::time::{now_local, to_db};

use super::recorder::{DockerRecorder, FfmpegRecorder, Recorder, RecordingContext};
use super::session_events;
use super::session_paths;
use super::transcriber::{Transcriber, WhisperCli};
use super::transcription_worker::{run_worker, WorkerContext, WorkerSettings, WorkerStats};
use crate::db::{sessions, settings as settings_db};
use crate::models::{AcquisitionMode, Session, SessionConfig, SessionStatus};

/// `stop_reason` is cut to this many characters
const MAX_STOP_REASON: usize = 100;

/// 100 ms polls spent waiting for a cancelled task before deleting
const PURGE_WAIT_POLLS: u32 = 100;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session has no archive directory")]
    NoSessionDir,

    #[error(transparent)]
    Common(#[from] cg_common::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stop and cancel signals for one running session
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    /// End recording; transcription finishes the queue
    pub stop: CancellationToken,
    /// End everything now
    pub cancel: CancellationToken,
}

/// Sessions with a live manager or worker task
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    handles: Arc<RwLock<HashMap<i64, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id`, or `None` if it already is
    pub async fn register(&self, session_id: i64) -> Option<SessionHandle> {
        let mut handles = self.handles.write().await;
        if handles.contains_key(&session_id) {
            return None;
        }
        let handle = SessionHandle::default();
        handles.insert(session_id, handle.clone());
        Some(handle)
    }

    pub async fn contains(&self, session_id: i64) -> bool {
        self.handles.read().await.contains_key(&session_id)
    }

    pub async fn get(&self, session_id: i64) -> Option<SessionHandle> {
        self.handles.read().await.get(&session_id).cloned()
    }

    pub async fn remove(&self, session_id: i64) {
        self.handles.write().await.remove(&session_id);
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Cancel every registered session
    pub async fn cancel_all(&self) {
        for handle in self.handles.read().await.values() {
            handle.cancel.cancel();
        }
    }
}

/// How the monitor loop ended
enum Ending {
    Cancelled,
    Stopped,
    MaxDuration,
    RecorderExited(Result<anyhow::Result<u32>, tokio::task::JoinError>),
}

/// Everything needed to run sessions: database, registry and tools
#[derive(Clone)]
pub struct SessionRuntime {
    pub pool: SqlitePool,
    pub registry: SessionRegistry,
    direct_recorder: Arc<dyn Recorder>,
    browser_recorder: Arc<dyn Recorder>,
    transcriber: Arc<dyn Transcriber>,
    pub worker_settings: WorkerSettings,
    /// Segment totals are refreshed this often while recording
    pub refresh_interval: Duration,
    /// Upper bound on recording time; `None` leaves the configured hours
    pub max_duration: Option<Duration>,
    pub tools: ToolsConfig,
}

impl SessionRuntime {
    /// Runtime backed by ffmpeg, docker and the Whisper CLI
    pub fn new(pool: SqlitePool, tools: ToolsConfig) -> Self {
        Self {
            direct_recorder: Arc::new(FfmpegRecorder::new(tools.ffmpeg.clone())),
            browser_recorder: Arc::new(DockerRecorder::new(
                tools.docker.clone(),
                tools.browser_recorder_image.clone(),
            )),
            transcriber: Arc::new(WhisperCli::new(tools.whisper.clone(), tools.whisper_model_dir.clone())),
            pool,
            registry: SessionRegistry::new(),
            worker_settings: WorkerSettings::default(),
            refresh_interval: Duration::from_secs(30),
            max_duration: None,
            tools,
        }
    }

    /// Runtime with caller-supplied components
    pub fn with_components(
        pool: SqlitePool,
        tools: ToolsConfig,
        recorder: Arc<dyn Recorder>,
        transcriber: Arc<dyn Transcriber>,
        worker_settings: WorkerSettings,
    ) -> Self {
        Self {
            pool,
            registry: SessionRegistry::new(),
            direct_recorder: Arc::clone(&recorder),
            browser_recorder: recorder,
            transcriber,
            worker_settings,
            refresh_interval: Duration::from_secs(30),
            max_duration: None,
            tools,
        }
    }

    pub async fn is_running(&self, session_id: i64) -> bool {
        self.registry.contains(session_id).await
    }

    /// Signal stop; false when no task is registered for the session
    pub async fn signal_stop(&self, session_id: i64) -> bool {
        match self.registry.get(session_id).await {
            Some(handle) => {
                handle.stop.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal cancel; false when no task is registered for the session
    pub async fn signal_cancel(&self, session_id: i64) -> bool {
        match self.registry.get(session_id).await {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Register the session and spawn its manager task
    ///
    /// The caller has already moved the session to `recording`.
    pub async fn launch_session(&self, session_id: i64) -> Result<JoinHandle<()>, RuntimeError> {
        let handle = self
            .registry
            .register(session_id)
            .await
            .ok_or(RuntimeError::AlreadyRunning)?;

        let runtime = self.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = runtime.manage_session(session_id, &handle).await {
                runtime.fail_session(session_id, &e.to_string()).await;
            }
            handle.cancel.cancel();
            runtime.registry.remove(session_id).await;
            info!(session_id, "Session manager finished");
        }))
    }

    /// [`launch_session`](Self::launch_session), returning the session to
    /// `scheduled` when no task could be started
    pub async fn launch_or_revert(&self, session_id: i64) -> Result<JoinHandle<()>, RuntimeError> {
        match self.launch_session(session_id).await {
            Ok(task) => Ok(task),
            Err(e) => {
                warn!(session_id, error = %e, "Session launch failed, back to scheduled");
                sessions::revert_to_scheduled(&self.pool, session_id).await?;
                Err(e)
            }
        }
    }

    /// Register the session and spawn a stand-alone transcription worker
    pub async fn launch_worker(&self, session_id: i64, model: String) -> Result<JoinHandle<()>, RuntimeError> {
        let session = sessions::get_session(&self.pool, session_id)
            .await?
            .ok_or(RuntimeError::SessionNotFound)?;
        let session_dir = session.session_dir.clone().ok_or(RuntimeError::NoSessionDir)?;
        let settings = settings_db::load_transcription_settings(&self.pool).await?;
        let config = SessionConfig::merge(&session, &settings);

        let handle = self
            .registry
            .register(session_id)
            .await
            .ok_or(RuntimeError::AlreadyRunning)?;

        let ctx = WorkerContext {
            pool: self.pool.clone(),
            session_id,
            session_dir: PathBuf::from(session_dir),
            model,
            threads: config.max_cpu_cores,
            low_priority: config.priority_mode == "low",
        };
        let runtime = self.clone();

        Ok(tokio::spawn(async move {
            let result = run_worker(
                ctx,
                Arc::clone(&runtime.transcriber),
                runtime.worker_settings.clone(),
                handle.cancel.clone(),
            )
            .await;
            if let Err(e) = result {
                session_events::error(&runtime.pool, session_id, "worker_fatal", &e.to_string()).await;
            }
            runtime.registry.remove(session_id).await;
        }))
    }

    /// Cancel any running task, then delete the archive directory and rows
    ///
    /// # Returns
    /// Number of files removed from disk
    pub async fn purge_session(&self, session: &Session) -> Result<u64, RuntimeError> {
        let session_id = session.session_id;
        if self.signal_cancel(session_id).await {
            // Give the manager a moment to wind down before its rows vanish
            for _ in 0..PURGE_WAIT_POLLS {
                if !self.registry.contains(session_id).await {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        let files = match session.session_dir.as_deref().filter(|d| !d.is_empty()) {
            Some(dir) => session_paths::remove_session_dir(Path::new(dir)).await?,
            None => 0,
        };
        sessions::delete_session(&self.pool, session_id).await?;
        info!(session_id, files, "Session deleted");

        Ok(files)
    }

    async fn fail_session(&self, session_id: i64, message: &str) {
        session_events::error(&self.pool, session_id, "manager_error", message).await;

        let reason = stop_reason_text(message);
        if let Err(e) = sessions::finish_session(
            &self.pool,
            session_id,
            SessionStatus::Error,
            Some(&reason),
            &to_db(&now_local()),
        )
        .await
        {
            warn!(session_id, error = %e, "Failed to record session error");
        }
    }

    async fn manage_session(&self, session_id: i64, handle: &SessionHandle) -> Result<(), RuntimeError> {
        let pool = &self.pool;
        let session = sessions::get_session(pool, session_id)
            .await?
            .ok_or(RuntimeError::SessionNotFound)?;
        let settings = settings_db::load_transcription_settings(pool).await?;
        let config = SessionConfig::merge(&session, &settings);

        session_events::info(
            pool,
            session_id,
            "manager_started",
            &format!("Manager started for session {}", session_id),
        )
        .await;

        let now = now_local();
        let dir = session_paths::session_dir(
            &config.base_archive_dir,
            &config.folder_structure,
            session_id,
            &session.auction_name,
            &now,
        );
        session_paths::create_session_dir(&dir, &session, &config, &now).await?;
        let dir_text = dir.to_string_lossy().into_owned();
        sessions::set_session_dir(pool, session_id, &dir_text).await?;
        session_events::info(pool, session_id, "dir_created", &format!("Session directory: {}", dir_text)).await;

        // Child tokens: cancelling the session tears both down
        let recorder_stop = handle.cancel.child_token();
        let worker_cancel = handle.cancel.child_token();

        let recorder = match config.mode() {
            AcquisitionMode::DirectStream => {
                session_events::info(pool, session_id, "recorder_launching", "Launching audio recorder").await;
                Arc::clone(&self.direct_recorder)
            }
            AcquisitionMode::BrowserAutomation => {
                session_events::info(
                    pool,
                    session_id,
                    "recorder_launching",
                    "Launching browser automation recorder (Docker)",
                )
                .await;
                Arc::clone(&self.browser_recorder)
            }
        };
        let recording = RecordingContext {
            pool: pool.clone(),
            session_id,
            stream_url: session.auction_url.clone(),
            session_dir: dir.clone(),
            config: config.clone(),
        };
        let stop = recorder_stop.clone();
        let mut recorder_task = tokio::spawn(async move { recorder.record(&recording, stop).await });

        session_events::info(pool, session_id, "worker_launching", "Launching transcription worker").await;
        let mut worker_task = tokio::spawn(run_worker(
            WorkerContext {
                pool: pool.clone(),
                session_id,
                session_dir: dir.clone(),
                model: config.whisper_model.clone(),
                threads: config.max_cpu_cores,
                low_priority: config.priority_mode == "low",
            },
            Arc::clone(&self.transcriber),
            self.worker_settings.clone(),
            worker_cancel,
        ));

        let configured = Duration::from_secs(config.max_duration_seconds());
        let limit = self.max_duration.map_or(configured, |cap| cap.min(configured));
        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);
        let mut refresh = tokio::time::interval(self.refresh_interval);
        refresh.tick().await;

        let ending = loop {
            tokio::select! {
                biased;
                _ = handle.cancel.cancelled() => break Ending::Cancelled,
                _ = handle.stop.cancelled() => break Ending::Stopped,
                _ = &mut deadline => break Ending::MaxDuration,
                result = &mut recorder_task => break Ending::RecorderExited(result),
                _ = refresh.tick() => {
                    if let Err(e) = sessions::refresh_totals(pool, session_id).await {
                        warn!(session_id, error = %e, "Failed to refresh segment totals");
                    }
                }
            }
        };

        let stop_reason = match ending {
            Ending::Cancelled => {
                session_events::warning(pool, session_id, "cancel_received", "Cancel signal received").await;
                recorder_stop.cancel();
                log_recorder_result(recorder_task.await);
                log_worker_result((&mut worker_task).await);
                sessions::finish_session(
                    pool,
                    session_id,
                    SessionStatus::Stopped,
                    Some("user_cancel"),
                    &to_db(&now_local()),
                )
                .await?;
                session_events::info(pool, session_id, "session_cancelled", "Session cancelled by user").await;
                None
            }
            Ending::Stopped => {
                session_events::info(pool, session_id, "stop_received", "Stop signal received, stopping recorder").await;
                recorder_stop.cancel();
                log_recorder_result(recorder_task.await);
                Some((None, "Session completed after stop"))
            }
            Ending::MaxDuration => {
                session_events::warning(
                    pool,
                    session_id,
                    "max_duration",
                    &format!("Max duration reached ({}h)", config.max_session_hours),
                )
                .await;
                recorder_stop.cancel();
                log_recorder_result(recorder_task.await);
                Some((Some("max_duration"), "Session completed (max duration)"))
            }
            Ending::RecorderExited(result) => {
                match result {
                    Ok(Ok(_)) => {
                        session_events::info(pool, session_id, "recorder_exited", "Recorder finished normally").await
                    }
                    Ok(Err(e)) => {
                        session_events::warning(pool, session_id, "recorder_exited", &format!("Recorder failed: {:#}", e))
                            .await
                    }
                    Err(e) => {
                        session_events::warning(pool, session_id, "recorder_exited", &format!("Recorder task failed: {}", e))
                            .await
                    }
                }
                Some((None, "Session completed"))
            }
        };

        if let Some((reason, message)) = stop_reason {
            sessions::set_status(pool, session_id, SessionStatus::Processing).await?;
            session_events::info(pool, session_id, "processing", "Recording stopped, transcription continues").await;
            log_worker_result(worker_task.await);

            if handle.cancel.is_cancelled() {
                sessions::finish_session(
                    pool,
                    session_id,
                    SessionStatus::Stopped,
                    Some("user_cancel"),
                    &to_db(&now_local()),
                )
                .await?;
                session_events::info(pool, session_id, "session_cancelled", "Session cancelled by user").await;
            } else {
                sessions::finish_session(pool, session_id, SessionStatus::Complete, reason, &to_db(&now_local()))
                    .await?;
                session_events::info(pool, session_id, "session_complete", message).await;
            }
        }

        match session_paths::write_master_transcript(&dir, &session, &now_local()).await {
            Ok(_) => session_events::info(pool, session_id, "master_transcript", "Master transcript generated").await,
            Err(e) => session_events::warning(pool, session_id, "master_transcript_error", &e.to_string()).await,
        }
        sessions::refresh_totals(pool, session_id).await?;

        Ok(())
    }
}

/// Error message cut to fit `stop_reason`
fn stop_reason_text(message: &str) -> String {
    message.chars().take(MAX_STOP_REASON).collect()
}

fn log_recorder_result(result: Result<anyhow::Result<u32>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(segments)) => info!(segments, "Recorder stopped"),
        Ok(Err(e)) => warn!(error = %e, "Recorder failed"),
        Err(e) => warn!(error = %e, "Recorder task failed"),
    }
}

fn log_worker_result(result: Result<cg_common::Result<WorkerStats>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(stats)) => info!(
            transcribed = stats.transcribed,
            skipped = stats.skipped,
            failed = stats.failed,
            "Worker finished"
        ),
        Ok(Err(e)) => warn!(error = %e, "Worker failed"),
        Err(e) => warn!(error = %e, "Worker task failed"),
    }
}
