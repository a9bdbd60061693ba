//! Global transcription settings row

use cg_common::time::{now_local, to_db};
use cg_common::Result;
use sqlx::SqlitePool;

use crate::models::TranscriptionSettings;

const SETTINGS_COLUMNS: &str = r#"
    segment_length_minutes, sample_rate, audio_channels, audio_format,
    silence_threshold_dbfs, silence_timeout_minutes, max_session_hours,
    max_cpu_cores, whisper_model, priority_mode, base_archive_dir,
    folder_structure, min_free_disk_gb, acquisition_mode,
    audio_retention_days, updated_by, updated_at
"#;

/// Load row 1, falling back to defaults if it is missing
pub async fn load_transcription_settings(pool: &SqlitePool) -> Result<TranscriptionSettings> {
    let sql = format!(
        "SELECT {} FROM transcription_settings WHERE setting_id = 1",
        SETTINGS_COLUMNS
    );
    let row = sqlx::query_as::<_, TranscriptionSettings>(&sql)
        .fetch_optional(pool)
        .await?;

    Ok(row.unwrap_or_default())
}

/// Replace row 1 and stamp `updated_at`
pub async fn save_transcription_settings(
    pool: &SqlitePool,
    settings: &TranscriptionSettings,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transcription_settings (
            setting_id, segment_length_minutes, sample_rate, audio_channels, audio_format,
            silence_threshold_dbfs, silence_timeout_minutes, max_session_hours,
            max_cpu_cores, whisper_model, priority_mode, base_archive_dir,
            folder_structure, min_free_disk_gb, acquisition_mode,
            audio_retention_days, updated_by, updated_at
        ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(setting_id) DO UPDATE SET
            segment_length_minutes = excluded.segment_length_minutes,
            sample_rate = excluded.sample_rate,
            audio_channels = excluded.audio_channels,
            audio_format = excluded.audio_format,
            silence_threshold_dbfs = excluded.silence_threshold_dbfs,
            silence_timeout_minutes = excluded.silence_timeout_minutes,
            max_session_hours = excluded.max_session_hours,
            max_cpu_cores = excluded.max_cpu_cores,
            whisper_model = excluded.whisper_model,
            priority_mode = excluded.priority_mode,
            base_archive_dir = excluded.base_archive_dir,
            folder_structure = excluded.folder_structure,
            min_free_disk_gb = excluded.min_free_disk_gb,
            acquisition_mode = excluded.acquisition_mode,
            audio_retention_days = excluded.audio_retention_days,
            updated_by = excluded.updated_by,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(settings.segment_length_minutes)
    .bind(&settings.sample_rate)
    .bind(&settings.audio_channels)
    .bind(&settings.audio_format)
    .bind(settings.silence_threshold_dbfs)
    .bind(settings.silence_timeout_minutes)
    .bind(settings.max_session_hours)
    .bind(settings.max_cpu_cores)
    .bind(&settings.whisper_model)
    .bind(&settings.priority_mode)
    .bind(&settings.base_archive_dir)
    .bind(&settings.folder_structure)
    .bind(settings.min_free_disk_gb)
    .bind(&settings.acquisition_mode)
    .bind(settings.audio_retention_days)
    .bind(settings.updated_by)
    .bind(to_db(&now_local()))
    .execute(pool)
    .await?;

    Ok(())
}
