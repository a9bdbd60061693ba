//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date:
//! tables are created with `CREATE TABLE IF NOT EXISTS`, versioned migrations
//! run next, and default rows are inserted last. Every step is idempotent.

use crate::db::settings::{CLEANUP_INTERVAL_SETTING, SCHEDULER_INTERVAL_SETTING};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open the database at `db_path`, creating file and schema when missing
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables, run migrations and insert default rows
///
/// Exposed separately so tests can prepare in-memory pools.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;

    // Reference tables used by the transcript parser
    create_teams_table(pool).await?;
    create_players_table(pool).await?;
    create_player_nicknames_table(pool).await?;
    create_card_makers_table(pool).await?;
    create_card_styles_table(pool).await?;
    create_card_specialties_table(pool).await?;

    // Transcription pipeline
    create_transcription_settings_table(pool).await?;
    create_transcription_sessions_table(pool).await?;
    create_transcription_segments_table(pool).await?;
    create_transcription_logs_table(pool).await?;
    create_transcription_parse_runs_table(pool).await?;
    create_transcription_records_table(pool).await?;

    // Finance
    create_livestreams_table(pool).await?;
    create_auction_line_items_table(pool).await?;
    create_paypal_transactions_table(pool).await?;
    create_paypal_allocations_table(pool).await?;
    create_ebay_orders_table(pool).await?;
    create_ebay_order_items_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Key/value service settings (scheduler key, cleanup bookkeeping)
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, SCHEDULER_INTERVAL_SETTING, "60").await?;
    ensure_setting(pool, CLEANUP_INTERVAL_SETTING, "3600").await?;

    // The single global transcription settings row; column defaults apply
    sqlx::query("INSERT OR IGNORE INTO transcription_settings (setting_id) VALUES (1)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Insert a setting only when the key is absent
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!("Initialized setting {} = {}", key, default_value);
    }

    Ok(())
}

async fn create_teams_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_name TEXT NOT NULL,
            abbreviation TEXT,
            mlb_id INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_players_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            player_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            current_team_id INTEGER REFERENCES teams(team_id) ON DELETE SET NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            popularity_score INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_player_nicknames_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS player_nicknames (
            nickname_id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players(player_id) ON DELETE CASCADE,
            nickname TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_card_makers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS card_makers (
            maker_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_card_styles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS card_styles (
            style_id INTEGER PRIMARY KEY AUTOINCREMENT,
            style_name TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_card_specialties_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS card_specialties (
            specialty_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-row global configuration for recording and transcription
pub async fn create_transcription_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_settings (
            setting_id INTEGER PRIMARY KEY CHECK (setting_id = 1),
            segment_length_minutes INTEGER NOT NULL DEFAULT 15,
            sample_rate TEXT NOT NULL DEFAULT '16000',
            audio_channels TEXT NOT NULL DEFAULT 'mono',
            audio_format TEXT NOT NULL DEFAULT 'wav',
            silence_threshold_dbfs INTEGER NOT NULL DEFAULT -48,
            silence_timeout_minutes INTEGER NOT NULL DEFAULT 10,
            max_session_hours INTEGER NOT NULL DEFAULT 10,
            max_cpu_cores INTEGER NOT NULL DEFAULT 2,
            whisper_model TEXT NOT NULL DEFAULT 'base',
            priority_mode TEXT NOT NULL DEFAULT 'low',
            base_archive_dir TEXT NOT NULL DEFAULT '/volume1/auction_archive/',
            folder_structure TEXT NOT NULL DEFAULT 'year-based',
            min_free_disk_gb INTEGER NOT NULL DEFAULT 5,
            acquisition_mode TEXT NOT NULL DEFAULT 'direct_stream',
            audio_retention_days INTEGER NOT NULL DEFAULT 30,
            updated_by INTEGER,
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_transcription_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_sessions (
            session_id INTEGER PRIMARY KEY AUTOINCREMENT,
            auction_name TEXT NOT NULL,
            auction_url TEXT NOT NULL,
            scheduled_start TEXT NOT NULL,
            actual_start_time TEXT,
            end_time TEXT,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK (status IN ('scheduled', 'recording', 'processing', 'complete', 'stopped', 'error')),
            stop_reason TEXT,
            session_dir TEXT,
            total_segments INTEGER NOT NULL DEFAULT 0,
            total_duration_sec INTEGER NOT NULL DEFAULT 0,
            override_segment_length INTEGER,
            override_silence_timeout INTEGER,
            override_max_duration INTEGER,
            override_cpu_limit INTEGER,
            override_acquisition_mode TEXT,
            created_by INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_transcription_segments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_segments (
            segment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES transcription_sessions(session_id) ON DELETE CASCADE,
            segment_number INTEGER NOT NULL,
            filename_audio TEXT,
            filename_transcript TEXT,
            recording_status TEXT NOT NULL DEFAULT 'recording',
            transcription_status TEXT NOT NULL DEFAULT 'pending',
            transcription_progress INTEGER NOT NULL DEFAULT 0,
            duration_seconds INTEGER,
            file_size_bytes INTEGER,
            started_at TEXT,
            completed_at TEXT,
            error_message TEXT,
            UNIQUE (session_id, segment_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_transcription_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_logs (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES transcription_sessions(session_id) ON DELETE CASCADE,
            log_level TEXT NOT NULL,
            event_type TEXT NOT NULL,
            message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_transcription_parse_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_parse_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES transcription_sessions(session_id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'running',
            total_records INTEGER NOT NULL DEFAULT 0,
            high_confidence INTEGER NOT NULL DEFAULT 0,
            low_confidence INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            run_by INTEGER,
            started_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_transcription_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_records (
            record_id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES transcription_parse_runs(run_id) ON DELETE CASCADE,
            session_id INTEGER NOT NULL REFERENCES transcription_sessions(session_id) ON DELETE CASCADE,
            sequence_number INTEGER NOT NULL,
            player_id INTEGER REFERENCES players(player_id) ON DELETE SET NULL,
            team_id INTEGER REFERENCES teams(team_id) ON DELETE SET NULL,
            maker_id INTEGER REFERENCES card_makers(maker_id) ON DELETE SET NULL,
            style_id INTEGER REFERENCES card_styles(style_id) ON DELETE SET NULL,
            specialty_id INTEGER REFERENCES card_specialties(specialty_id) ON DELETE SET NULL,
            raw_player TEXT,
            raw_team TEXT,
            raw_maker TEXT,
            raw_style TEXT,
            raw_specialty TEXT,
            raw_parallel TEXT,
            raw_card_number TEXT,
            lot_number INTEGER,
            is_rookie INTEGER NOT NULL DEFAULT 0,
            is_autograph INTEGER NOT NULL DEFAULT 0,
            is_relic INTEGER NOT NULL DEFAULT 0,
            is_giveaway INTEGER NOT NULL DEFAULT 0,
            confidence REAL NOT NULL DEFAULT 0,
            raw_text_excerpt TEXT,
            segment_id INTEGER REFERENCES transcription_segments(segment_id) ON DELETE SET NULL,
            segment_number INTEGER,
            text_position INTEGER,
            estimated_at TEXT,
            is_verified INTEGER NOT NULL DEFAULT 0,
            verified_by INTEGER,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_livestreams_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS livestreams (
            livestream_id TEXT PRIMARY KEY,
            livestream_title TEXT,
            stream_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_auction_line_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auction_line_items (
            line_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            livestream_id TEXT REFERENCES livestreams(livestream_id) ON DELETE SET NULL,
            order_id TEXT,
            buyer_name TEXT,
            item_title TEXT,
            sale_price REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_paypal_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS paypal_transactions (
            pp_transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_date TEXT NOT NULL,
            transaction_time TEXT,
            name TEXT,
            type TEXT NOT NULL,
            status TEXT,
            currency TEXT NOT NULL DEFAULT 'USD',
            amount REAL NOT NULL,
            fees REAL NOT NULL DEFAULT 0,
            net_amount REAL,
            from_email TEXT,
            to_email TEXT,
            paypal_txn_id TEXT UNIQUE,
            item_title TEXT,
            order_number TEXT,
            charge_category TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_paypal_allocations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS paypal_allocations (
            allocation_id INTEGER PRIMARY KEY AUTOINCREMENT,
            pp_transaction_id INTEGER NOT NULL REFERENCES paypal_transactions(pp_transaction_id) ON DELETE CASCADE,
            sales_source TEXT NOT NULL
                CHECK (sales_source IN ('Auction', 'eBay', 'Private-Collection')),
            livestream_id TEXT,
            amount_allocated REAL NOT NULL,
            notes TEXT,
            assigned_by INTEGER,
            assigned_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            is_locked INTEGER NOT NULL DEFAULT 0,
            locked_by INTEGER,
            locked_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_ebay_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ebay_orders (
            ebay_order_id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_number TEXT NOT NULL,
            order_date TEXT,
            seller_buyer_name TEXT,
            transaction_type TEXT NOT NULL DEFAULT 'PURCHASE',
            status TEXT NOT NULL DEFAULT 'Confirmed',
            source TEXT,
            subtotal REAL NOT NULL DEFAULT 0,
            shipping_cost REAL NOT NULL DEFAULT 0,
            sales_tax REAL NOT NULL DEFAULT 0,
            total_amount REAL NOT NULL DEFAULT 0,
            reported_item_count INTEGER,
            delivery_date TEXT,
            email_subject TEXT,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_ebay_order_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ebay_order_items (
            ebay_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            ebay_order_id INTEGER NOT NULL REFERENCES ebay_orders(ebay_order_id) ON DELETE CASCADE,
            item_title TEXT,
            item_price REAL NOT NULL DEFAULT 0,
            quantity INTEGER NOT NULL DEFAULT 1,
            ebay_item_number TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
