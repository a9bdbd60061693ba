//! Card record storage

use cg_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{CardRecord, RecordRow, RecordUpdate};

/// Store a run's records, replacing the session's records from older runs
pub async fn replace_session_records(
    pool: &SqlitePool,
    session_id: i64,
    run_id: i64,
    records: &[CardRecord],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM transcription_records WHERE session_id = ? AND run_id != ?")
        .bind(session_id)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO transcription_records (
                run_id, session_id, sequence_number, player_id, team_id, maker_id,
                style_id, specialty_id, raw_player, raw_team, raw_maker, raw_style,
                raw_specialty, raw_parallel, raw_card_number, lot_number, is_rookie,
                is_autograph, is_relic, is_giveaway, confidence, raw_text_excerpt,
                segment_id, segment_number, text_position, estimated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(session_id)
        .bind(record.sequence_number)
        .bind(record.player_id)
        .bind(record.team_id)
        .bind(record.maker_id)
        .bind(record.style_id)
        .bind(record.specialty_id)
        .bind(&record.raw_player)
        .bind(&record.raw_team)
        .bind(&record.raw_maker)
        .bind(&record.raw_style)
        .bind(&record.raw_specialty)
        .bind(&record.raw_parallel)
        .bind(&record.raw_card_number)
        .bind(record.lot_number)
        .bind(record.is_rookie)
        .bind(record.is_autograph)
        .bind(record.is_relic)
        .bind(record.is_giveaway)
        .bind(record.confidence)
        .bind(&record.raw_text_excerpt)
        .bind(record.segment_id)
        .bind(record.segment_number)
        .bind(record.text_position)
        .bind(&record.estimated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Records of one run with reference display names, in transcript order
pub async fn list_records(
    pool: &SqlitePool,
    run_id: i64,
    min_confidence: Option<f64>,
) -> Result<Vec<RecordRow>> {
    let rows = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT r.record_id, r.run_id, r.session_id, r.sequence_number, r.player_id,
               r.team_id, r.maker_id, r.style_id, r.specialty_id, r.raw_player,
               r.raw_team, r.raw_maker, r.raw_style, r.raw_specialty, r.raw_parallel,
               r.raw_card_number, r.lot_number, r.is_rookie, r.is_autograph, r.is_relic,
               r.is_giveaway, r.confidence, r.raw_text_excerpt, r.segment_id,
               r.segment_number, r.text_position, r.estimated_at, r.is_verified,
               r.verified_by, r.notes, r.created_at,
               p.first_name || ' ' || p.last_name AS player_name,
               t.team_name AS team_name,
               t.abbreviation AS team_abbr,
               t.mlb_id AS team_mlb_id,
               m.name AS maker_name,
               cs.style_name AS style_name,
               sp.name AS specialty_name
        FROM transcription_records r
        LEFT JOIN players p ON p.player_id = r.player_id
        LEFT JOIN teams t ON t.team_id = r.team_id
        LEFT JOIN card_makers m ON m.maker_id = r.maker_id
        LEFT JOIN card_styles cs ON cs.style_id = r.style_id
        LEFT JOIN card_specialties sp ON sp.specialty_id = r.specialty_id
        WHERE r.run_id = ? AND (? IS NULL OR r.confidence >= ?)
        ORDER BY r.sequence_number
        "#,
    )
    .bind(run_id)
    .bind(min_confidence)
    .bind(min_confidence)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Apply the fields present in `update`
///
/// Returns false when no record has `record_id`. Setting `is_verified`
/// records `actor` as the verifier (or clears it).
pub async fn update_record(
    pool: &SqlitePool,
    record_id: i64,
    update: &RecordUpdate,
    actor: Option<i64>,
) -> Result<bool> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE transcription_records SET ");
    let mut set = qb.separated(", ");

    macro_rules! push_field {
        ($field:ident) => {
            if let Some(value) = &update.$field {
                set.push(concat!(stringify!($field), " = "));
                set.push_bind_unseparated(value.clone());
            }
        };
    }

    push_field!(player_id);
    push_field!(team_id);
    push_field!(maker_id);
    push_field!(style_id);
    push_field!(specialty_id);
    push_field!(raw_parallel);
    push_field!(raw_card_number);
    push_field!(lot_number);
    push_field!(is_rookie);
    push_field!(is_autograph);
    push_field!(is_relic);
    push_field!(is_giveaway);
    push_field!(notes);

    if let Some(verified) = update.is_verified {
        set.push("is_verified = ");
        set.push_bind_unseparated(verified);
        set.push("verified_by = ");
        set.push_bind_unseparated(if verified { actor } else { None });
    }

    qb.push(" WHERE record_id = ");
    qb.push_bind(record_id);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_record(pool: &SqlitePool, record_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM transcription_records WHERE record_id = ?")
        .bind(record_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
