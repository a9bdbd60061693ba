//! Player-anchored card record extraction
//!
//! Works on the concatenated transcript of a session. Every player mention
//! becomes one record; the ±200 byte window around it supplies the card
//! attributes, lot number and confidence. Segment boundaries map each
//! mention back to the segment it came from and an estimated wall time.

use chrono::{Duration, NaiveDateTime};

use super::attribute_extractor::{extract_attributes, LotTracker};
use super::confidence;
use super::name_matcher::NameMatcher;
use super::reference_index::ReferenceIndex;
use crate::models::CardRecord;

/// Bytes of context taken on each side of a mention
pub const CONTEXT_RADIUS: usize = 200;

/// Where one segment's text sits inside the full transcript
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBoundary {
    pub offset: usize,
    /// Text length plus the joining space
    pub text_length: usize,
    pub segment_id: i64,
    pub segment_number: i64,
    pub started_at: Option<NaiveDateTime>,
    pub duration_seconds: i64,
}

/// Full transcript text plus the segment boundaries inside it
#[derive(Debug, Default)]
pub struct SegmentTimeline {
    text: String,
    boundaries: Vec<SegmentBoundary>,
}

impl SegmentTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one segment's transcript, joined by a single space
    pub fn push(
        &mut self,
        segment_id: i64,
        segment_number: i64,
        started_at: Option<NaiveDateTime>,
        duration_seconds: i64,
        text: &str,
    ) {
        self.boundaries.push(SegmentBoundary {
            offset: self.text.len(),
            text_length: text.len() + 1,
            segment_id,
            segment_number,
            started_at,
            duration_seconds,
        });
        self.text.push(' ');
        self.text.push_str(text);
    }

    /// Concatenated text; positions index into this
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn boundaries(&self) -> &[SegmentBoundary] {
        &self.boundaries
    }

    /// Last boundary starting at or before `position`
    pub fn locate(&self, position: usize) -> Option<&SegmentBoundary> {
        self.boundaries.iter().rev().find(|b| position >= b.offset)
    }

    /// Interpolated wall time of `position` within its segment
    ///
    /// Needs a start time, a positive duration and a non-empty segment.
    pub fn estimated_at(&self, position: usize) -> Option<NaiveDateTime> {
        let boundary = self.locate(position)?;
        let started = boundary.started_at?;
        if boundary.duration_seconds <= 0 || boundary.text_length == 0 {
            return None;
        }

        let fraction = ((position - boundary.offset) as f64 / boundary.text_length as f64).clamp(0.0, 1.0);
        let offset = (fraction * boundary.duration_seconds as f64).round() as i64;
        Some(started + Duration::seconds(offset))
    }
}

/// Context window bytes `[pos - 200, pos + 200)`, clipped to the text
fn context_bytes(bytes: &[u8], position: usize) -> &[u8] {
    let start = position.saturating_sub(CONTEXT_RADIUS);
    let end = (position + CONTEXT_RADIUS).min(bytes.len());
    &bytes[start..end]
}

/// Context with every non-ASCII byte dropped
fn ascii_excerpt(window: &[u8]) -> String {
    window.iter().filter(|b| b.is_ascii()).map(|&b| b as char).collect()
}

/// Extract card records from a session transcript
///
/// # Arguments
/// * `timeline` - concatenated transcript and its segment boundaries
/// * `index` - reference lookup tables
///
/// # Returns
/// One record per deduplicated player mention, numbered from 1 in text order
pub fn extract_card_records(timeline: &SegmentTimeline, index: &ReferenceIndex) -> Vec<CardRecord> {
    let text = timeline.text();
    let lower = text.to_ascii_lowercase();
    let mentions = NameMatcher::new(index).find_mentions(&lower);

    let mut lots = LotTracker::new();
    let mut records = Vec::with_capacity(mentions.len());

    for (seq, mention) in mentions.into_iter().enumerate() {
        let window = context_bytes(lower.as_bytes(), mention.position);
        let context = String::from_utf8_lossy(window);

        let attrs = extract_attributes(&context, index);
        let lot_number = lots.observe(&context);
        let confidence = confidence::score(mention.score, &attrs, lot_number);

        let segment = timeline.locate(mention.position);
        let (team_id, raw_team) = match &attrs.team {
            Some((id, raw)) => (mention.player.team_id.or(Some(*id)), Some(raw.clone())),
            None => (mention.player.team_id, None),
        };

        records.push(CardRecord {
            sequence_number: seq as i64 + 1,
            player_id: Some(mention.player.player_id),
            team_id,
            maker_id: attrs.maker.as_ref().map(|h| h.id),
            style_id: attrs.style.as_ref().map(|h| h.id),
            specialty_id: attrs.specialty.as_ref().map(|h| h.id),
            raw_player: mention.player.display.clone(),
            raw_team,
            raw_maker: attrs.maker.map(|h| h.raw),
            raw_style: attrs.style.map(|h| h.raw),
            raw_specialty: attrs.specialty.map(|h| h.raw),
            raw_parallel: attrs.parallel,
            raw_card_number: attrs.card_number,
            lot_number,
            is_rookie: attrs.is_rookie,
            is_autograph: attrs.is_autograph,
            is_relic: attrs.is_relic,
            is_giveaway: attrs.is_giveaway,
            confidence,
            raw_text_excerpt: ascii_excerpt(context_bytes(text.as_bytes(), mention.position)),
            segment_id: segment.map(|b| b.segment_id),
            segment_number: segment.map(|b| b.segment_number),
            text_position: mention.position as i64,
            estimated_at: timeline
                .estimated_at(mention.position)
                .map(|t| cg_common::time::to_db(&t)),
        });
    }

    records
}
