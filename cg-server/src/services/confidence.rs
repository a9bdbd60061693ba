//! Card record confidence scoring
//!
//! Additive evidence model: a matched player is worth 0.30 plus a tenth of
//! the match score; each further attribute group adds a fixed weight.

use super::attribute_extractor::CardAttributes;

pub const BASE_SCORE: f64 = 0.30;
pub const MATCH_WEIGHT: f64 = 0.10;
pub const MAKER_OR_STYLE: f64 = 0.20;
pub const SPECIALTY_OR_PARALLEL: f64 = 0.10;
pub const LOT_NUMBER: f64 = 0.10;
pub const CARD_NUMBER: f64 = 0.10;
pub const CARD_FLAGS: f64 = 0.05;

/// Records at or above this confidence count as high confidence
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// Band a score falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Score one record
///
/// # Arguments
/// * `match_score` - player match quality (0.0-1.0)
/// * `attrs` - attributes detected in the context window
/// * `lot_number` - carried lot number; zero counts as absent
///
/// # Returns
/// Confidence rounded to two places, at most 1.0
pub fn score(match_score: f64, attrs: &CardAttributes, lot_number: Option<i64>) -> f64 {
    let mut confidence = BASE_SCORE + match_score * MATCH_WEIGHT;

    if attrs.maker.is_some() || attrs.style.is_some() {
        confidence += MAKER_OR_STYLE;
    }
    if attrs.specialty.is_some() || attrs.parallel.is_some() {
        confidence += SPECIALTY_OR_PARALLEL;
    }
    if lot_number.map_or(false, |n| n != 0) {
        confidence += LOT_NUMBER;
    }
    if attrs.card_number.is_some() {
        confidence += CARD_NUMBER;
    }
    if attrs.is_rookie || attrs.is_autograph || attrs.is_relic {
        confidence += CARD_FLAGS;
    }

    ((confidence * 100.0).round() / 100.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attribute_extractor::TermHit;

    fn hit(id: i64) -> Option<TermHit> {
        Some(TermHit { id, raw: String::new() })
    }

    #[test]
    fn test_bare_match() {
        assert_eq!(score(1.0, &CardAttributes::default(), None), 0.4);
        assert_eq!(score(0.7, &CardAttributes::default(), None), 0.37);
    }

    #[test]
    fn test_full_evidence() {
        let attrs = CardAttributes {
            maker: hit(1),
            style: hit(2),
            specialty: hit(3),
            parallel: Some("gold".to_string()),
            card_number: Some("/25".to_string()),
            is_rookie: true,
            is_autograph: true,
            ..Default::default()
        };
        // 0.30 + 0.10 + 0.20 + 0.10 + 0.10 + 0.10 + 0.05 = 0.95
        assert_eq!(score(1.0, &attrs, Some(171)), 0.95);
    }

    #[test]
    fn test_zero_lot_is_absent() {
        assert_eq!(score(0.9, &CardAttributes::default(), Some(0)), 0.39);
        assert_eq!(score(0.9, &CardAttributes::default(), Some(12)), 0.49);
    }

    #[test]
    fn test_band() {
        assert_eq!(ConfidenceBand::of(0.7), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::of(0.69), ConfidenceBand::Low);
    }
}
