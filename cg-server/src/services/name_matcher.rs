//! Player mention detection
//!
//! Scans lowercased transcript text word by word, trying progressively
//! weaker evidence at each position:
//!
//! 1. two-word window: exact full name (1.0) or nickname (0.9)
//! 2. three-word window: exact full name (1.0) or nickname (0.9)
//! 3. two-word window, fuzzy: Jaro-Winkler against full names sharing the
//!    first two letters, accepted at 0.92 and scored `similarity * 0.85`
//! 4. single word of four or more letters: last-name index (0.7) and
//!    nickname (0.9), both of which may fire
//!
//! Mentions of the same player within 100 bytes collapse to the best one.

use once_cell::sync::Lazy;
use regex::Regex;

use super::reference_index::{PlayerRef, ReferenceIndex};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z'\-]+").expect("valid word regex"));

pub const FULL_NAME_SCORE: f64 = 1.0;
pub const NICKNAME_SCORE: f64 = 0.9;
pub const SINGLE_NAME_SCORE: f64 = 0.7;
pub const FUZZY_THRESHOLD: f64 = 0.92;
pub const FUZZY_WEIGHT: f64 = 0.85;
/// Mentions of one player closer than this many bytes are duplicates
pub const DEDUPE_DISTANCE: usize = 100;

/// A word and its byte offset in the scanned text
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub word: &'a str,
    pub pos: usize,
}

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    WORD_RE
        .find_iter(text)
        .map(|m| Token {
            word: m.as_str(),
            pos: m.start(),
        })
        .collect()
}

/// One detected player mention
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMatch {
    pub player: PlayerRef,
    /// Byte offset of the first matched word
    pub position: usize,
    pub score: f64,
}

/// Configurable matcher over a reference index
pub struct NameMatcher<'a> {
    index: &'a ReferenceIndex,
    fuzzy_threshold: f64,
}

impl<'a> NameMatcher<'a> {
    pub fn new(index: &'a ReferenceIndex) -> Self {
        Self {
            index,
            fuzzy_threshold: FUZZY_THRESHOLD,
        }
    }

    /// Exact full name, then nickname
    fn exact(&self, window: &str) -> Option<(PlayerRef, f64)> {
        if let Some(player) = self.index.full_names.get(window) {
            return Some((player.clone(), FULL_NAME_SCORE));
        }
        self.index
            .nicknames
            .get(window)
            .map(|player| (player.clone(), NICKNAME_SCORE))
    }

    /// Best full name close to `window`, with its weighted score
    fn fuzzy(&self, first: &str, second: &str) -> Option<(PlayerRef, f64)> {
        if first.len() < 3 || second.len() < 3 {
            return None;
        }
        let window = format!("{} {}", first, second);
        let candidates = self.index.prefixes.get(window.get(..2)?)?;

        let mut best: Option<(&String, f64)> = None;
        for name in candidates {
            let similarity = strsim::jaro_winkler(&window, name);
            if similarity >= self.fuzzy_threshold && best.map_or(true, |(_, s)| similarity > s) {
                best = Some((name, similarity));
            }
        }

        let (name, similarity) = best?;
        let player = self.index.full_names.get(name)?;
        Some((player.clone(), similarity * FUZZY_WEIGHT))
    }

    /// Scan `text_lower` and return deduplicated mentions in text order
    ///
    /// # Arguments
    /// * `text_lower` - transcript text, ASCII-lowercased so offsets match the original
    pub fn find_mentions(&self, text_lower: &str) -> Vec<PlayerMatch> {
        let words = tokenize(text_lower);
        let mut found = Vec::new();
        let mut i = 0;

        while i < words.len() {
            let pos = words[i].pos;

            if i + 1 < words.len() {
                let two = format!("{} {}", words[i].word, words[i + 1].word);
                if let Some((player, score)) = self.exact(&two) {
                    found.push(PlayerMatch { player, position: pos, score });
                    i += 2;
                    continue;
                }
            }

            if i + 2 < words.len() {
                let three = format!("{} {} {}", words[i].word, words[i + 1].word, words[i + 2].word);
                if let Some((player, score)) = self.exact(&three) {
                    found.push(PlayerMatch { player, position: pos, score });
                    i += 3;
                    continue;
                }
            }

            if i + 1 < words.len() {
                if let Some((player, score)) = self.fuzzy(words[i].word, words[i + 1].word) {
                    found.push(PlayerMatch { player, position: pos, score });
                    i += 2;
                    continue;
                }
            }

            let word = words[i].word;
            if word.len() >= 4 {
                if let Some(player) = self.index.single_names.get(word) {
                    found.push(PlayerMatch {
                        player: player.clone(),
                        position: pos,
                        score: SINGLE_NAME_SCORE,
                    });
                }
                if let Some(player) = self.index.nicknames.get(word) {
                    found.push(PlayerMatch {
                        player: player.clone(),
                        position: pos,
                        score: NICKNAME_SCORE,
                    });
                }
            }
            i += 1;
        }

        dedupe(found)
    }
}

/// Collapse mentions of one player that sit close together
///
/// Each mention is compared with the kept mentions in scan order; the first
/// kept mention of the same player within [`DEDUPE_DISTANCE`] absorbs it,
/// taking its place only on a strictly higher score.
pub fn dedupe(matches: Vec<PlayerMatch>) -> Vec<PlayerMatch> {
    let mut kept: Vec<PlayerMatch> = Vec::new();

    for m in matches {
        let near = kept.iter_mut().find(|k| {
            k.player.player_id == m.player.player_id && k.position.abs_diff(m.position) < DEDUPE_DISTANCE
        });
        match near {
            Some(existing) => {
                if m.score > existing.score {
                    *existing = m;
                }
            }
            None => kept.push(m),
        }
    }

    kept.sort_by_key(|m| m.position);
    kept
}
