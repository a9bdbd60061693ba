//! In-memory lookup tables for transcript matching
//!
//! Built once per parse run from the reference tables. All keys are
//! lowercased; Whisper output is matched against them word by word.

use cg_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::reference::{self as reference_db, NamedTable};
use crate::models::reference::{NamedEntry, Nickname, Player, Team};

/// Auction-talk words that are also player last names; never matched alone
pub const NAME_STOP_WORDS: &[&str] = &[
    "black", "green", "blue", "gold", "rose", "white", "brown", "gray", "grey", "long", "short",
    "young", "best", "king", "love", "cash", "ball", "page", "hope", "holiday", "price", "rich",
    "hand", "hall", "bell", "lamb", "field", "reed", "dean", "dale", "lane", "star", "ford",
];

/// Generational suffixes stripped to index an alternate name
pub const NAME_SUFFIXES: &[&str] = &[" ii", " iii", " iv", " jr", " jr.", " sr", " sr."];

/// Common mis-transcriptions of maker names
pub const MAKER_ALIASES: &[(&str, &str)] = &[
    ("tops", "topps"),
    ("topped", "topps"),
    ("topped's", "topps"),
    ("topp's", "topps"),
    ("topscale", "topps"),
    ("bowmen", "bowman"),
    ("bow man", "bowman"),
    ("donrus", "donruss"),
    ("panany", "panini"),
    ("pennini", "panini"),
];

/// Common mis-transcriptions of style names
pub const STYLE_ALIASES: &[(&str, &str)] = &[
    ("chroma", "chrome"),
    ("krome", "chrome"),
    ("saphire", "sapphire"),
    ("saphier", "sapphire"),
    ("prism", "prizm"),
    ("prison", "prizm"),
];

/// A player as referenced by a match
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRef {
    pub player_id: i64,
    pub team_id: Option<i64>,
    /// `First Last` as stored
    pub display: String,
    pub popularity: i64,
}

/// A maker, style or specialty keyed by lowercased name
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub id: i64,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamTerm {
    pub team_id: i64,
    pub name: String,
    pub abbreviation: Option<String>,
}

/// Lookup tables for one parse run
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    /// `first last` (and suffix-stripped variants) → player
    pub full_names: HashMap<String, PlayerRef>,
    /// Single words: base last names, plus first names of popular players
    pub single_names: HashMap<String, PlayerRef>,
    pub nicknames: HashMap<String, PlayerRef>,
    /// First two characters of a full name → the full names sharing them
    pub prefixes: HashMap<String, Vec<String>>,
    pub makers: Vec<Term>,
    pub styles: Vec<Term>,
    pub specialties: Vec<Term>,
    pub teams: Vec<TeamTerm>,
}

/// Insert unless an existing entry is at least as popular
fn insert_preferring_popular(map: &mut HashMap<String, PlayerRef>, key: String, player: &PlayerRef) {
    match map.get(&key) {
        Some(existing) if player.popularity <= existing.popularity => {}
        _ => {
            map.insert(key, player.clone());
        }
    }
}

fn strip_suffix(last: &str) -> Option<&str> {
    NAME_SUFFIXES
        .iter()
        .find(|suffix| last.ends_with(*suffix))
        .map(|suffix| last[..last.len() - suffix.len()].trim_end())
}

fn is_stop_word(word: &str) -> bool {
    NAME_STOP_WORDS.contains(&word)
}

fn terms(entries: Vec<NamedEntry>) -> Vec<Term> {
    entries
        .into_iter()
        .filter(|e| e.is_active)
        .map(|e| Term {
            id: e.id,
            key: e.name.trim().to_lowercase(),
        })
        .filter(|t| !t.key.is_empty())
        .collect()
}

impl ReferenceIndex {
    /// Build from rows already loaded
    ///
    /// `players` must already be restricted to matchable players (active or
    /// popular); earlier rows win popularity ties.
    pub fn build(
        players: Vec<Player>,
        nicknames: Vec<Nickname>,
        teams: Vec<Team>,
        makers: Vec<NamedEntry>,
        styles: Vec<NamedEntry>,
        specialties: Vec<NamedEntry>,
    ) -> Self {
        let mut index = ReferenceIndex::default();
        let mut by_id: HashMap<i64, PlayerRef> = HashMap::new();

        for p in &players {
            let first = p.first_name.trim().to_lowercase();
            let last = p.last_name.trim().to_lowercase();
            let player = PlayerRef {
                player_id: p.player_id,
                team_id: p.current_team_id,
                display: format!("{} {}", p.first_name, p.last_name),
                popularity: p.popularity_score,
            };

            insert_preferring_popular(&mut index.full_names, format!("{} {}", first, last), &player);

            let mut last_base = last.as_str();
            if let Some(base) = strip_suffix(&last) {
                last_base = base;
                insert_preferring_popular(
                    &mut index.full_names,
                    format!("{} {}", first, base),
                    &player,
                );
            }

            if last_base.len() >= 4 && !is_stop_word(last_base) {
                insert_preferring_popular(&mut index.single_names, last_base.to_string(), &player);
            }

            if player.popularity > 0 && first.len() >= 4 && !is_stop_word(&first) {
                insert_preferring_popular(&mut index.single_names, first.clone(), &player);
            }

            by_id.insert(p.player_id, player);
        }

        for n in nicknames {
            let key = n.nickname.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if let Some(player) = by_id.get(&n.player_id) {
                index.nicknames.insert(key, player.clone());
            }
        }

        let mut full_names: Vec<&String> = index.full_names.keys().collect();
        full_names.sort();
        for name in full_names {
            if let Some(prefix) = name.get(..2) {
                index
                    .prefixes
                    .entry(prefix.to_string())
                    .or_default()
                    .push(name.clone());
            }
        }

        index.makers = terms(makers);
        index.styles = terms(styles);
        index.specialties = terms(specialties);
        index.teams = teams
            .into_iter()
            .filter(|t| t.is_active)
            .map(|t| TeamTerm {
                team_id: t.team_id,
                name: t.team_name.trim().to_lowercase(),
                abbreviation: t
                    .abbreviation
                    .map(|a| a.trim().to_lowercase())
                    .filter(|a| !a.is_empty()),
            })
            .collect();

        index
    }

    /// Load every reference table and build the index
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let players = reference_db::matchable_players(pool).await?;
        let nicknames = reference_db::list_nicknames(pool).await?;
        let teams = reference_db::list_teams(pool, true).await?;
        let makers = reference_db::list_named(pool, NamedTable::Makers, true).await?;
        let styles = reference_db::list_named(pool, NamedTable::Styles, true).await?;
        let specialties = reference_db::list_named(pool, NamedTable::Specialties, true).await?;

        let index = Self::build(players, nicknames, teams, makers, styles, specialties);
        tracing::debug!(
            full_names = index.full_names.len(),
            single_names = index.single_names.len(),
            nicknames = index.nicknames.len(),
            "Reference index built"
        );

        Ok(index)
    }

    pub fn maker_id(&self, key: &str) -> Option<i64> {
        self.makers.iter().find(|t| t.key == key).map(|t| t.id)
    }

    pub fn style_id(&self, key: &str) -> Option<i64> {
        self.styles.iter().find(|t| t.key == key).map(|t| t.id)
    }
}
