//! Card attribute detection in the text around a player mention

use once_cell::sync::Lazy;
use regex::Regex;

use super::reference_index::{ReferenceIndex, Term, MAKER_ALIASES, STYLE_ALIASES};

static ROOKIE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brookie\b").expect("valid regex"));
static AUTOGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(autograph|auto(?:graph)?|signed)\b").expect("valid regex"));
static RELIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(relic|game[\s-]?used|patch|jersey|memorabilia)\b").expect("valid regex")
});
static GIVEAWAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(give\s*away|giveaway)\b").expect("valid regex"));

static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:number(?:ed)?|#)\s*(?:to\s+)?(\d{1,4})\s*(?:/\s*(\d{1,4}))?").expect("valid regex")
});
static PRINT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:to|of)\s+(\d{1,4})\b").expect("valid regex"));
static SLASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\s*(\d{1,4})\b").expect("valid regex"));

static LOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\blot\s*(?:#|number)?\s*(\d{1,5})\b").expect("valid regex"));
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2,5})\b").expect("valid regex"));

/// Parallel colours, in detection priority
pub const PARALLEL_COLORS: &[&str] = &[
    "blue", "gold", "red", "green", "black", "pink", "purple", "orange", "silver", "white",
    "yellow", "aqua", "teal", "platinum", "sapphire",
];

static COLOR_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    PARALLEL_COLORS
        .iter()
        .map(|c| (*c, Regex::new(&format!(r"\b{}\b", c)).expect("valid colour regex")))
        .collect()
});

/// A reference hit: id plus the text that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TermHit {
    pub id: i64,
    /// The matched name, or `alias → canonical`
    pub raw: String,
}

/// Everything detected in one context window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardAttributes {
    pub maker: Option<TermHit>,
    pub style: Option<TermHit>,
    pub specialty: Option<TermHit>,
    pub team: Option<(i64, String)>,
    pub parallel: Option<String>,
    pub card_number: Option<String>,
    pub is_rookie: bool,
    pub is_autograph: bool,
    pub is_relic: bool,
    pub is_giveaway: bool,
}

/// First term whose name occurs anywhere in `context`
fn find_term(context: &str, terms: &[Term]) -> Option<TermHit> {
    terms.iter().find(|t| context.contains(&t.key)).map(|t| TermHit {
        id: t.id,
        raw: t.key.clone(),
    })
}

/// First alias present whose canonical name is a known term
fn find_alias(
    context: &str,
    aliases: &[(&str, &str)],
    resolve: impl Fn(&str) -> Option<i64>,
) -> Option<TermHit> {
    aliases.iter().find_map(|&(alias, canonical)| {
        if !context.contains(alias) {
            return None;
        }
        resolve(canonical).map(|id| TermHit {
            id,
            raw: format!("{} → {}", alias, canonical),
        })
    })
}

fn contains_word(context: &str, word: &str) -> bool {
    context
        .match_indices(word)
        .any(|(start, _)| {
            let before = context[..start].chars().next_back();
            let after = context[start + word.len()..].chars().next();
            !before.map_or(false, |c| c.is_alphanumeric()) && !after.map_or(false, |c| c.is_alphanumeric())
        })
}

/// First team whose name or abbreviation appears as a whole word
fn find_team(context: &str, index: &ReferenceIndex) -> Option<(i64, String)> {
    index.teams.iter().find_map(|t| {
        if contains_word(context, &t.name) {
            return Some((t.team_id, t.name.clone()));
        }
        t.abbreviation
            .as_deref()
            .filter(|a| contains_word(context, a))
            .map(|a| (t.team_id, a.to_string()))
    })
}

/// Print run or card number, tried in order of specificity
///
/// `numbered to 99`, `#25/50` are kept verbatim; `to 199` / `of 25` become
/// `/199` unless the number is 1-5 (ordinary speech); a bare `/ 10` is kept.
pub fn detect_card_number(context: &str) -> Option<String> {
    if let Some(m) = NUMBERED_RE.find(context) {
        return Some(m.as_str().to_string());
    }
    if let Some(caps) = PRINT_RUN_RE.captures(context) {
        let n: u32 = caps[1].parse().ok()?;
        return (n > 5 && n <= 9999).then(|| format!("/{}", n));
    }
    SLASH_RE.find(context).map(|m| m.as_str().to_string())
}

/// Detect attributes in a lowercased context window
pub fn extract_attributes(context: &str, index: &ReferenceIndex) -> CardAttributes {
    let maker = find_term(context, &index.makers)
        .or_else(|| find_alias(context, MAKER_ALIASES, |c| index.maker_id(c)));
    let style = find_term(context, &index.styles)
        .or_else(|| find_alias(context, STYLE_ALIASES, |c| index.style_id(c)));

    CardAttributes {
        maker,
        style,
        specialty: find_term(context, &index.specialties),
        team: find_team(context, index),
        parallel: COLOR_RES
            .iter()
            .find(|(_, re)| re.is_match(context))
            .map(|(color, _)| color.to_string()),
        card_number: detect_card_number(context),
        is_rookie: ROOKIE_RE.is_match(context),
        is_autograph: AUTOGRAPH_RE.is_match(context),
        is_relic: RELIC_RE.is_match(context),
        is_giveaway: GIVEAWAY_RE.is_match(context),
    }
}

/// Lot number carried from one mention to the next
///
/// An explicit `lot N` sets the lot. Otherwise the first 2-5 digit number
/// in the window moves the lot when it is at least 100 and within five of
/// the current lot (auctioneers count lots up as they go).
#[derive(Debug, Default)]
pub struct LotTracker {
    current: Option<i64>,
}

impl LotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, context: &str) -> Option<i64> {
        if let Some(n) = LOT_RE.captures(context).and_then(|c| c[1].parse::<i64>().ok()) {
            self.current = Some(n);
        }

        if let Some(n) = NUMBER_RE.captures(context).and_then(|c| c[1].parse::<i64>().ok()) {
            if let Some(lot) = self.current {
                if (100..=99_999).contains(&n) && (n - lot).abs() <= 5 {
                    self.current = Some(n);
                }
            }
        }

        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::reference_index::tests::entry;
    use crate::models::reference::Team;

    fn index() -> ReferenceIndex {
        ReferenceIndex::build(
            vec![],
            vec![],
            vec![Team {
                team_id: 5,
                team_name: "Yankees".to_string(),
                abbreviation: Some("NYY".to_string()),
                mlb_id: Some(147),
                is_active: true,
            }],
            vec![entry(1, "Topps"), entry(2, "Bowman")],
            vec![entry(3, "Chrome"), entry(4, "Prizm")],
            vec![entry(6, "Refractor")],
        )
    }

    #[test]
    fn test_direct_terms() {
        let attrs = extract_attributes("a bowman chrome refractor rookie", &index());
        assert_eq!(attrs.maker, Some(TermHit { id: 2, raw: "bowman".to_string() }));
        assert_eq!(attrs.style.map(|s| s.id), Some(3));
        assert_eq!(attrs.specialty.map(|s| s.id), Some(6));
        assert!(attrs.is_rookie);
    }

    #[test]
    fn test_alias_terms() {
        let attrs = extract_attributes("tops krome pulled", &index());
        assert_eq!(attrs.maker, Some(TermHit { id: 1, raw: "tops → topps".to_string() }));
        assert_eq!(attrs.style, Some(TermHit { id: 3, raw: "krome → chrome".to_string() }));
    }

    #[test]
    fn test_alias_needs_known_canonical() {
        // "donruss" is not a known maker here
        let attrs = extract_attributes("donrus base", &index());
        assert_eq!(attrs.maker, None);
    }

    #[test]
    fn test_flags_and_colour() {
        let attrs = extract_attributes("gold game-used patch signed giveaway, also blue", &index());
        assert!(attrs.is_relic);
        assert!(attrs.is_autograph);
        assert!(attrs.is_giveaway);
        // List order, not text order
        assert_eq!(attrs.parallel.as_deref(), Some("blue"));
        assert!(!attrs.is_rookie);
    }

    #[test]
    fn test_colour_needs_word_boundary() {
        let attrs = extract_attributes("goldschmidt bored", &index());
        assert_eq!(attrs.parallel, None);
    }

    #[test]
    fn test_team_detection() {
        assert_eq!(extract_attributes("nyy slugger", &index()).team, Some((5, "nyy".to_string())));
        assert_eq!(
            extract_attributes("the yankees legend", &index()).team,
            Some((5, "yankees".to_string()))
        );
        assert_eq!(extract_attributes("nyyx", &index()).team, None);
    }

    #[test]
    fn test_card_number_patterns() {
        assert_eq!(detect_card_number("card numbered to 99").as_deref(), Some("numbered to 99"));
        // Trailing whitespace is part of the verbatim match
        assert_eq!(detect_card_number("numbered 5 left").as_deref(), Some("numbered 5 "));
        assert_eq!(detect_card_number("card # 25/50").as_deref(), Some("# 25/50"));
        assert_eq!(detect_card_number("only to 199 made").as_deref(), Some("/199"));
        assert_eq!(detect_card_number("one of 3 cards"), None);
        assert_eq!(detect_card_number("a / 10 parallel").as_deref(), Some("/ 10"));
        assert_eq!(detect_card_number("nothing here"), None);
    }

    #[test]
    fn test_small_print_run_blocks_slash_fallback() {
        // The "of N" branch wins even when it rejects the number
        assert_eq!(detect_card_number("two of 2 then /50"), None);
    }

    #[test]
    fn test_lot_tracking() {
        let mut lots = LotTracker::new();
        assert_eq!(lots.observe("no lot yet 250"), None);
        assert_eq!(lots.observe("lot 170 coming up"), Some(170));
        assert_eq!(lots.observe("now 172 is next"), Some(172));
        assert_eq!(lots.observe("price 500 dollars"), Some(172));
        assert_eq!(lots.observe("nothing numeric"), Some(172));
    }
}
