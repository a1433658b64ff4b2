//! Phase number and range extraction from spoken phrases.
//!
//! Recognizes digits (`phase 3`), number words up to twenty (`phase two`),
//! ordinals up to tenth (`the third phase`), the `#3` shorthand, and
//! ranges written `N to M`, `N through M`, `N-M` or `N and M`.

use regex::Regex;
use std::sync::LazyLock;

const NUMBER_WORDS: [(&str, u32); 20] = [
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
];

const ORDINALS: [(&str, u32); 10] = [
    ("first", 1),
    ("second", 2),
    ("third", 3),
    ("fourth", 4),
    ("fifth", 5),
    ("sixth", 6),
    ("seventh", 7),
    ("eighth", 8),
    ("ninth", 9),
    ("tenth", 10),
];

const TOKEN: &str = r"\d+(?:st|nd|rd|th)?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty|first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth";

static HASH_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\s*(\d+)\b").unwrap());

static PHASE_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bphases?\s+(?:number\s+)?({TOKEN})\b")).unwrap()
});

static ORDINAL_PHASE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({TOKEN})\s+phase\b")).unwrap()
});

static RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({TOKEN})\s*(to|through|thru|-|–|and)\s*(?:phase\s+)?({TOKEN})\b"
    ))
    .unwrap()
});

static BARE_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?:phase\s+)?#?\s*({TOKEN})$")).unwrap());

/// An inclusive range as spoken. `conjunction` is true for the `N and M` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRange {
    pub start: u32,
    pub end: u32,
    pub conjunction: bool,
}

impl PhaseRange {
    /// `start <= end`, and the `and` form only names adjacent phases.
    pub fn is_valid(&self) -> bool {
        self.start <= self.end && (!self.conjunction || self.end == self.start + 1)
    }
}

/// Value of a single number token: digits, number word or ordinal.
pub fn parse_number_token(token: &str) -> Option<u32> {
    let token = token.trim().to_lowercase();
    let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.parse().ok();
    }
    NUMBER_WORDS
        .iter()
        .chain(ORDINALS.iter())
        .find(|(word, _)| *word == token)
        .map(|(_, n)| *n)
}

/// First phase number mentioned in `text`.
pub fn extract_phase_number(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();

    if let Some(caps) = HASH_REGEX.captures(&lower) {
        return caps[1].parse().ok();
    }
    if let Some(caps) = PHASE_TOKEN_REGEX.captures(&lower) {
        return parse_number_token(&caps[1]);
    }
    if let Some(caps) = ORDINAL_PHASE_REGEX.captures(&lower) {
        return parse_number_token(&caps[1]);
    }
    BARE_TOKEN_REGEX
        .captures(lower.trim())
        .and_then(|caps| parse_number_token(&caps[1]))
}

/// First range mentioned in `text`, valid or not.
pub fn extract_range(text: &str) -> Option<PhaseRange> {
    let lower = text.to_lowercase();
    let caps = RANGE_REGEX.captures(&lower)?;
    Some(PhaseRange {
        start: parse_number_token(&caps[1])?,
        end: parse_number_token(&caps[3])?,
        conjunction: &caps[2] == "and",
    })
}
