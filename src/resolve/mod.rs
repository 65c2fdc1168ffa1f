//! Lab name resolution
//!
//! Researchers list their labs as free text. [`LabResolver`] maps such a name
//! onto the canonical registry with a confidence score:
//! - exact match of the normalized text against a lab id or name scores 1.0
//! - substring containment in either direction scores 0.8
//! - otherwise, the share of the name's tokens found in the lab's tokens
//!
//! Resolution is pure: the same name and registry always give the same match.

use crate::graph::LabRecord;
use serde::Serialize;
use std::cmp::Ordering;

/// Default minimum score; a match must score strictly above it
pub const DEFAULT_THRESHOLD: f64 = 0.3;

const EXACT_SCORE: f64 = 1.0;
const SUBSTRING_SCORE: f64 = 0.8;
const MIN_TOKEN_LEN: usize = 3;

/// How a candidate matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Substring,
    Token,
}

impl MatchKind {
    /// Tie-break rank; higher wins
    fn strength(self) -> u8 {
        match self {
            MatchKind::Exact => 3,
            MatchKind::Substring => 2,
            MatchKind::Token => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Substring => "substring",
            MatchKind::Token => "token",
        }
    }
}

/// A resolved lab with its confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabMatch<'a> {
    pub lab: &'a LabRecord,
    pub score: f64,
    pub kind: MatchKind,
}

/// Fuzzy matcher from free-text lab names to canonical labs
#[derive(Debug, Clone, PartialEq)]
pub struct LabResolver {
    threshold: f64,
}

impl Default for LabResolver {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl LabResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best match for `name`, if any candidate clears the threshold
    pub fn resolve<'a>(&self, name: &str, labs: &'a [LabRecord]) -> Option<LabMatch<'a>> {
        self.candidates(name, labs).into_iter().next()
    }

    /// Every candidate above the threshold, best first
    ///
    /// Ordered by score, then match kind (exact, substring, token), then
    /// registry order.
    pub fn candidates<'a>(&self, name: &str, labs: &'a [LabRecord]) -> Vec<LabMatch<'a>> {
        let query = Query::new(name);
        if query.normalized.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<LabMatch<'a>> = labs
            .iter()
            .filter_map(|lab| {
                query
                    .score(lab)
                    .filter(|(score, _)| *score > self.threshold)
                    .map(|(score, kind)| LabMatch { lab, score, kind })
            })
            .collect();

        // Stable sort keeps registry order among equals
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.kind.strength().cmp(&a.kind.strength()))
        });
        matches
    }

    /// Score one lab against `name`, ignoring the threshold
    pub fn score(&self, name: &str, lab: &LabRecord) -> Option<(f64, MatchKind)> {
        Query::new(name).score(lab)
    }
}

/// A free-text name prepared once for scoring against many labs
struct Query {
    normalized: String,
    tokens: Vec<String>,
}

impl Query {
    fn new(name: &str) -> Self {
        Self {
            normalized: normalize(name),
            tokens: tokenize(name),
        }
    }

    fn score(&self, lab: &LabRecord) -> Option<(f64, MatchKind)> {
        if self.normalized.is_empty() {
            return None;
        }

        let lab_id = normalize(&lab.id);
        let lab_name = normalize(&lab.name);

        if self.normalized == lab_id || self.normalized == lab_name {
            return Some((EXACT_SCORE, MatchKind::Exact));
        }

        let contains = |target: &str| {
            !target.is_empty() && (target.contains(&self.normalized) || self.normalized.contains(target))
        };
        if contains(&lab_id) || contains(&lab_name) {
            return Some((SUBSTRING_SCORE, MatchKind::Substring));
        }

        if self.tokens.is_empty() {
            return None;
        }
        let lab_tokens = lab_tokens(lab);
        let hits = self
            .tokens
            .iter()
            .filter(|token| {
                lab_tokens
                    .iter()
                    .any(|lab_token| lab_token.contains(token.as_str()) || token.contains(lab_token.as_str()))
            })
            .count();
        if hits == 0 {
            return None;
        }
        Some((hits as f64 / self.tokens.len() as f64, MatchKind::Token))
    }
}

/// Lowercase and drop everything but letters and digits
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split free text on word and camel-case boundaries
///
/// Tokens are lowercased; tokens shorter than three characters are dropped.
/// `"UWRealityLab"` gives `["reality", "lab"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut raw: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                raw.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "camelCase", "v2Net" and the last capital of "UWReality"
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                raw.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        raw.push(current);
    }

    keep_long(raw.iter().map(String::as_str))
}

/// Tokens of a lab: its id split on `_` and its name split on word boundaries
fn lab_tokens(lab: &LabRecord) -> Vec<String> {
    let mut tokens = keep_long(lab.id.split('_'));
    tokens.extend(keep_long(lab.name.split(|c: char| !c.is_alphanumeric())));
    tokens
}

fn keep_long<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .filter(|part| part.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}
