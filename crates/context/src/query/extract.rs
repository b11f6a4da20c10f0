//! Entity and keyword extractors.
//!
//! All extractors are pure functions over the analysis window. They run
//! independently, so the same name may be reported by more than one of them.

use std::collections::HashSet;
use std::sync::LazyLock;

use chronicle_core::novel::{NovelState, WorldCategory};
use regex_lite::Regex;

use super::vocabulary::{AnalyzerVocabulary, KeywordRule};
use super::{EntityKind, ExtractedEntity};

/// Characters of context kept on each side of a match.
const SNIPPET_RADIUS: usize = 50;

static TITLE_CASE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*\b").expect("valid title-case regex")
});

static FOLLOWING_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+([a-z]+)\b").expect("valid verb regex"));

static PREPOSITIONAL_PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Ii]n|[Aa]t|[Nn]ear) the ([A-Z][A-Za-z]+(?:[ \t]+[A-Z][A-Za-z]+)*)")
        .expect("valid place regex")
});

/// Known characters named in the window: whole word, case-insensitive.
///
/// Emits one entity per character, not one per match: later mentions of
/// the same name are ignored and the context snippet surrounds the first.
pub fn known_characters(window: &str, state: &NovelState) -> Vec<ExtractedEntity> {
    let mut entities = Vec::new();
    for character in &state.characters {
        let name = character.name.trim();
        if name.is_empty() {
            continue;
        }
        let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex_lite::escape(name))) else {
            continue;
        };
        if let Some(m) = re.find(window) {
            entities.push(ExtractedEntity {
                name: character.name.clone(),
                kind: EntityKind::Character,
                confidence: 1.0,
                context: snippet(window, m.start(), m.end()),
            });
        }
    }
    entities
}

/// Title-Case runs that look like unfamiliar character names.
///
/// Leading stop words are stripped ("Then Lin Yue" → "Lin Yue"). A name
/// directly followed by a dialogue or action verb scores 0.7, else 0.4.
/// Repeats keep their highest score.
pub fn new_characters(
    window: &str,
    state: &NovelState,
    vocab: &AnalyzerVocabulary,
) -> Vec<ExtractedEntity> {
    let known: HashSet<String> = state
        .characters
        .iter()
        .map(|c| c.name.to_lowercase())
        .collect();

    let mut entities: Vec<ExtractedEntity> = Vec::new();
    for m in TITLE_CASE_RUN.find_iter(window) {
        let words: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|w| vocab.is_stop_word(w))
            .collect();
        if words.is_empty() {
            continue;
        }
        let name = words.join(" ");
        if known.contains(&name.to_lowercase()) {
            continue;
        }

        let followed_by_verb = FOLLOWING_VERB
            .captures(&window[m.end()..])
            .and_then(|caps| caps.get(1))
            .is_some_and(|verb| vocab.dialogue_verbs.contains(&verb.as_str()));
        let confidence = if followed_by_verb { 0.7 } else { 0.4 };

        match entities.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.confidence = existing.confidence.max(confidence),
            None => entities.push(ExtractedEntity {
                name,
                kind: EntityKind::Character,
                confidence,
                context: snippet(window, m.start(), m.end()),
            }),
        }
    }
    entities
}

/// Territories, geography/sect world entries and "in the X" phrases.
pub fn locations(window: &str, state: &NovelState) -> Vec<ExtractedEntity> {
    let mut entities = Vec::new();

    for territory in &state.territories {
        let kind = territory_kind(&territory.kind);
        if let Some(entity) = exact_match(window, &territory.name, 1.0, kind) {
            entities.push(entity);
        }
    }

    for entry in &state.world_entries {
        let kind = match entry.category {
            WorldCategory::Geography => EntityKind::Location,
            WorldCategory::Sects => EntityKind::Sect,
            _ => continue,
        };
        if let Some(entity) = exact_match(window, &entry.title, 0.9, kind) {
            entities.push(entity);
        }
    }

    for caps in PREPOSITIONAL_PLACE.captures_iter(window) {
        let (Some(whole), Some(place)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        entities.push(ExtractedEntity {
            name: place.as_str().to_string(),
            kind: EntityKind::Location,
            confidence: 0.6,
            context: snippet(window, whole.start(), whole.end()),
        });
    }

    entities
}

/// Registered techniques and items named verbatim in the window.
pub fn techniques_and_items(window: &str, state: &NovelState) -> Vec<ExtractedEntity> {
    let techniques = state
        .techniques
        .iter()
        .filter_map(|t| exact_match(window, &t.name, 1.0, EntityKind::Technique));
    let items = state
        .items
        .iter()
        .filter_map(|i| exact_match(window, &i.name, 1.0, EntityKind::Item));
    techniques.chain(items).collect()
}

/// Keywords found in the window, grouped by vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords {
    pub power: Vec<String>,
    pub action: Vec<String>,
    pub relationship: Vec<String>,
}

impl Keywords {
    /// Every keyword once, power terms first.
    pub fn flatten(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.power
            .iter()
            .chain(&self.action)
            .chain(&self.relationship)
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_power(&self, keyword: &str) -> bool {
        self.power.iter().any(|k| k == keyword)
    }
}

/// Substring-membership test of the window against each vocabulary.
pub fn keywords(window: &str, vocab: &AnalyzerVocabulary) -> Keywords {
    let lower = window.to_lowercase();
    Keywords {
        power: matching(&lower, vocab.power_terms),
        action: matching(&lower, vocab.action_terms),
        relationship: matching(&lower, vocab.relationship_terms),
    }
}

fn matching(lower: &str, rules: &[KeywordRule]) -> Vec<String> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .filter(|r| lower.contains(r.trigger))
        .filter(|r| seen.insert(r.keyword))
        .map(|r| r.keyword.to_string())
        .collect()
}

fn territory_kind(kind: &str) -> EntityKind {
    if kind.to_lowercase().contains("sect") {
        EntityKind::Sect
    } else {
        EntityKind::Location
    }
}

fn exact_match(
    window: &str,
    name: &str,
    confidence: f32,
    kind: EntityKind,
) -> Option<ExtractedEntity> {
    if name.is_empty() {
        return None;
    }
    let start = window.find(name)?;
    Some(ExtractedEntity {
        name: name.to_string(),
        kind,
        confidence,
        context: snippet(window, start, start + name.len()),
    })
}

/// The match plus up to [`SNIPPET_RADIUS`] characters on each side.
fn snippet(window: &str, start: usize, end: usize) -> String {
    let from = window[..start]
        .char_indices()
        .rev()
        .take(SNIPPET_RADIUS)
        .last()
        .map_or(start, |(i, _)| i);
    let to = window[end..]
        .char_indices()
        .nth(SNIPPET_RADIUS)
        .map_or(window.len(), |(i, _)| end + i);
    window[from..to].trim().to_string()
}
