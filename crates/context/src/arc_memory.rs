//! Mid-term memory: structured summaries of story arcs.
//!
//! Every function here is a pure function of the arc, the chapters and the
//! novel snapshot: identical inputs always produce value-identical records.
//! Nothing is cached between calls.

use chrono::{DateTime, Utc};
use chronicle_core::novel::{
    ArcStatus, Chapter, Character, CharacterStatus, NovelState, StoryArc, ThreadKind,
    ThreadStatus,
};
use serde::{Deserialize, Serialize};

/// Verbs that mark a sentence as a plot event.
pub const ACTION_VERBS: &[&str] = &[
    "discovered",
    "revealed",
    "defeated",
    "escaped",
    "arrived",
    "met",
    "learned",
    "received",
    "lost",
    "gained",
    "broke through",
    "confronted",
    "allied",
    "betrayed",
    "rescued",
    "destroyed",
];

/// Limits and vocabularies used by [`ArcMemoryService`].
#[derive(Debug, Clone)]
pub struct ArcMemoryConfig {
    pub max_summary_words: usize,
    pub min_event_chars: usize,
    pub max_event_chars: usize,
    /// Prefix length used for near-duplicate event detection
    pub dedup_prefix_chars: usize,
    pub max_key_events: usize,
    /// Characters tracked besides the protagonist
    pub max_side_characters: usize,
    pub max_relationships: usize,
    pub max_threads: usize,
    /// Assumed length of an open arc when filtering threads by introduction
    pub open_arc_horizon: u32,
    pub action_verbs: &'static [&'static str],
}

impl Default for ArcMemoryConfig {
    fn default() -> Self {
        Self {
            max_summary_words: 500,
            min_event_chars: 20,
            max_event_chars: 200,
            dedup_prefix_chars: 30,
            max_key_events: 10,
            max_side_characters: 5,
            max_relationships: 3,
            max_threads: 10,
            open_arc_horizon: 100,
            action_verbs: ACTION_VERBS,
        }
    }
}

// ── Types ─────────────────────────────────────────────────────────────────

/// Structured mid-term memory of one arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcMemorySummary {
    pub arc_id: String,
    pub arc_title: String,
    pub start_chapter: u32,
    pub end_chapter: Option<u32>,
    pub status: ArcStatus,
    /// At most 500 words.
    pub summary: String,
    pub key_events: Vec<String>,
    pub character_states: Vec<ArcCharacterState>,
    pub thread_states: Vec<ArcThreadState>,
    pub conflict_changes: ConflictChanges,
    pub unresolved_elements: Vec<String>,
    /// Earliest creation time of the arc's chapters.
    pub created_at: Option<DateTime<Utc>>,
    /// Latest update time of the arc's chapters.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcCharacterState {
    pub character_id: String,
    pub name: String,
    pub status: CharacterStatus,
    pub cultivation: String,
    pub relationships: Vec<RelationshipSnapshot>,
    pub major_changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSnapshot {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcThreadState {
    pub thread_id: String,
    pub title: String,
    pub kind: ThreadKind,
    pub status_at_arc_start: ThreadPhase,
    pub current_status: ThreadStatus,
    pub is_resolved: bool,
}

/// Where a thread stood when the arc began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPhase {
    /// First appeared during the arc
    Introduced,
    /// Already running before the arc
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictChanges {
    pub introduced: Vec<String>,
    pub resolved: Vec<String>,
}

// ── Service ───────────────────────────────────────────────────────────────

/// Builds arc memories. Holds no state beyond its configuration.
#[derive(Debug, Clone, Default)]
pub struct ArcMemoryService {
    config: ArcMemoryConfig,
}

impl ArcMemoryService {
    pub fn new(config: ArcMemoryConfig) -> Self {
        Self { config }
    }

    /// Summarize the chapters of an arc.
    ///
    /// Falls back to the arc's own description when no chapter lies inside
    /// the arc. The result never exceeds `max_summary_words` words.
    pub fn generate_arc_summary(&self, arc: &StoryArc, chapters: &[Chapter]) -> String {
        let in_arc = chapters_in_arc(arc, chapters);
        if in_arc.is_empty() {
            return arc.description.clone();
        }

        let summaries = chapter_summaries(&in_arc);
        let mut text = summaries.join(" ");

        let events = self.extract_key_events(&summaries);
        if !events.is_empty() {
            let listed: Vec<&str> = events
                .iter()
                .take(self.config.max_key_events)
                .map(String::as_str)
                .collect();
            text.push_str("\n\nKey events: ");
            text.push_str(&listed.join("; "));
        }

        truncate_words(&text, self.config.max_summary_words)
    }

    /// Pull event sentences out of chapter summaries.
    ///
    /// A sentence qualifies when its length is within bounds and it contains
    /// an action verb. Near-duplicates are dropped by prefix containment:
    /// a candidate is skipped if a kept event's prefix occurs in it, or its
    /// own prefix occurs in a kept event.
    pub fn extract_key_events<S: AsRef<str>>(&self, summaries: &[S]) -> Vec<String> {
        let mut events: Vec<String> = Vec::new();
        let mut events_lower: Vec<String> = Vec::new();

        for summary in summaries {
            for sentence in summary.as_ref().split(['.', '!', '?']) {
                let sentence = sentence.trim();
                let len = sentence.chars().count();
                if len < self.config.min_event_chars || len > self.config.max_event_chars {
                    continue;
                }

                let lower = sentence.to_lowercase();
                if !self.config.action_verbs.iter().any(|v| lower.contains(v)) {
                    continue;
                }

                let prefix = char_prefix(&lower, self.config.dedup_prefix_chars);
                let duplicate = events_lower.iter().any(|kept| {
                    let kept_prefix = char_prefix(kept, self.config.dedup_prefix_chars);
                    lower.contains(kept_prefix) || kept.contains(prefix)
                });
                if duplicate {
                    continue;
                }

                events.push(sentence.to_string());
                events_lower.push(lower);
            }
        }

        events
    }

    /// Character snapshots for an arc: the protagonist first, then up to
    /// `max_side_characters` characters named in the arc's chapters.
    pub fn build_arc_character_states(
        &self,
        arc: &StoryArc,
        chapters: &[Chapter],
        state: &NovelState,
    ) -> Vec<ArcCharacterState> {
        let haystack = chapters_in_arc(arc, chapters)
            .iter()
            .map(|c| format!("{} {}", c.content, c.summary))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut states = Vec::new();
        let protagonist = state.protagonist();
        if let Some(p) = protagonist {
            states.push(self.character_state(arc, p));
        }

        let side_characters = state
            .characters
            .iter()
            .filter(|c| protagonist.is_none_or(|p| p.id != c.id))
            .filter(|c| !c.name.is_empty() && haystack.contains(&c.name.to_lowercase()))
            .take(self.config.max_side_characters);
        for character in side_characters {
            states.push(self.character_state(arc, character));
        }

        states
    }

    fn character_state(&self, arc: &StoryArc, character: &Character) -> ArcCharacterState {
        let relationships = character
            .relationships
            .iter()
            .take(self.config.max_relationships)
            .map(|r| RelationshipSnapshot {
                name: r.name.clone(),
                kind: r.kind.clone(),
            })
            .collect();

        let mut major_changes: Vec<String> = Vec::new();
        let changes = character
            .update_history
            .iter()
            .filter(|u| arc.contains_chapter(u.chapter_number))
            .flat_map(|u| u.changes.iter());
        for change in changes {
            let change = change.to_lowercase();
            let marker = if change.contains("cultivation") || change.contains("realm") {
                "cultivation breakthrough"
            } else if change.contains("status") {
                "status changed"
            } else if change.contains("technique") {
                "learned new technique"
            } else {
                continue;
            };
            if !major_changes.iter().any(|m| m == marker) {
                major_changes.push(marker.to_string());
            }
        }

        ArcCharacterState {
            character_id: character.id.clone(),
            name: character.name.clone(),
            status: character.status,
            cultivation: character.cultivation.clone(),
            relationships,
            major_changes,
        }
    }

    /// Threads relevant to an arc, capped at `max_threads`.
    pub fn build_arc_thread_states(&self, arc: &StoryArc, state: &NovelState) -> Vec<ArcThreadState> {
        let intro_limit = arc
            .end_chapter
            .unwrap_or(arc.start_chapter.saturating_add(self.config.open_arc_horizon));

        state
            .threads
            .iter()
            .filter(|t| t.introduced_chapter <= intro_limit)
            .filter(|t| {
                t.activity_chapters.iter().any(|&c| arc.contains_chapter(c))
                    || t.status == ThreadStatus::Active
            })
            .take(self.config.max_threads)
            .map(|t| {
                let status_at_arc_start = if t.introduced_chapter >= arc.start_chapter {
                    ThreadPhase::Introduced
                } else {
                    ThreadPhase::Active
                };
                let is_resolved = t.status == ThreadStatus::Resolved
                    && match arc.end_chapter {
                        None => true,
                        Some(end) => t.resolved_chapter.is_some_and(|r| r <= end),
                    };
                ArcThreadState {
                    thread_id: t.id.clone(),
                    title: t.title.clone(),
                    kind: t.kind,
                    status_at_arc_start,
                    current_status: t.status,
                    is_resolved,
                }
            })
            .collect()
    }

    /// Compose the full memory record for one arc.
    pub fn build_arc_memory_summary(&self, arc: &StoryArc, state: &NovelState) -> ArcMemorySummary {
        let in_arc = chapters_in_arc(arc, &state.chapters);
        let mut key_events = self.extract_key_events(&chapter_summaries(&in_arc));
        key_events.truncate(self.config.max_key_events);

        let thread_states = self.build_arc_thread_states(arc, state);

        let mut conflict_changes = ConflictChanges::default();
        for t in thread_states.iter().filter(|t| t.kind == ThreadKind::Conflict) {
            if t.status_at_arc_start == ThreadPhase::Introduced {
                conflict_changes.introduced.push(t.title.clone());
            }
            if t.is_resolved {
                conflict_changes.resolved.push(t.title.clone());
            }
        }

        let unresolved_elements = thread_states
            .iter()
            .filter(|t| !t.is_resolved && t.kind != ThreadKind::Conflict)
            .map(|t| format!("{} ({})", t.title, t.kind.as_str()))
            .collect();

        ArcMemorySummary {
            arc_id: arc.id.clone(),
            arc_title: arc.title.clone(),
            start_chapter: arc.start_chapter,
            end_chapter: arc.end_chapter,
            status: arc.status,
            summary: self.generate_arc_summary(arc, &state.chapters),
            key_events,
            character_states: self.build_arc_character_states(arc, &state.chapters, state),
            thread_states,
            conflict_changes,
            unresolved_elements,
            created_at: in_arc.iter().filter_map(|c| c.created_at).min(),
            updated_at: in_arc
                .iter()
                .filter_map(|c| c.updated_at.or(c.created_at))
                .max(),
        }
    }

    /// Memory records for every arc, in ledger order.
    pub fn build_all_arc_memories(&self, state: &NovelState) -> Vec<ArcMemorySummary> {
        state
            .arcs
            .iter()
            .map(|arc| self.build_arc_memory_summary(arc, state))
            .collect()
    }

    /// The `max_arcs` most relevant arc memories.
    ///
    /// Ordering: the active arc first, then by descending end chapter, where
    /// an open arc ends at `current_chapter`. The sort is stable.
    pub fn get_relevant_arc_memories(
        &self,
        state: &NovelState,
        current_chapter: u32,
        max_arcs: usize,
    ) -> Vec<ArcMemorySummary> {
        let mut memories = self.build_all_arc_memories(state);
        memories.sort_by(|a, b| {
            let a_active = a.status == ArcStatus::Active;
            let b_active = b.status == ArcStatus::Active;
            b_active.cmp(&a_active).then_with(|| {
                let a_end = a.end_chapter.unwrap_or(current_chapter);
                let b_end = b.end_chapter.unwrap_or(current_chapter);
                b_end.cmp(&a_end)
            })
        });
        memories.truncate(max_arcs);
        memories
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────

impl ArcMemorySummary {
    /// "12–20" or "12–present".
    pub fn chapter_range(&self) -> String {
        match self.end_chapter {
            Some(end) => format!("{}–{}", self.start_chapter, end),
            None => format!("{}–present", self.start_chapter),
        }
    }

    /// Render the memory as prompt text.
    pub fn render(&self, compact: bool) -> String {
        if compact {
            return format!(
                "- {} (ch. {}, {}): {}",
                self.arc_title,
                self.chapter_range(),
                self.status.as_str(),
                truncate_words(&self.summary, 60)
            );
        }

        let mut out = format!(
            "{} (chapters {}, {})\n{}",
            self.arc_title,
            self.chapter_range(),
            self.status.as_str(),
            self.summary
        );
        if !self.unresolved_elements.is_empty() {
            out.push_str(&format!("\nUnresolved: {}", self.unresolved_elements.join("; ")));
        }
        if !self.conflict_changes.introduced.is_empty() {
            out.push_str(&format!(
                "\nConflicts introduced: {}",
                self.conflict_changes.introduced.join("; ")
            ));
        }
        if !self.conflict_changes.resolved.is_empty() {
            out.push_str(&format!(
                "\nConflicts resolved: {}",
                self.conflict_changes.resolved.join("; ")
            ));
        }
        out
    }

    /// Section text for the currently active arc.
    pub fn active_summary_text(&self) -> String {
        format!(
            "[Current Arc: {} — chapters {}]\n{}",
            self.arc_title,
            self.chapter_range(),
            self.summary
        )
    }

    /// One line per tracked character. Empty when nobody is tracked.
    pub fn character_digest(&self) -> String {
        if self.character_states.is_empty() {
            return String::new();
        }
        let mut out = String::from("[Character States]\n");
        for c in &self.character_states {
            let realm = if c.cultivation.is_empty() { "unknown realm" } else { &c.cultivation };
            out.push_str(&format!("- {} ({}, {})", c.name, realm, c.status.as_str()));
            if !c.relationships.is_empty() {
                let rels: Vec<String> = c
                    .relationships
                    .iter()
                    .map(|r| format!("{} ({})", r.name, r.kind))
                    .collect();
                out.push_str(&format!("; relationships: {}", rels.join(", ")));
            }
            if !c.major_changes.is_empty() {
                out.push_str(&format!("; this arc: {}", c.major_changes.join(", ")));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// One line per tracked thread. Empty when no thread is tracked.
    pub fn thread_digest(&self) -> String {
        if self.thread_states.is_empty() {
            return String::new();
        }
        let mut out = String::from("[Thread Status]\n");
        for t in &self.thread_states {
            let state = if t.is_resolved { "resolved" } else { t.current_status.as_str() };
            out.push_str(&format!("- {} [{}]: {}", t.title, t.kind.as_str(), state));
            if t.status_at_arc_start == ThreadPhase::Introduced {
                out.push_str(" (introduced this arc)");
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn chapters_in_arc<'a>(arc: &StoryArc, chapters: &'a [Chapter]) -> Vec<&'a Chapter> {
    let mut in_arc: Vec<&Chapter> = chapters
        .iter()
        .filter(|c| arc.contains_chapter(c.number))
        .collect();
    in_arc.sort_by_key(|c| c.number);
    in_arc
}

fn chapter_summaries(chapters: &[&Chapter]) -> Vec<String> {
    chapters
        .iter()
        .map(|c| {
            if c.summary.trim().is_empty() {
                c.title.clone()
            } else {
                c.summary.clone()
            }
        })
        .collect()
}

/// The first `n` characters of `s`, on a char boundary.
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keep at most `max_words` words, marking the cut with a trailing "...".
pub(crate) fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    format!("{}...", words[..max_words].join(" "))
}
