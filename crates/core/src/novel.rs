//! The novel snapshot, the read-only source of truth for every memory tier.
//!
//! A [`NovelState`] is loaded once per request (from the novel store or a
//! JSON file) and shared immutably across all concurrent tier gathers.
//! Nothing in the engine mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StateError;

/// A complete snapshot of a novel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovelState {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Chapters in any order; use [`NovelState::chapters_sorted`] for reading order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,

    #[serde(default)]
    pub characters: Vec<Character>,

    /// The plot ledger.
    #[serde(default)]
    pub arcs: Vec<StoryArc>,

    #[serde(default)]
    pub threads: Vec<StoryThread>,

    /// World-bible entries.
    #[serde(default)]
    pub world_entries: Vec<WorldEntry>,

    #[serde(default)]
    pub territories: Vec<Territory>,

    /// Technique registry.
    #[serde(default)]
    pub techniques: Vec<NamedEntry>,

    /// Item registry.
    #[serde(default)]
    pub items: Vec<NamedEntry>,

    #[serde(default)]
    pub antagonists: Vec<Antagonist>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub id: String,
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_protagonist: bool,
    #[serde(default)]
    pub status: CharacterStatus,
    /// Current cultivation realm or power level, free text.
    #[serde(default)]
    pub cultivation: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub update_history: Vec<CharacterUpdate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    #[default]
    Alive,
    Deceased,
    Unknown,
}

impl CharacterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Deceased => "deceased",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub character_id: String,
    pub name: String,
    /// Relationship type, e.g. "master", "rival", "sworn brother".
    pub kind: String,
}

/// One entry of a character's change log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterUpdate {
    pub chapter_number: u32,
    /// Names of the fields that changed, e.g. `["cultivation", "status"]`.
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryArc {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_chapter: u32,
    /// `None` while the arc is still open.
    #[serde(default)]
    pub end_chapter: Option<u32>,
    #[serde(default)]
    pub status: ArcStatus,
}

impl StoryArc {
    pub fn is_active(&self) -> bool {
        self.status == ArcStatus::Active
    }

    /// Whether a chapter number falls inside this arc (open arcs never end).
    pub fn contains_chapter(&self, number: u32) -> bool {
        number >= self.start_chapter && self.end_chapter.is_none_or(|end| number <= end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcStatus {
    #[default]
    Active,
    Completed,
}

impl ArcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryThread {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub kind: ThreadKind,
    #[serde(default)]
    pub status: ThreadStatus,
    pub introduced_chapter: u32,
    /// Chapters in which the thread progressed.
    #[serde(default)]
    pub activity_chapters: Vec<u32>,
    #[serde(default)]
    pub resolved_chapter: Option<u32>,
    #[serde(default)]
    pub character_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadKind {
    Conflict,
    Mystery,
    Romance,
    Quest,
    Relationship,
    Power,
    #[default]
    Other,
}

impl ThreadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Mystery => "mystery",
            Self::Romance => "romance",
            Self::Quest => "quest",
            Self::Relationship => "relationship",
            Self::Power => "power",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    #[default]
    Active,
    Paused,
    Resolved,
    Abandoned,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Resolved => "resolved",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: WorldCategory,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldCategory {
    Geography,
    Sects,
    PowerSystem,
    Techniques,
    Items,
    History,
    Culture,
    #[default]
    Other,
}

impl WorldCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geography => "geography",
            Self::Sects => "sects",
            Self::PowerSystem => "power_system",
            Self::Techniques => "techniques",
            Self::Items => "items",
            Self::History => "history",
            Self::Culture => "culture",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Territory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// An entry of the technique or item registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Antagonist {
    pub id: String,
    pub name: String,
    /// Linked character record, if the antagonist is also a character.
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub threat_level: ThreatLevel,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    #[default]
    Low,
    Medium,
    High,
    Extreme,
}

impl ThreatLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "extreme" => Some(Self::Extreme),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleProfile {
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub point_of_view: String,
    #[serde(default)]
    pub tense: String,
    #[serde(default)]
    pub notes: String,
}

impl StyleProfile {
    /// Render the profile as prompt text. Empty fields are left out.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.tone.is_empty() {
            lines.push(format!("Tone: {}", self.tone));
        }
        if !self.point_of_view.is_empty() {
            lines.push(format!("Point of view: {}", self.point_of_view));
        }
        if !self.tense.is_empty() {
            lines.push(format!("Tense: {}", self.tense));
        }
        if !self.notes.is_empty() {
            lines.push(self.notes.clone());
        }
        lines.join("\n")
    }
}

impl NovelState {
    /// Load a snapshot from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, StateError> {
        let content = std::fs::read_to_string(path).map_err(|e| StateError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let state: Self =
            serde_json::from_str(&content).map_err(|e| StateError::Invalid(e.to_string()))?;
        tracing::debug!(
            path = %path.display(),
            chapters = state.chapters.len(),
            characters = state.characters.len(),
            arcs = state.arcs.len(),
            "Loaded novel snapshot"
        );
        Ok(state)
    }

    /// The designated protagonist, if any.
    pub fn protagonist(&self) -> Option<&Character> {
        self.characters.iter().find(|c| c.is_protagonist)
    }

    /// The first arc whose status is active.
    pub fn active_arc(&self) -> Option<&StoryArc> {
        self.arcs.iter().find(|a| a.is_active())
    }

    /// The chapter with the highest number.
    pub fn latest_chapter(&self) -> Option<&Chapter> {
        self.chapters.iter().max_by_key(|c| c.number)
    }

    /// Chapters in reading order.
    pub fn chapters_sorted(&self) -> Vec<&Chapter> {
        let mut chapters: Vec<&Chapter> = self.chapters.iter().collect();
        chapters.sort_by_key(|c| c.number);
        chapters
    }

    /// The chapter number the next generation call will produce.
    pub fn next_chapter_number(&self) -> u32 {
        self.latest_chapter().map_or(1, |c| c.number.saturating_add(1))
    }

    pub fn character_by_id(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn character_by_name(&self, name: &str) -> Option<&Character> {
        self.characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
