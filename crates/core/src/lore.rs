//! Lore synthesis trait: the structured "current state of the world" snapshot.
//!
//! The lore bible is built by an external collaborator. The engine only needs
//! to call it under a deadline and render the result as prompt text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LoreError;
use crate::novel::NovelState;

/// A synthesized snapshot of protagonist and world state at a chapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreBible {
    pub chapter_number: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protagonist: Option<ProtagonistSnapshot>,

    /// Title and one-line description of the active arc
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_arc: Option<String>,

    #[serde(default)]
    pub active_conflicts: Vec<String>,

    #[serde(default)]
    pub world_facts: Vec<String>,

    #[serde(default)]
    pub key_relationships: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtagonistSnapshot {
    pub name: String,
    pub cultivation: String,
    pub status: String,
    #[serde(default)]
    pub techniques: Vec<String>,
}

impl LoreBible {
    pub fn is_empty(&self) -> bool {
        self.protagonist.is_none()
            && self.active_arc.is_none()
            && self.active_conflicts.is_empty()
            && self.world_facts.is_empty()
            && self.key_relationships.is_empty()
    }
}

/// The core LoreSynthesizer trait.
#[async_trait]
pub trait LoreSynthesizer: Send + Sync {
    /// The synthesizer name (e.g., "state", "none").
    fn name(&self) -> &str;

    /// Build the lore bible for the given chapter.
    async fn build_lore_bible(
        &self,
        state: &NovelState,
        chapter_number: u32,
    ) -> std::result::Result<LoreBible, LoreError>;

    /// Render a lore bible as prompt text.
    fn format(&self, bible: &LoreBible, compact: bool) -> String {
        format_lore_bible(bible, compact)
    }
}

/// Default rendering shared by the built-in synthesizers.
///
/// Returns an empty string for an empty bible so the section is skipped.
pub fn format_lore_bible(bible: &LoreBible, compact: bool) -> String {
    if bible.is_empty() {
        return String::new();
    }

    let mut out = format!("[Lore Bible — before chapter {}]\n", bible.chapter_number);

    if let Some(p) = &bible.protagonist {
        if compact {
            out.push_str(&format!("Protagonist: {} ({}, {})\n", p.name, p.cultivation, p.status));
        } else {
            out.push_str(&format!("Protagonist: {}\n", p.name));
            out.push_str(&format!("  Cultivation: {}\n", p.cultivation));
            out.push_str(&format!("  Status: {}\n", p.status));
            if !p.techniques.is_empty() {
                out.push_str(&format!("  Techniques: {}\n", p.techniques.join(", ")));
            }
        }
    }

    if let Some(arc) = &bible.active_arc {
        out.push_str(&format!("Current arc: {}\n", arc));
    }

    let lists: [(&str, &Vec<String>); 3] = [
        ("Active conflicts", &bible.active_conflicts),
        ("Relationships", &bible.key_relationships),
        ("World", &bible.world_facts),
    ];
    for (label, items) in lists {
        if items.is_empty() {
            continue;
        }
        if compact {
            out.push_str(&format!("{}: {}\n", label, items.join("; ")));
        } else {
            out.push_str(&format!("{}:\n", label));
            for item in items {
                out.push_str(&format!("- {}\n", item));
            }
        }
    }

    out.trim_end().to_string()
}
