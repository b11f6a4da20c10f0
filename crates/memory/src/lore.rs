//! State-derived lore synthesizer.
//!
//! Builds a lore bible directly from the novel snapshot: the protagonist's
//! current standing, the active arc, unresolved conflicts, key
//! relationships and the power-system entries of the world bible. No model
//! call is involved, so it is cheap enough to run on every request.

use async_trait::async_trait;
use chronicle_core::error::LoreError;
use chronicle_core::lore::{LoreBible, LoreSynthesizer, ProtagonistSnapshot};
use chronicle_core::novel::{NovelState, ThreadKind, ThreadStatus, WorldCategory};
use tracing::debug;

/// Maximum entries per lore-bible list.
const MAX_LIST_ITEMS: usize = 5;

/// Synthesizes a lore bible from the snapshot alone.
pub struct StateLoreSynthesizer {
    /// Fail instead of returning a partial bible when no protagonist exists.
    require_protagonist: bool,
}

impl StateLoreSynthesizer {
    pub fn new() -> Self {
        Self {
            require_protagonist: false,
        }
    }

    /// Treat a missing protagonist as an error.
    pub fn strict(mut self) -> Self {
        self.require_protagonist = true;
        self
    }
}

impl Default for StateLoreSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoreSynthesizer for StateLoreSynthesizer {
    fn name(&self) -> &str {
        "state"
    }

    async fn build_lore_bible(
        &self,
        state: &NovelState,
        chapter_number: u32,
    ) -> Result<LoreBible, LoreError> {
        let protagonist = state.protagonist();
        if protagonist.is_none() && self.require_protagonist {
            return Err(LoreError::MissingProtagonist(state.id.clone()));
        }

        let protagonist_snapshot = protagonist.map(|p| ProtagonistSnapshot {
            name: p.name.clone(),
            cultivation: if p.cultivation.is_empty() {
                "unknown".into()
            } else {
                p.cultivation.clone()
            },
            status: p.status.as_str().into(),
            techniques: state
                .techniques
                .iter()
                .filter(|t| t.description.contains(&p.name))
                .map(|t| t.name.clone())
                .take(MAX_LIST_ITEMS)
                .collect(),
        });

        let key_relationships = protagonist
            .map(|p| {
                p.relationships
                    .iter()
                    .take(MAX_LIST_ITEMS)
                    .map(|r| format!("{} ({})", r.name, r.kind))
                    .collect()
            })
            .unwrap_or_default();

        let active_arc = state.active_arc().map(|arc| {
            if arc.description.is_empty() {
                arc.title.clone()
            } else {
                format!("{} — {}", arc.title, arc.description)
            }
        });

        let active_conflicts = state
            .threads
            .iter()
            .filter(|t| t.kind == ThreadKind::Conflict && t.status == ThreadStatus::Active)
            .filter(|t| t.introduced_chapter < chapter_number.max(1))
            .take(MAX_LIST_ITEMS)
            .map(|t| t.title.clone())
            .collect();

        let world_facts = state
            .world_entries
            .iter()
            .filter(|e| e.category == WorldCategory::PowerSystem)
            .take(MAX_LIST_ITEMS)
            .map(|e| format!("{}: {}", e.title, first_sentence(&e.content)))
            .collect();

        let bible = LoreBible {
            chapter_number,
            protagonist: protagonist_snapshot,
            active_arc,
            active_conflicts,
            world_facts,
            key_relationships,
        };

        debug!(
            chapter = chapter_number,
            empty = bible.is_empty(),
            "Synthesized lore bible from state"
        );
        Ok(bible)
    }
}

fn first_sentence(text: &str) -> &str {
    let end = text
        .find(['.', '!', '?'])
        .map_or(text.len(), |i| i + 1);
    text[..end].trim()
}
