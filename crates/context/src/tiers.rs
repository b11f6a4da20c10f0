//! Memory tier records.
//!
//! Each tier is recomputed per request and never persisted. Every tier has
//! a well-defined empty value that stands in for it when its gather fails
//! or times out.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::arc_memory::ArcMemorySummary;

/// Verbatim recent text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortTermContext {
    /// Raw text of the most recent chapters, oldest first
    pub chapters: Vec<String>,
    pub chapter_numbers: Vec<u32>,
    /// Transition text linking the previous ending to the next chapter
    pub continuity_bridge: String,
    /// Trailing excerpt of the latest chapter
    pub previous_chapter_ending: String,
    pub style_profile: String,
    pub token_count: usize,
}

/// Arc-level summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MidTermContext {
    /// Most relevant arc first
    pub arc_memories: Vec<ArcMemorySummary>,
    pub formatted_text: String,
    pub active_arc_summary: String,
    pub character_digest: String,
    pub thread_digest: String,
    pub token_count: usize,
}

/// Semantic-search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTermContext {
    pub characters: Vec<String>,
    pub world: Vec<String>,
    pub plot: Vec<String>,
    pub power: Vec<String>,
    pub formatted_text: String,
    pub queries_used: Vec<String>,
    /// False when the search service was absent or not ready
    pub is_available: bool,
    pub token_count: usize,
}

/// Aggregate output of the tier manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    pub short_term: ShortTermContext,
    pub mid_term: MidTermContext,
    pub long_term: LongTermContext,
    pub lore_bible_text: String,
    pub total_token_count: usize,
    #[serde(with = "duration_ms")]
    pub retrieval_duration: Duration,
}

impl MemoryContext {
    /// A context where every tier is its empty fallback.
    pub fn empty(retrieval_duration: Duration) -> Self {
        Self {
            retrieval_duration,
            ..Default::default()
        }
    }

    /// Whether every tier came back empty.
    pub fn is_empty(&self) -> bool {
        self.total_token_count == 0
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
