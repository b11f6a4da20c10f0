//! Vector search trait for the long-term memory collaborator.
//!
//! The search service indexes characters, world entries, plot threads and
//! power-system facts, and answers a batch of natural-language queries with
//! categorized hits. It is fallible and may be absent entirely: an index
//! that is not ready is a normal state, not an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SearchError;

/// A single search hit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the indexed record (character id, world entry id …)
    pub id: String,

    /// Display name of the record
    pub name: String,

    /// Record type within its category, e.g. "character", "geography", "thread"
    pub kind: String,

    /// Relevance score in [0, 1]
    pub score: f32,

    /// Indexed text of the record
    #[serde(default)]
    pub content: String,

    /// Extra attributes (realm, category, threat_level, status …)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SearchHit {
    /// Read a string attribute from the metadata map.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Categorized results of a batch search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub characters: Vec<SearchHit>,
    #[serde(default)]
    pub world_entries: Vec<SearchHit>,
    #[serde(default)]
    pub plot_elements: Vec<SearchHit>,
    #[serde(default)]
    pub power_elements: Vec<SearchHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.characters.len()
            + self.world_entries.len()
            + self.plot_elements.len()
            + self.power_elements.len()
    }
}

/// Options for a batch search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum hits per category
    #[serde(default = "default_limit")]
    pub limit_per_category: usize,

    /// Minimum relevance score threshold
    #[serde(default)]
    pub min_score: f32,
}

fn default_limit() -> usize {
    5
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit_per_category: default_limit(),
            min_score: 0.0,
        }
    }
}

/// The core VectorSearch trait.
///
/// Implementations: in-memory term-vector index, none (never ready).
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// The backend name (e.g., "in_memory", "none").
    fn name(&self) -> &str;

    /// Whether the index can currently answer queries.
    fn is_ready(&self) -> bool;

    /// Run every query and merge the hits per category.
    async fn search(
        &self,
        queries: &[String],
        options: &SearchOptions,
    ) -> std::result::Result<SearchResults, SearchError>;
}
