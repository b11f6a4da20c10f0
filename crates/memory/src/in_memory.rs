//! In-memory search index, useful for testing and for running the engine
//! without an external vector service.
//!
//! Documents are built from a [`NovelState`] snapshot and ranked by cosine
//! similarity between term-frequency vectors. Each document keeps the best
//! score it reached across all queries of a batch.

use async_trait::async_trait;
use chronicle_core::error::SearchError;
use chronicle_core::novel::{NovelState, WorldCategory};
use chronicle_core::search::{SearchHit, SearchOptions, SearchResults, VectorSearch};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::vector::{TermVector, cosine_similarity, term_vector};

/// Result category a document is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Characters,
    World,
    Plot,
    Power,
}

struct IndexedDoc {
    category: Category,
    hit: SearchHit,
    vector: TermVector,
}

/// An in-memory index over a novel's characters, world entries, threads and
/// technique/item registries.
pub struct InMemoryIndex {
    docs: Arc<RwLock<Vec<IndexedDoc>>>,
    ready: AtomicBool,
}

impl InMemoryIndex {
    /// Create an empty index. It reports not-ready until a state is indexed.
    pub fn new() -> Self {
        Self {
            docs: Arc::new(RwLock::new(Vec::new())),
            ready: AtomicBool::new(false),
        }
    }

    /// Create an index that is immediately ready for `state`.
    pub fn from_state(state: &NovelState) -> Self {
        let docs = build_documents(state);
        Self {
            docs: Arc::new(RwLock::new(docs)),
            ready: AtomicBool::new(true),
        }
    }

    /// Replace the indexed documents with those built from `state`.
    ///
    /// Returns the number of indexed documents.
    pub async fn index_state(&self, state: &NovelState) -> usize {
        let docs = build_documents(state);
        let count = docs.len();
        *self.docs.write().await = docs;
        self.ready.store(true, Ordering::Release);
        debug!(documents = count, novel = %state.id, "Indexed novel state");
        count
    }

    /// Number of indexed documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorSearch for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn search(
        &self,
        queries: &[String],
        options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        if !self.is_ready() {
            return Err(SearchError::Unavailable("index has not been built".into()));
        }

        let query_vectors: Vec<TermVector> = queries.iter().map(|q| term_vector(q)).collect();
        let docs = self.docs.read().await;

        let mut results = SearchResults::default();
        for doc in docs.iter() {
            let best = query_vectors
                .iter()
                .map(|qv| cosine_similarity(qv, &doc.vector))
                .fold(0.0f32, f32::max);
            if best <= 0.0 || best < options.min_score {
                continue;
            }
            let mut hit = doc.hit.clone();
            hit.score = best;
            match doc.category {
                Category::Characters => results.characters.push(hit),
                Category::World => results.world_entries.push(hit),
                Category::Plot => results.plot_elements.push(hit),
                Category::Power => results.power_elements.push(hit),
            }
        }

        for list in [
            &mut results.characters,
            &mut results.world_entries,
            &mut results.plot_elements,
            &mut results.power_elements,
        ] {
            list.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            list.truncate(options.limit_per_category);
        }

        debug!(
            queries = queries.len(),
            hits = results.len(),
            "In-memory search complete"
        );
        Ok(results)
    }
}

fn build_documents(state: &NovelState) -> Vec<IndexedDoc> {
    let mut docs = Vec::new();

    for character in &state.characters {
        let content = format!(
            "{}. {} Cultivation: {}.",
            character.name, character.description, character.cultivation
        );
        let mut hit = hit(&character.id, &character.name, "character", content);
        hit.metadata.insert("status".into(), character.status.as_str().into());
        if !character.cultivation.is_empty() {
            hit.metadata.insert("realm".into(), character.cultivation.clone().into());
        }
        if let Some(antagonist) = state
            .antagonists
            .iter()
            .find(|a| a.character_id.as_deref() == Some(character.id.as_str()))
        {
            hit.metadata.insert(
                "threat_level".into(),
                serde_json::to_value(antagonist.threat_level).unwrap_or_default(),
            );
        }
        docs.push(doc(Category::Characters, hit));
    }

    // Antagonists without a character record are indexed on their own.
    for antagonist in state.antagonists.iter().filter(|a| a.character_id.is_none()) {
        let content = format!("{}. Antagonist, {}.", antagonist.name, antagonist.status);
        let mut hit = hit(&antagonist.id, &antagonist.name, "antagonist", content);
        hit.metadata.insert(
            "threat_level".into(),
            serde_json::to_value(antagonist.threat_level).unwrap_or_default(),
        );
        docs.push(doc(Category::Characters, hit));
    }

    for entry in &state.world_entries {
        let category = match entry.category {
            WorldCategory::PowerSystem | WorldCategory::Techniques | WorldCategory::Items => {
                Category::Power
            }
            _ => Category::World,
        };
        let mut hit = hit(&entry.id, &entry.title, entry.category.as_str(), entry.content.clone());
        hit.metadata.insert("category".into(), entry.category.as_str().into());
        docs.push(doc(category, hit));
    }

    for territory in &state.territories {
        let content = format!("{}. {}", territory.kind, territory.description);
        let mut hit = hit(&territory.id, &territory.name, "territory", content);
        hit.metadata.insert("category".into(), "geography".into());
        docs.push(doc(Category::World, hit));
    }

    for thread in &state.threads {
        let mut hit = hit(&thread.id, &thread.title, "thread", thread.description.clone());
        hit.metadata.insert("status".into(), thread.status.as_str().into());
        hit.metadata.insert("thread_kind".into(), thread.kind.as_str().into());
        docs.push(doc(Category::Plot, hit));
    }

    for technique in &state.techniques {
        let hit = hit(&technique.id, &technique.name, "technique", technique.description.clone());
        docs.push(doc(Category::Power, hit));
    }

    for item in &state.items {
        let hit = hit(&item.id, &item.name, "item", item.description.clone());
        docs.push(doc(Category::Power, hit));
    }

    docs
}

fn hit(id: &str, name: &str, kind: &str, content: String) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
        score: 0.0,
        content,
        metadata: Default::default(),
    }
}

fn doc(category: Category, hit: SearchHit) -> IndexedDoc {
    // Names are weighted twice so direct mentions dominate.
    let vector = term_vector(&format!("{} {} {}", hit.name, hit.name, hit.content));
    IndexedDoc {
        category,
        hit,
        vector,
    }
}
