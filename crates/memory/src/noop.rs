//! No-op backends that disable long-term search or lore synthesis entirely.

use async_trait::async_trait;
use chronicle_core::error::{LoreError, SearchError};
use chronicle_core::lore::{LoreBible, LoreSynthesizer};
use chronicle_core::novel::NovelState;
use chronicle_core::search::{SearchOptions, SearchResults, VectorSearch};

/// A search backend that is never ready.
pub struct NoopSearch;

#[async_trait]
impl VectorSearch for NoopSearch {
    fn name(&self) -> &str {
        "none"
    }

    fn is_ready(&self) -> bool {
        false
    }

    async fn search(
        &self,
        _queries: &[String],
        _options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        Ok(SearchResults::default())
    }
}

/// A lore synthesizer that always returns an empty bible.
pub struct NoopLore;

#[async_trait]
impl LoreSynthesizer for NoopLore {
    fn name(&self) -> &str {
        "none"
    }

    async fn build_lore_bible(
        &self,
        _state: &NovelState,
        chapter_number: u32,
    ) -> Result<LoreBible, LoreError> {
        Ok(LoreBible {
            chapter_number,
            ..Default::default()
        })
    }
}
