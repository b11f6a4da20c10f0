//! Query analyzer: turns recent chapter text into prioritized search queries.
//!
//! The analyzer reads a window of recent text (the tail of the latest
//! chapter, its summary, caller-supplied text and the active arc), extracts
//! entities and keywords with cheap heuristics, and generates the queries
//! the long-term tier sends to the vector search service.

pub mod extract;
pub mod generate;
pub mod vocabulary;

use chronicle_config::AnalyzerConfig;
use chronicle_core::novel::NovelState;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use vocabulary::AnalyzerVocabulary;

/// Query used when there is no recent text to analyze.
pub const DEFAULT_QUERY: &str = "Main character background and current situation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Location,
    Item,
    Technique,
    Sect,
    Event,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub kind: EntityKind,
    /// 0.0–1.0
    pub confidence: f32,
    /// Surrounding text of the match
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Character,
    Relationship,
    Location,
    Sect,
    Technique,
    Item,
    Power,
    Plot,
    General,
}

/// Declaration order is sort order: high sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub text: String,
    pub kind: QueryKind,
    pub priority: QueryPriority,
    pub reason: String,
}

impl GeneratedQuery {
    pub fn new(
        text: impl Into<String>,
        kind: QueryKind,
        priority: QueryPriority,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            kind,
            priority,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysisResult {
    pub entities: Vec<ExtractedEntity>,
    pub keywords: Vec<String>,
    /// Highest priority first
    pub queries: Vec<GeneratedQuery>,
    /// Characters in the analysis window
    pub window_len: usize,
}

impl QueryAnalysisResult {
    /// The zero-context result: one high-priority general query.
    pub fn fallback() -> Self {
        Self {
            queries: vec![GeneratedQuery::new(
                DEFAULT_QUERY,
                QueryKind::General,
                QueryPriority::High,
                "no recent text to analyze",
            )],
            ..Default::default()
        }
    }

    /// Query texts in priority order.
    pub fn query_texts(&self) -> Vec<String> {
        self.queries.iter().map(|q| q.text.clone()).collect()
    }
}

/// Per-call analyzer inputs.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Extra text to analyze, e.g. the author's notes for the next chapter
    pub extra_text: String,
    /// Overrides the configured query cap
    pub max_queries: Option<usize>,
}

/// Extracts entities and keywords from recent text and generates queries.
#[derive(Debug, Clone, Default)]
pub struct QueryAnalyzer {
    vocabulary: AnalyzerVocabulary,
    config: AnalyzerConfig,
}

impl QueryAnalyzer {
    pub fn new(vocabulary: AnalyzerVocabulary, config: AnalyzerConfig) -> Self {
        Self { vocabulary, config }
    }

    /// Analyze the novel's recent text.
    ///
    /// Never fails: an empty window yields [`QueryAnalysisResult::fallback`].
    pub fn analyze_chapter_context(
        &self,
        state: &NovelState,
        options: &AnalyzeOptions,
    ) -> QueryAnalysisResult {
        let window = self.build_window(state, &options.extra_text);
        if window.trim().is_empty() {
            debug!("No recent text, using default query");
            return QueryAnalysisResult::fallback();
        }

        let mut entities = extract::known_characters(&window, state);
        entities.extend(extract::new_characters(&window, state, &self.vocabulary));
        entities.extend(extract::locations(&window, state));
        entities.extend(extract::techniques_and_items(&window, state));

        let keywords = extract::keywords(&window, &self.vocabulary);
        let max_queries = options.max_queries.unwrap_or(self.config.max_queries);
        let queries = generate::generate_queries(&entities, &keywords, state, max_queries);

        debug!(
            window_len = window.len(),
            entities = entities.len(),
            queries = queries.len(),
            "Analyzed chapter context"
        );

        QueryAnalysisResult {
            entities,
            keywords: keywords.flatten(),
            queries,
            window_len: window.chars().count(),
        }
    }

    /// Tail of the latest chapter, its summary, the extra text, and the
    /// active arc's title and description, one per line.
    fn build_window(&self, state: &NovelState, extra_text: &str) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(latest) = state.latest_chapter() {
            parts.push(tail_chars(&latest.content, self.config.window_chars).to_string());
            parts.push(latest.summary.clone());
        }
        parts.push(extra_text.to_string());
        if let Some(arc) = state.active_arc() {
            parts.push(format!("{} {}", arc.title, arc.description));
        }

        parts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The last `n` characters of `s`, on a char boundary.
pub(crate) fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
