//! Memory tier manager.
//!
//! Gathers the four context sources for the next chapter in parallel:
//!
//! - short-term: verbatim recent chapters and the continuity bridge
//! - mid-term: arc memories and their digests
//! - long-term: semantic search over the novel's lore
//! - lore bible: the synthesizer's structured canon
//!
//! Each source runs in its own task under a timeout. A branch that times
//! out, fails or panics is replaced by its empty value and logged; the
//! caller always receives a [`MemoryContext`].

use std::sync::Arc;
use std::time::Duration;

use chronicle_config::EngineConfig;
use chronicle_core::lore::LoreSynthesizer;
use chronicle_core::novel::NovelState;
use chronicle_core::search::{SearchOptions, VectorSearch};
use chronicle_core::token;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::arc_memory::ArcMemoryService;
use crate::assembler::{AssemblyLimits, assemble};
use crate::error::TierError;
use crate::gather::{gather_long_term, gather_mid_term, gather_short_term};
use crate::prioritizer::allocate_budget;
use crate::query::{AnalyzeOptions, QueryAnalyzer};
use crate::tiers::{LongTermContext, MemoryContext};

const QUICK_RECENT_CHAPTERS: usize = 3;
const QUICK_ARC_MEMORIES: usize = 2;

/// Per-call gather settings.
#[derive(Debug, Clone)]
pub struct GatherOptions {
    /// Chapter being written; defaults to latest + 1
    pub next_chapter: Option<u32>,
    pub recent_chapter_count: usize,
    pub max_arc_memories: usize,
    /// Empty means the query analyzer generates them
    pub search_queries: Vec<String>,
    pub compact: bool,
    /// Budget the long-term tier's search share is taken from
    pub token_budget: usize,
}

impl GatherOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            next_chapter: None,
            recent_chapter_count: config.tiers.recent_chapter_count,
            max_arc_memories: config.tiers.max_arc_memories,
            search_queries: Vec::new(),
            compact: false,
            token_budget: config.budget.total_tokens,
        }
    }

    /// The reduced settings behind [`MemoryTierManager::get_quick_context`].
    pub fn quick(config: &EngineConfig, search_queries: Vec<String>) -> Self {
        Self {
            recent_chapter_count: QUICK_RECENT_CHAPTERS,
            max_arc_memories: QUICK_ARC_MEMORIES,
            search_queries,
            compact: true,
            token_budget: config.budget.quick_tokens,
            ..Self::from_config(config)
        }
    }
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Coordinates the tier gathers. Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct MemoryTierManager {
    search: Arc<dyn VectorSearch>,
    lore: Arc<dyn LoreSynthesizer>,
    analyzer: QueryAnalyzer,
    arcs: ArcMemoryService,
    config: Arc<EngineConfig>,
}

impl MemoryTierManager {
    pub fn new(
        search: Arc<dyn VectorSearch>,
        lore: Arc<dyn LoreSynthesizer>,
        config: EngineConfig,
    ) -> Self {
        let analyzer = QueryAnalyzer::new(Default::default(), config.analyzer.clone());
        Self {
            search,
            lore,
            analyzer,
            arcs: ArcMemoryService::default(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn search_name(&self) -> &str {
        self.search.name()
    }

    pub fn lore_name(&self) -> &str {
        self.lore.name()
    }

    /// Gather every tier for the next chapter.
    ///
    /// Never fails. A branch that errors, panics or outlives its timeout
    /// contributes its empty value; if orchestration itself panics, every
    /// tier is empty.
    pub async fn gather_memory_context(
        &self,
        state: Arc<NovelState>,
        options: GatherOptions,
    ) -> MemoryContext {
        let started = Instant::now();
        let this = self.clone();
        let orchestration = tokio::spawn(async move { this.gather_tiers(state, options, started).await });

        match orchestration.await {
            Ok(context) => context,
            Err(e) => {
                error!(error = %e, "Memory gather aborted, returning empty context");
                MemoryContext::empty(started.elapsed())
            }
        }
    }

    async fn gather_tiers(
        &self,
        state: Arc<NovelState>,
        options: GatherOptions,
        started: Instant,
    ) -> MemoryContext {
        let tiers = &self.config.tiers;
        let next_chapter = options
            .next_chapter
            .unwrap_or_else(|| state.next_chapter_number());

        let short = tokio::spawn({
            let state = Arc::clone(&state);
            let recent = options.recent_chapter_count;
            let ending = tiers.ending_excerpt_chars;
            async move { Ok::<_, TierError>(gather_short_term(&state, recent, ending)) }
        });

        let mid = tokio::spawn({
            let state = Arc::clone(&state);
            let arcs = self.arcs.clone();
            let (max_arcs, compact) = (options.max_arc_memories, options.compact);
            async move {
                Ok::<_, TierError>(gather_mid_term(&arcs, &state, next_chapter, max_arcs, compact))
            }
        });

        let long = tokio::spawn(long_term_branch(
            self.clone(),
            Arc::clone(&state),
            options.search_queries.clone(),
            options.token_budget,
        ));

        let lore = tokio::spawn(lore_branch(
            Arc::clone(&self.lore),
            Arc::clone(&state),
            next_chapter,
            options.compact,
        ));

        let (short_term, mid_term, long_term, lore_bible_text) = tokio::join!(
            supervise("short_term", tiers.tier_timeout(), short),
            supervise("mid_term", tiers.tier_timeout(), mid),
            supervise("long_term", tiers.tier_timeout(), long),
            supervise("lore_bible", tiers.lore_timeout(), lore),
        );

        let lore_tokens = token::estimate_tokens(&lore_bible_text);
        let total_token_count =
            short_term.token_count + mid_term.token_count + long_term.token_count + lore_tokens;
        let retrieval_duration = started.elapsed();

        info!(
            chapter = next_chapter,
            short_tokens = short_term.token_count,
            mid_tokens = mid_term.token_count,
            long_tokens = long_term.token_count,
            lore_tokens,
            total_tokens = total_token_count,
            search_available = long_term.is_available,
            duration_ms = retrieval_duration.as_millis() as u64,
            "Gathered memory context"
        );

        MemoryContext {
            short_term,
            mid_term,
            long_term,
            lore_bible_text,
            total_token_count,
            retrieval_duration,
        }
    }

    /// Assemble with this manager's configured slack and lore share.
    pub fn assemble_context_with_budget(&self, context: &MemoryContext, token_budget: usize) -> String {
        assemble(context, token_budget, &AssemblyLimits::from(&self.config.budget)).text
    }

    /// A compact context under the quick budget: fewer chapters and arcs.
    pub async fn get_quick_context(&self, state: Arc<NovelState>, queries: Vec<String>) -> String {
        let options = GatherOptions::quick(&self.config, queries);
        let budget = options.token_budget;
        let context = self.gather_memory_context(state, options).await;
        self.assemble_context_with_budget(&context, budget)
    }
}

async fn long_term_branch(
    manager: MemoryTierManager,
    state: Arc<NovelState>,
    queries: Vec<String>,
    token_budget: usize,
) -> Result<LongTermContext, TierError> {
    let search_config = &manager.config.search;
    if !search_config.enabled {
        debug!("Long-term search disabled by configuration");
        return Ok(LongTermContext::default());
    }

    let queries = if queries.is_empty() {
        manager
            .analyzer
            .analyze_chapter_context(&state, &AnalyzeOptions::default())
            .query_texts()
    } else {
        queries
    };

    let options = SearchOptions {
        limit_per_category: search_config.max_results_per_category,
        min_score: search_config.min_score,
    };
    let budget = allocate_budget(token_budget, &manager.config.budget.percentages).search_share();

    Ok(gather_long_term(manager.search.as_ref(), &state, &queries, &options, budget).await?)
}

async fn lore_branch(
    lore: Arc<dyn LoreSynthesizer>,
    state: Arc<NovelState>,
    chapter: u32,
    compact: bool,
) -> Result<String, TierError> {
    let bible = lore.build_lore_bible(&state, chapter).await?;
    debug!(synthesizer = lore.name(), chapter, "Lore bible built");
    Ok(lore.format(&bible, compact))
}

/// Await a branch under `limit`, substituting its empty value on failure.
///
/// A branch that outlives its limit is aborted.
async fn supervise<T: Default>(
    tier: &'static str,
    limit: Duration,
    handle: JoinHandle<Result<T, TierError>>,
) -> T {
    let abort = handle.abort_handle();
    let failure = match tokio::time::timeout(limit, handle).await {
        Ok(Ok(Ok(value))) => return value,
        Ok(Ok(Err(e))) => e,
        Ok(Err(join_error)) => TierError::Panicked {
            tier,
            message: panic_message(join_error),
        },
        Err(_) => {
            abort.abort();
            TierError::TimedOut {
                tier,
                timeout_ms: limit.as_millis() as u64,
            }
        }
    };

    match &failure {
        TierError::Panicked { .. } => {
            error!(tier, error = %failure, "Tier branch panicked, using empty fallback")
        }
        _ => warn!(tier, error = %failure, "Tier branch failed, using empty fallback"),
    }
    T::default()
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload = join_error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
