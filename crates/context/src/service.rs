//! Memory-enhanced context service, the entry point for chapter generation.
//!
//! Analyzes recent text into search queries, gathers every memory tier with
//! those queries, and assembles the result under a token budget using the
//! configured strategy. Each call also reports how the budget was used.

use std::sync::Arc;

use chronicle_config::{AssemblyStrategy, EngineConfig};
use chronicle_core::novel::NovelState;
use chronicle_core::search::SearchResults;
use chronicle_core::token;
use serde::Serialize;
use tracing::{debug, info};

use crate::assembler::{AssemblyLimits, AssemblyMetadata, assemble};
use crate::gather;
use crate::manager::{GatherOptions, MemoryTierManager};
use crate::prioritizer::{
    BudgetAllocation, ContextCategory, ContextSections, allocate_budget,
    build_prioritized_context_list, rebalance_budget, select_within_budget,
};
use crate::query::{AnalyzeOptions, QueryAnalysisResult, QueryAnalyzer};
use crate::tiers::{LongTermContext, MemoryContext};

/// Section that the prioritized strategy always tries to keep.
const MUST_INCLUDE: &[&str] = &["continuity"];

/// Caller overrides for a single generation context.
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    /// Author notes or a chapter outline, analyzed alongside recent text
    pub extra_text: String,
    pub token_budget: Option<usize>,
    pub strategy: Option<AssemblyStrategy>,
    pub compact: bool,
}

/// Planned, used and rebalanced budget per category.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub allocation: BudgetAllocation,
    pub usage: BudgetAllocation,
    pub rebalanced: BudgetAllocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnhancedContext {
    pub text: String,
    pub memory: MemoryContext,
    pub analysis: QueryAnalysisResult,
    pub token_count: usize,
    pub strategy: AssemblyStrategy,
    pub report: BudgetReport,
    /// Per-section inclusion and drops; only the tiered strategy records it
    pub assembly: Option<AssemblyMetadata>,
}

pub struct MemoryEnhancedContextService {
    manager: MemoryTierManager,
    analyzer: QueryAnalyzer,
    config: EngineConfig,
}

impl MemoryEnhancedContextService {
    pub fn new(manager: MemoryTierManager, analyzer: QueryAnalyzer, config: EngineConfig) -> Self {
        Self {
            manager,
            analyzer,
            config,
        }
    }

    pub fn manager(&self) -> &MemoryTierManager {
        &self.manager
    }

    /// Build the context for the next chapter of `state`.
    pub async fn build_generation_context(
        &self,
        state: Arc<NovelState>,
        request: &ContextRequest,
    ) -> EnhancedContext {
        let budget = request.token_budget.unwrap_or(self.config.budget.total_tokens);
        let strategy = request.strategy.unwrap_or(self.config.service.strategy);

        let analysis = self.analyzer.analyze_chapter_context(
            &state,
            &AnalyzeOptions {
                extra_text: request.extra_text.clone(),
                max_queries: None,
            },
        );
        debug!(queries = analysis.queries.len(), "Query analysis complete");

        let options = GatherOptions {
            search_queries: analysis.query_texts(),
            compact: request.compact,
            token_budget: budget,
            ..GatherOptions::from_config(&self.config)
        };
        let memory = self.manager.gather_memory_context(state, options).await;

        let sections = context_sections(&memory);
        let (text, assembly) = match strategy {
            AssemblyStrategy::Tiered => {
                let assembled =
                    assemble(&memory, budget, &AssemblyLimits::from(&self.config.budget));
                (assembled.text, Some(assembled.metadata))
            }
            AssemblyStrategy::Prioritized => (assemble_prioritized(&sections, budget), None),
        };
        let token_count = token::estimate_tokens(&text);

        let allocation = allocate_budget(budget, &self.config.budget.percentages);
        let usage = section_usage(&sections, &memory.short_term.style_profile);
        let report = BudgetReport {
            rebalanced: rebalance_budget(&allocation, &usage),
            allocation,
            usage,
        };

        info!(
            strategy = ?strategy,
            budget,
            tokens = token_count,
            gathered_tokens = memory.total_token_count,
            "Built generation context"
        );

        EnhancedContext {
            text,
            memory,
            analysis,
            token_count,
            strategy,
            report,
            assembly,
        }
    }

    /// Score and render search results within `budget` tokens.
    pub fn format_search_context(
        &self,
        results: &SearchResults,
        state: &NovelState,
        budget: usize,
    ) -> LongTermContext {
        gather::format_search_context(results, state, budget)
    }
}

/// Map gathered tiers onto the seven structural sections.
pub fn context_sections(memory: &MemoryContext) -> ContextSections {
    let long = &memory.long_term;
    let mid = &memory.mid_term;

    ContextSections {
        continuity: memory.short_term.continuity_bridge.clone(),
        lore_bible: memory.lore_bible_text.clone(),
        characters: join_nonempty(&[
            mid.character_digest.clone(),
            with_header("[Relevant Characters]", &long.characters),
        ]),
        plot: join_nonempty(&[
            mid.active_arc_summary.clone(),
            mid.thread_digest.clone(),
            mid.formatted_text.clone(),
            with_header("[Plot Threads]", &long.plot),
        ]),
        world: with_header("[World Details]", &long.world),
        power: with_header("[Power System]", &long.power),
        chapters: join_nonempty(&memory.short_term.chapters),
    }
}

/// Keep whole sections by structural priority, continuity first.
///
/// One token per section is held back for the separators, so the joined
/// text never exceeds `budget`.
fn assemble_prioritized(sections: &ContextSections, budget: usize) -> String {
    let items = build_prioritized_context_list(sections);
    let available = budget.saturating_sub(items.len());
    let selected = select_within_budget(&items, available, MUST_INCLUDE);
    debug!(
        offered = items.len(),
        selected = selected.len(),
        "Prioritized section selection"
    );

    selected
        .iter()
        .map(|item| item.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn section_usage(sections: &ContextSections, style: &str) -> BudgetAllocation {
    let mut usage = BudgetAllocation::default();
    for item in build_prioritized_context_list(sections) {
        usage.set(item.category, item.token_count);
    }
    usage.set(ContextCategory::Style, token::estimate_tokens(style));
    usage
}

fn with_header(header: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    format!("{header}\n{}", lines.join("\n"))
}

fn join_nonempty(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
