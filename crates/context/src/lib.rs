//! Chronicle context engine.
//!
//! Builds the generation context for the next chapter of a long-form novel
//! from four memory tiers, under a token budget:
//!
//! - [`manager`] gathers the tiers concurrently with per-branch timeouts
//! - [`arc_memory`] condenses completed and active arcs
//! - [`query`] turns recent text into semantic-search queries
//! - [`prioritizer`] scores, allocates and selects within budgets
//! - [`assembler`] renders a gathered context into one string
//! - [`service`] ties analysis, gathering and assembly together

pub mod arc_memory;
pub mod assembler;
pub mod error;
pub mod gather;
pub mod manager;
pub mod prioritizer;
pub mod query;
pub mod service;
pub mod tiers;

pub use arc_memory::{ArcMemoryConfig, ArcMemoryService, ArcMemorySummary};
pub use assembler::{
    AssembledContext, AssemblyLimits, AssemblyMetadata, assemble, assemble_context_with_budget,
};
pub use error::TierError;
pub use manager::{GatherOptions, MemoryTierManager};
pub use prioritizer::{BudgetAllocation, ContextCategory, PrioritizedItem};
pub use query::{AnalyzeOptions, QueryAnalysisResult, QueryAnalyzer};
pub use service::{BudgetReport, ContextRequest, EnhancedContext, MemoryEnhancedContextService};
pub use tiers::{LongTermContext, MemoryContext, MidTermContext, ShortTermContext};
