//! `chronicle context` — Assemble the generation context for the next chapter.

use std::path::PathBuf;

use chronicle_config::{AssemblyStrategy, EngineConfig};
use chronicle_context::query::{AnalyzerVocabulary, QueryAnalyzer};
use chronicle_context::{ContextRequest, EnhancedContext, MemoryEnhancedContextService};

pub struct ContextArgs {
    pub state: PathBuf,
    pub budget: Option<usize>,
    pub quick: bool,
    pub strategy: Option<AssemblyStrategy>,
    pub extra: String,
    pub report: bool,
}

pub async fn run(config: &EngineConfig, args: ContextArgs) -> Result<(), Box<dyn std::error::Error>> {
    let state = super::load_state(&args.state)?;
    let manager = super::build_manager(config, &state);

    if args.quick {
        let text = manager.get_quick_context(state, Vec::new()).await;
        println!("{text}");
        return Ok(());
    }

    let analyzer = QueryAnalyzer::new(AnalyzerVocabulary::default(), config.analyzer.clone());
    let service = MemoryEnhancedContextService::new(manager, analyzer, config.clone());
    let request = ContextRequest {
        extra_text: args.extra,
        token_budget: args.budget,
        strategy: args.strategy,
        compact: false,
    };
    let context = service.build_generation_context(state, &request).await;

    println!("{}", context.text);
    if args.report {
        eprintln!("{}", render_report(&context)?);
    }
    Ok(())
}

fn render_report(context: &EnhancedContext) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "strategy": context.strategy,
        "tokens": context.token_count,
        "gathered_tokens": context.memory.total_token_count,
        "retrieval_ms": context.memory.retrieval_duration.as_millis() as u64,
        "search_available": context.memory.long_term.is_available,
        "queries": context.analysis.query_texts(),
        "budget": context.report,
        "assembly": context.assembly,
    }))
}
