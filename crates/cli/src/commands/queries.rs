//! `chronicle queries` — Show what the analyzer extracts from recent text.

use std::path::Path;

use chronicle_config::EngineConfig;
use chronicle_context::query::{AnalyzeOptions, AnalyzerVocabulary, QueryAnalyzer};

pub fn run(
    config: &EngineConfig,
    state: &Path,
    extra_text: String,
    max_queries: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = super::load_state(state)?;
    let analyzer = QueryAnalyzer::new(AnalyzerVocabulary::default(), config.analyzer.clone());
    let result = analyzer.analyze_chapter_context(
        &state,
        &AnalyzeOptions {
            extra_text,
            max_queries,
        },
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
