//! `chronicle arcs` — Show the arc memories the mid-term tier would use.

use std::path::Path;

use chronicle_config::EngineConfig;
use chronicle_context::ArcMemoryService;

pub fn run(
    config: &EngineConfig,
    state: &Path,
    chapter: Option<u32>,
    max: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = super::load_state(state)?;
    let chapter = chapter.unwrap_or_else(|| state.next_chapter_number());
    let max = max.unwrap_or(config.tiers.max_arc_memories);

    let memories = ArcMemoryService::default().get_relevant_arc_memories(&state, chapter, max);
    if memories.is_empty() {
        tracing::info!(chapter, "No arcs to summarize");
    }
    println!("{}", serde_json::to_string_pretty(&memories)?);
    Ok(())
}
