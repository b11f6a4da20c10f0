//! Subcommand implementations.

pub mod arcs;
pub mod budget;
pub mod config_cmd;
pub mod context;
pub mod queries;

use std::path::Path;
use std::sync::Arc;

use chronicle_config::EngineConfig;
use chronicle_context::MemoryTierManager;
use chronicle_core::novel::NovelState;
use chronicle_memory::{InMemoryIndex, StateLoreSynthesizer};

/// Read a novel snapshot for a command.
pub fn load_state(path: &Path) -> Result<Arc<NovelState>, Box<dyn std::error::Error>> {
    let state = NovelState::load_json(path)?;
    Ok(Arc::new(state))
}

/// A tier manager over the snapshot's own search index and lore.
pub fn build_manager(config: &EngineConfig, state: &NovelState) -> MemoryTierManager {
    let manager = MemoryTierManager::new(
        Arc::new(InMemoryIndex::from_state(state)),
        Arc::new(StateLoreSynthesizer::new()),
        config.clone(),
    );
    tracing::debug!(
        search = manager.search_name(),
        lore = manager.lore_name(),
        "Tier manager ready"
    );
    manager
}
