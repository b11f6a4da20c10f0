//! End-to-end tests for the Chronicle context pipeline.
//!
//! These exercise the full path from a snapshot file and config file to the
//! assembled context string: query analysis, concurrent tier gathering,
//! budget allocation and assembly.

use std::sync::Arc;
use std::time::Duration;

use chronicle_config::{AssemblyStrategy, EngineConfig};
use chronicle_context::query::{AnalyzeOptions, EntityKind, QueryAnalyzer};
use chronicle_context::{
    ArcMemoryService, ContextRequest, GatherOptions, MemoryEnhancedContextService,
    MemoryContext, MemoryTierManager, assemble_context_with_budget,
};
use chronicle_core::error::SearchError;
use chronicle_core::novel::NovelState;
use chronicle_core::search::{SearchOptions, SearchResults, VectorSearch};
use chronicle_core::token::estimate_tokens;
use chronicle_memory::{InMemoryIndex, StateLoreSynthesizer};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn snapshot_json() -> serde_json::Value {
    let chapters: Vec<serde_json::Value> = (1..=5)
        .map(|n| {
            serde_json::json!({
                "number": n,
                "title": format!("The Climb {n}"),
                "content": format!(
                    "Han Xiao climbed the Frostpeak stairs on day {n}. Lin Yue said nothing. {}",
                    "Snow fell on the stone. ".repeat(15)
                ),
                "summary": format!("Han Xiao confronted the stair guardian on day {n} and gained insight."),
                "created_at": format!("2024-01-0{n}T00:00:00Z"),
            })
        })
        .collect();

    serde_json::json!({
        "id": "novel-1",
        "title": "Frostpeak",
        "chapters": chapters,
        "characters": [
            {
                "id": "c1",
                "name": "Han Xiao",
                "is_protagonist": true,
                "cultivation": "Foundation Establishment",
                "relationships": [{ "name": "Lin Yue", "kind": "rival" }],
                "update_history": [{ "chapter_number": 4, "changes": ["cultivation"] }]
            },
            {
                "id": "c2",
                "name": "Lin Yue",
                "description": "Frost sect prodigy and rival",
                "cultivation": "Foundation Establishment"
            }
        ],
        "arcs": [
            {
                "id": "a1",
                "title": "Outer Disciple",
                "description": "Han Xiao joins the sect",
                "start_chapter": 1,
                "end_chapter": 3,
                "status": "completed"
            },
            {
                "id": "a2",
                "title": "The Frostpeak Stairs",
                "description": "Han Xiao climbs toward the inner sect",
                "start_chapter": 1,
                "end_chapter": 5,
                "status": "active"
            }
        ],
        "threads": [
            {
                "id": "t1",
                "title": "Rivalry with Lin Yue",
                "kind": "conflict",
                "status": "active",
                "introduced_chapter": 2,
                "activity_chapters": [2, 4],
                "character_ids": ["c1", "c2"]
            }
        ],
        "world_entries": [
            {
                "id": "w1",
                "title": "Frostpeak",
                "category": "geography",
                "content": "A glacier mountain crowned by the inner sect"
            }
        ]
    })
}

fn write_snapshot(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("novel.json");
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot_json()).unwrap()).unwrap();
    path
}

fn service_for(state: &NovelState, config: EngineConfig) -> MemoryEnhancedContextService {
    let manager = MemoryTierManager::new(
        Arc::new(InMemoryIndex::from_state(state)),
        Arc::new(StateLoreSynthesizer::new()),
        config.clone(),
    );
    let analyzer = QueryAnalyzer::new(Default::default(), config.analyzer.clone());
    MemoryEnhancedContextService::new(manager, analyzer, config)
}

struct HangingSearch;

#[async_trait::async_trait]
impl VectorSearch for HangingSearch {
    fn name(&self) -> &str {
        "hanging"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn search(
        &self,
        _queries: &[String],
        _options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        std::future::pending().await
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_snapshot_file_to_tiered_context() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let svc = service_for(&state, EngineConfig::default());

    let ctx = svc
        .build_generation_context(Arc::new(state), &ContextRequest::default())
        .await;

    assert_eq!(ctx.strategy, AssemblyStrategy::Tiered);
    assert!(ctx.text.starts_with("[Continuity]\nChapter 5 \"The Climb 5\" ended with:"));
    assert!(ctx.text.contains("Chapter 6 must continue directly from this moment."));
    assert!(ctx.text.contains("[Lore Bible"));
    assert!(ctx.text.contains("[Current Arc: The Frostpeak Stairs"));
    assert!(ctx.memory.long_term.is_available);
    assert!(ctx.token_count <= 16_000 + 800);
    assert_eq!(ctx.memory.short_term.chapter_numbers, vec![3, 4, 5]);
}

#[tokio::test]
async fn e2e_config_file_selects_prioritized_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "[budget]\ntotal_tokens = 900\n\n[service]\nstrategy = \"prioritized\"\n",
    )
    .unwrap();
    let config = EngineConfig::load_from(&config_path).unwrap();
    assert_eq!(config.budget.total_tokens, 900);

    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let svc = service_for(&state, config);
    let ctx = svc
        .build_generation_context(Arc::new(state), &ContextRequest::default())
        .await;

    assert_eq!(ctx.strategy, AssemblyStrategy::Prioritized);
    assert!(ctx.text.starts_with("[Continuity]"));
    assert!(ctx.token_count <= 900);
    assert_eq!(ctx.report.allocation.total(), 900);
}

#[tokio::test]
async fn e2e_quick_context_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let manager = MemoryTierManager::new(
        Arc::new(InMemoryIndex::from_state(&state)),
        Arc::new(StateLoreSynthesizer::new()),
        EngineConfig::default(),
    );

    let text = manager.get_quick_context(Arc::new(state), Vec::new()).await;
    assert!(!text.is_empty());
    assert!(estimate_tokens(&text) <= 8_000 + 400);
}

#[tokio::test(start_paused = true)]
async fn e2e_hanging_search_still_yields_context() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let config = EngineConfig::default();
    let manager = MemoryTierManager::new(
        Arc::new(HangingSearch),
        Arc::new(StateLoreSynthesizer::new()),
        config.clone(),
    );
    let svc = MemoryEnhancedContextService::new(manager, QueryAnalyzer::default(), config);

    let ctx = svc
        .build_generation_context(Arc::new(state), &ContextRequest::default())
        .await;

    assert!(!ctx.memory.long_term.is_available);
    assert!(ctx.memory.retrieval_duration >= Duration::from_secs(10));
    assert!(ctx.text.starts_with("[Continuity]"));
    assert!(!ctx.memory.lore_bible_text.is_empty());
}

#[tokio::test]
async fn e2e_budget_below_bridge_yields_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let manager = MemoryTierManager::new(
        Arc::new(InMemoryIndex::from_state(&state)),
        Arc::new(StateLoreSynthesizer::new()),
        EngineConfig::default(),
    );
    let memory = manager
        .gather_memory_context(Arc::new(state), GatherOptions::default())
        .await;

    assert!(estimate_tokens(&memory.short_term.continuity_bridge) > 1);
    assert_eq!(assemble_context_with_budget(&memory, 1), "");
}

#[tokio::test]
async fn e2e_budget_just_below_bridge_yields_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let manager = MemoryTierManager::new(
        Arc::new(InMemoryIndex::from_state(&state)),
        Arc::new(StateLoreSynthesizer::new()),
        EngineConfig::default(),
    );
    let gathered = manager
        .gather_memory_context(Arc::new(state), GatherOptions::default())
        .await;

    // Keep only the bridge so nothing smaller can fill the slack.
    let mut memory = MemoryContext::empty(gathered.retrieval_duration);
    memory.short_term.continuity_bridge = gathered.short_term.continuity_bridge.clone();
    let bridge_tokens = estimate_tokens(&memory.short_term.continuity_bridge);
    assert!(bridge_tokens > 1);

    assert_eq!(assemble_context_with_budget(&memory, bridge_tokens - 1), "");
    let at_size = assemble_context_with_budget(&memory, bridge_tokens);
    assert_eq!(at_size, memory.short_term.continuity_bridge);
}

// ── Components on a real snapshot ────────────────────────────────────────

#[test]
fn e2e_active_arc_wins_single_slot() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let memories = ArcMemoryService::default().get_relevant_arc_memories(&state, 6, 1);

    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].arc_id, "a2");
    assert!(memories[0].summary.split_whitespace().count() <= 500);
}

#[test]
fn e2e_breakthrough_text_drives_queries() {
    let dir = tempfile::tempdir().unwrap();
    let state = NovelState::load_json(&write_snapshot(&dir)).unwrap();
    let result = QueryAnalyzer::default().analyze_chapter_context(
        &state,
        &AnalyzeOptions {
            extra_text: "Han Xiao broke through to Nascent Soul at Frostpeak".into(),
            max_queries: None,
        },
    );

    let han = result.entities.iter().find(|e| e.name == "Han Xiao").unwrap();
    assert_eq!(han.confidence, 1.0);
    assert!(result
        .entities
        .iter()
        .any(|e| e.name == "Frostpeak" && e.kind == EntityKind::Location));
    assert!(result.keywords.contains(&"breakthrough".to_string()));
    assert!(result.keywords.contains(&"nascent".to_string()));
    assert!(result.queries.len() <= 8);
}

#[test]
fn e2e_missing_snapshot_is_a_read_error() {
    let err = NovelState::load_json(std::path::Path::new("/nonexistent/novel.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/novel.json"));
}
