//! Tier gathers.
//!
//! Short- and mid-term gathers are synchronous functions of the snapshot.
//! The long-term gather is the only one that awaits a collaborator.

use chronicle_core::error::SearchError;
use chronicle_core::novel::{ArcStatus, NovelState};
use chronicle_core::search::{SearchOptions, SearchResults, VectorSearch};
use chronicle_core::token;
use tracing::debug;

use crate::arc_memory::ArcMemoryService;
use crate::prioritizer::{
    ContextCategory, PrioritizedItem, prioritize_search_results, select_within_budget,
};
use crate::query::tail_chars;
use crate::tiers::{LongTermContext, MidTermContext, ShortTermContext};

/// Category headers of the search section, in render order.
const SEARCH_HEADERS: [&str; 4] = [
    "[Relevant Characters]",
    "[Plot Threads]",
    "[World Details]",
    "[Power System]",
];

// ── Short-term ────────────────────────────────────────────────────────────

/// Verbatim text of the last `recent_count` chapters plus the continuity
/// bridge into the next one.
pub fn gather_short_term(
    state: &NovelState,
    recent_count: usize,
    ending_chars: usize,
) -> ShortTermContext {
    let style_profile = state
        .style
        .as_ref()
        .map(|s| s.render())
        .filter(|s| !s.is_empty())
        .map(|s| format!("[Style Guide]\n{s}"))
        .unwrap_or_default();

    let sorted = state.chapters_sorted();
    let Some(latest) = sorted.last() else {
        return ShortTermContext {
            token_count: token::estimate_tokens(&style_profile),
            style_profile,
            ..Default::default()
        };
    };

    let recent = &sorted[sorted.len().saturating_sub(recent_count)..];
    let chapters: Vec<String> = recent.iter().map(|c| c.content.clone()).collect();
    let chapter_numbers = recent.iter().map(|c| c.number).collect();

    let content = latest.content.trim_end();
    let ending = tail_chars(content, ending_chars).trim_start();
    let previous_chapter_ending = ending.to_string();

    let continuity_bridge = if ending.is_empty() {
        String::new()
    } else {
        let lead = if ending.len() < content.len() { "..." } else { "" };
        let title = if latest.title.is_empty() {
            String::new()
        } else {
            format!(" \"{}\"", latest.title)
        };
        format!(
            "[Continuity]\nChapter {}{} ended with:\n{lead}{ending}\n\nChapter {} must continue directly from this moment.",
            latest.number,
            title,
            latest.number.saturating_add(1),
        )
    };

    let token_count = token::estimate_all(&chapters)
        + token::estimate_tokens(&continuity_bridge)
        + token::estimate_tokens(&previous_chapter_ending)
        + token::estimate_tokens(&style_profile);

    ShortTermContext {
        chapters,
        chapter_numbers,
        continuity_bridge,
        previous_chapter_ending,
        style_profile,
        token_count,
    }
}

// ── Mid-term ──────────────────────────────────────────────────────────────

/// The most relevant arc memories and the digests of the first one.
pub fn gather_mid_term(
    arcs: &ArcMemoryService,
    state: &NovelState,
    next_chapter: u32,
    max_arcs: usize,
    compact: bool,
) -> MidTermContext {
    let memories = arcs.get_relevant_arc_memories(state, next_chapter, max_arcs);
    let Some(first) = memories.first() else {
        return MidTermContext::default();
    };

    let active_arc_summary = memories
        .iter()
        .find(|m| m.status == ArcStatus::Active)
        .map(|m| m.active_summary_text())
        .unwrap_or_default();
    let character_digest = first.character_digest();
    let thread_digest = first.thread_digest();

    let rendered: Vec<String> = memories.iter().map(|m| m.render(compact)).collect();
    let formatted_text = format!("[Arc Memories]\n{}", rendered.join("\n\n"));

    let token_count = token::estimate_tokens(&formatted_text)
        + token::estimate_tokens(&active_arc_summary)
        + token::estimate_tokens(&character_digest)
        + token::estimate_tokens(&thread_digest);

    MidTermContext {
        arc_memories: memories,
        formatted_text,
        active_arc_summary,
        character_digest,
        thread_digest,
        token_count,
    }
}

// ── Long-term ─────────────────────────────────────────────────────────────

/// Search, score and format within `budget` tokens.
///
/// A search service that is not ready yields an unavailable, empty context.
/// That is a normal state, not an error.
pub async fn gather_long_term(
    search: &dyn VectorSearch,
    state: &NovelState,
    queries: &[String],
    options: &SearchOptions,
    budget: usize,
) -> Result<LongTermContext, SearchError> {
    if !search.is_ready() {
        debug!(
            service = search.name(),
            "Search service not ready, skipping long-term tier"
        );
        return Ok(LongTermContext::default());
    }
    if queries.is_empty() {
        return Ok(LongTermContext {
            is_available: true,
            ..Default::default()
        });
    }

    let results = search.search(queries, options).await?;
    debug!(
        service = search.name(),
        queries = queries.len(),
        hits = results.len(),
        "Long-term search returned"
    );

    let mut context = format_search_context(&results, state, budget);
    context.queries_used = queries.to_vec();
    context.is_available = true;
    Ok(context)
}

/// Score search results and render those that fit in `budget` tokens,
/// grouped under per-category headers.
///
/// Every header is reserved up front with its trailing separator, and each
/// item is charged for its rendered line (`"- "` prefix and newline), so
/// the formatted text never estimates above `budget`.
pub fn format_search_context(
    results: &SearchResults,
    state: &NovelState,
    budget: usize,
) -> LongTermContext {
    let header_reserve: usize = SEARCH_HEADERS
        .iter()
        .map(|h| token::estimate_tokens(&format!("{h}\n\n\n")))
        .sum();

    let items: Vec<PrioritizedItem> = prioritize_search_results(results, state)
        .into_iter()
        .map(|mut item| {
            item.token_count = token::estimate_tokens(&format!("- {}\n", item.content));
            item
        })
        .collect();
    let selected = select_within_budget(&items, budget.saturating_sub(header_reserve), &[]);

    let mut context = LongTermContext::default();
    for item in selected {
        let line = format!("- {}", item.content);
        match item.category {
            ContextCategory::Characters => context.characters.push(line),
            ContextCategory::World => context.world.push(line),
            ContextCategory::Plot => context.plot.push(line),
            _ => context.power.push(line),
        }
    }

    let sections: Vec<String> = SEARCH_HEADERS
        .into_iter()
        .zip([&context.characters, &context.plot, &context.world, &context.power])
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(header, lines)| format!("{header}\n{}", lines.join("\n")))
        .collect();

    context.formatted_text = sections.join("\n\n");
    context.token_count = token::estimate_tokens(&context.formatted_text);
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chronicle_core::novel::{Chapter, Character, StoryArc, StyleProfile};
    use chronicle_core::search::SearchHit;

    fn chapter(number: u32, content: &str) -> Chapter {
        Chapter {
            number,
            title: format!("Title {number}"),
            content: content.into(),
            ..Default::default()
        }
    }

    // ── Short-term ──

    #[test]
    fn short_term_takes_most_recent_chapters() {
        let state = NovelState {
            chapters: (1..=5).rev().map(|n| chapter(n, &format!("text {n}"))).collect(),
            ..Default::default()
        };
        let ctx = gather_short_term(&state, 3, 1000);
        assert_eq!(ctx.chapter_numbers, vec![3, 4, 5]);
        assert_eq!(ctx.chapters, vec!["text 3", "text 4", "text 5"]);
        assert_eq!(ctx.previous_chapter_ending, "text 5");
        assert!(ctx.continuity_bridge.contains("Chapter 5 \"Title 5\" ended with:\ntext 5"));
        assert!(ctx.continuity_bridge.contains("Chapter 6 must continue"));
    }

    #[test]
    fn short_term_ending_is_trailing_excerpt() {
        let content = format!("{}{}", "a".repeat(50), "b".repeat(20));
        let state = NovelState {
            chapters: vec![chapter(1, &content)],
            ..Default::default()
        };
        let ctx = gather_short_term(&state, 3, 20);
        assert_eq!(ctx.previous_chapter_ending, "b".repeat(20));
        assert!(ctx.continuity_bridge.contains(&format!("...{}", "b".repeat(20))));
    }

    #[test]
    fn short_term_token_count_uses_shared_estimator() {
        let state = NovelState {
            chapters: vec![chapter(1, "abcdefgh")],
            ..Default::default()
        };
        let ctx = gather_short_term(&state, 3, 1000);
        let expected = token::estimate_tokens("abcdefgh") * 2
            + token::estimate_tokens(&ctx.continuity_bridge);
        assert_eq!(ctx.token_count, expected);
    }

    #[test]
    fn short_term_bridge_at_last_chapter_number() {
        let state = NovelState {
            chapters: vec![chapter(u32::MAX, "the end")],
            ..Default::default()
        };
        let ctx = gather_short_term(&state, 3, 1000);
        let last = format!("Chapter {} must continue", u32::MAX);
        assert!(ctx.continuity_bridge.contains(&last));
    }

    #[test]
    fn short_term_empty_without_chapters_but_keeps_style() {
        let state = NovelState {
            style: Some(StyleProfile {
                tone: "wry".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let ctx = gather_short_term(&state, 3, 1000);
        assert!(ctx.chapters.is_empty());
        assert!(ctx.continuity_bridge.is_empty());
        assert_eq!(ctx.style_profile, "[Style Guide]\nTone: wry");
        assert_eq!(ctx.token_count, token::estimate_tokens(&ctx.style_profile));

        let empty = gather_short_term(&NovelState::default(), 3, 1000);
        assert_eq!(empty, ShortTermContext::default());
    }

    // ── Mid-term ──

    #[test]
    fn mid_term_uses_active_arc_and_first_memory() {
        let state = NovelState {
            characters: vec![Character {
                id: "p".into(),
                name: "Han Xiao".into(),
                is_protagonist: true,
                ..Default::default()
            }],
            arcs: vec![
                StoryArc {
                    id: "old".into(),
                    title: "Origins".into(),
                    start_chapter: 1,
                    end_chapter: Some(3),
                    status: ArcStatus::Completed,
                    ..Default::default()
                },
                StoryArc {
                    id: "now".into(),
                    title: "Frost Trial".into(),
                    description: "The tournament".into(),
                    start_chapter: 4,
                    status: ArcStatus::Active,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let ctx = gather_mid_term(&ArcMemoryService::default(), &state, 6, 3, false);
        assert_eq!(ctx.arc_memories.len(), 2);
        assert_eq!(ctx.arc_memories[0].arc_id, "now");
        assert!(ctx.active_arc_summary.starts_with("[Current Arc: Frost Trial"));
        assert!(ctx.character_digest.contains("Han Xiao"));
        assert!(ctx.formatted_text.starts_with("[Arc Memories]\nFrost Trial"));
        assert!(ctx.token_count > 0);
    }

    #[test]
    fn mid_term_empty_without_arcs() {
        let state = NovelState::default();
        let ctx = gather_mid_term(&ArcMemoryService::default(), &state, 1, 3, true);
        assert_eq!(ctx, MidTermContext::default());
    }

    // ── Long-term ──

    struct FixedSearch {
        ready: bool,
        results: SearchResults,
    }

    #[async_trait]
    impl VectorSearch for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn search(
            &self,
            _queries: &[String],
            _options: &SearchOptions,
        ) -> Result<SearchResults, SearchError> {
            Ok(self.results.clone())
        }
    }

    fn hit(id: &str, name: &str, content: &str) -> SearchHit {
        SearchHit {
            id: id.into(),
            name: name.into(),
            kind: "test".into(),
            score: 0.8,
            content: content.into(),
            ..Default::default()
        }
    }

    fn results() -> SearchResults {
        SearchResults {
            characters: vec![hit("c1", "Lin Yue", "Sword maiden of the north.")],
            world_entries: vec![hit("w1", "Frostpeak", "A frozen mountain.")],
            plot_elements: vec![],
            power_elements: vec![hit("k1", "Azure Palm", "Frost technique.")],
        }
    }

    #[tokio::test]
    async fn long_term_unavailable_when_not_ready() {
        let search = FixedSearch {
            ready: false,
            results: results(),
        };
        let state = NovelState::default();
        let queries = vec!["q".to_string()];
        let ctx = gather_long_term(&search, &state, &queries, &SearchOptions::default(), 1000)
            .await
            .unwrap();
        assert!(!ctx.is_available);
        assert!(ctx.formatted_text.is_empty());
    }

    #[tokio::test]
    async fn long_term_formats_by_category() {
        let search = FixedSearch {
            ready: true,
            results: results(),
        };
        let state = NovelState::default();
        let queries = vec!["Lin Yue background".to_string()];
        let ctx = gather_long_term(&search, &state, &queries, &SearchOptions::default(), 1000)
            .await
            .unwrap();
        assert!(ctx.is_available);
        assert_eq!(ctx.queries_used, queries);
        assert_eq!(ctx.characters, vec!["- Lin Yue: Sword maiden of the north."]);
        assert_eq!(
            ctx.formatted_text,
            "[Relevant Characters]\n- Lin Yue: Sword maiden of the north.\n\n\
             [World Details]\n- Frostpeak: A frozen mountain.\n\n\
             [Power System]\n- Azure Palm: Frost technique."
        );
        assert_eq!(ctx.token_count, token::estimate_tokens(&ctx.formatted_text));
    }

    #[test]
    fn formatting_respects_budget() {
        let big = hit("w2", "Archive", &"lore ".repeat(400));
        let mut res = results();
        res.world_entries.push(big);
        let ctx = format_search_context(&res, &NovelState::default(), 60);
        assert!(ctx.world.iter().all(|l| !l.contains("Archive")));
        assert!(ctx.token_count <= 60);
    }

    #[test]
    fn many_short_hits_stay_within_budget() {
        let res = SearchResults {
            world_entries: (0..200)
                .map(|i| SearchHit {
                    id: format!("w{i}"),
                    name: format!("P{i:03}"),
                    score: 0.5,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let ctx = format_search_context(&res, &NovelState::default(), 100);
        assert!(!ctx.world.is_empty());
        assert!(ctx.world.len() < 200);
        assert!(ctx.token_count <= 100);
    }

    #[test]
    fn mixed_categories_stay_within_budget() {
        let lines = |prefix: &str| -> Vec<SearchHit> {
            (0..40)
                .map(|i| hit(&format!("{prefix}{i}"), &format!("{prefix}{i}"), "short note"))
                .collect()
        };
        let res = SearchResults {
            characters: lines("C"),
            world_entries: lines("W"),
            plot_elements: lines("T"),
            power_elements: lines("P"),
        };
        for budget in [30, 77, 150, 301] {
            let ctx = format_search_context(&res, &NovelState::default(), budget);
            assert!(ctx.token_count <= budget, "{} > {budget}", ctx.token_count);
        }
    }

    #[test]
    fn formatting_empty_results_is_empty() {
        let ctx = format_search_context(&SearchResults::default(), &NovelState::default(), 1000);
        assert!(ctx.formatted_text.is_empty());
        assert_eq!(ctx.token_count, 0);
    }
}
