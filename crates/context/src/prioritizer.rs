//! Context prioritizer: scoring, budget allocation and budgeted selection.
//!
//! Everything here is a pure function of its inputs. Items are never
//! truncated: an item either fits in the remaining budget or is skipped.

use chronicle_config::BudgetPercentages;
use chronicle_core::novel::{CharacterStatus, NovelState, ThreadKind, ThreadStatus, ThreatLevel};
use chronicle_core::search::{SearchHit, SearchResults};
use chronicle_core::token;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextCategory {
    Continuity,
    LoreBible,
    Characters,
    Plot,
    World,
    Power,
    Chapters,
    Style,
}

impl ContextCategory {
    pub const ALL: [ContextCategory; 8] = [
        Self::Continuity,
        Self::LoreBible,
        Self::Characters,
        Self::Plot,
        Self::World,
        Self::Power,
        Self::Chapters,
        Self::Style,
    ];

    /// Categories eligible for surplus, most important first.
    pub const REBALANCE_ORDER: [ContextCategory; 7] = [
        Self::Continuity,
        Self::LoreBible,
        Self::Characters,
        Self::Plot,
        Self::World,
        Self::Power,
        Self::Chapters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuity => "continuity",
            Self::LoreBible => "lore_bible",
            Self::Characters => "characters",
            Self::Plot => "plot",
            Self::World => "world",
            Self::Power => "power",
            Self::Chapters => "chapters",
            Self::Style => "style",
        }
    }

    /// Content-independent priority of a whole section.
    pub fn structural_priority(&self) -> f64 {
        match self {
            Self::Continuity => 1000.0,
            Self::LoreBible => 900.0,
            Self::Characters => 700.0,
            Self::Plot => 650.0,
            Self::World => 500.0,
            Self::Power => 400.0,
            Self::Chapters => 300.0,
            Self::Style => 0.0,
        }
    }
}

/// A unit of content competing for budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedItem {
    pub id: String,
    pub category: ContextCategory,
    pub content: String,
    pub priority: f64,
    pub token_count: usize,
    pub reason: String,
}

impl PrioritizedItem {
    pub fn new(
        id: impl Into<String>,
        category: ContextCategory,
        content: impl Into<String>,
        priority: f64,
        reason: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            category,
            token_count: token::estimate_tokens(&content),
            content,
            priority,
            reason: reason.into(),
        }
    }
}

/// Integer token budget per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub continuity: usize,
    pub lore_bible: usize,
    pub characters: usize,
    pub plot_elements: usize,
    pub world_building: usize,
    pub power_elements: usize,
    pub recent_chapters: usize,
    pub style: usize,
}

impl BudgetAllocation {
    pub fn get(&self, category: ContextCategory) -> usize {
        match category {
            ContextCategory::Continuity => self.continuity,
            ContextCategory::LoreBible => self.lore_bible,
            ContextCategory::Characters => self.characters,
            ContextCategory::Plot => self.plot_elements,
            ContextCategory::World => self.world_building,
            ContextCategory::Power => self.power_elements,
            ContextCategory::Chapters => self.recent_chapters,
            ContextCategory::Style => self.style,
        }
    }

    pub fn set(&mut self, category: ContextCategory, tokens: usize) {
        let slot = match category {
            ContextCategory::Continuity => &mut self.continuity,
            ContextCategory::LoreBible => &mut self.lore_bible,
            ContextCategory::Characters => &mut self.characters,
            ContextCategory::Plot => &mut self.plot_elements,
            ContextCategory::World => &mut self.world_building,
            ContextCategory::Power => &mut self.power_elements,
            ContextCategory::Chapters => &mut self.recent_chapters,
            ContextCategory::Style => &mut self.style,
        };
        *slot = tokens;
    }

    pub fn total(&self) -> usize {
        ContextCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Budget shared by the four semantic-search categories.
    pub fn search_share(&self) -> usize {
        self.characters + self.plot_elements + self.world_building + self.power_elements
    }
}

/// The seven assembled sections fed to the structural prioritizer.
#[derive(Debug, Clone, Default)]
pub struct ContextSections {
    pub continuity: String,
    pub lore_bible: String,
    pub characters: String,
    pub plot: String,
    pub world: String,
    pub power: String,
    pub chapters: String,
}

// ── Scoring ───────────────────────────────────────────────────────────────

/// Score every search hit with category-specific heuristics, best first.
pub fn prioritize_search_results(
    results: &SearchResults,
    state: &NovelState,
) -> Vec<PrioritizedItem> {
    let mut items: Vec<PrioritizedItem> = Vec::with_capacity(results.len());

    for hit in &results.characters {
        let (score, reasons) = score_character(hit, state);
        items.push(search_item(hit, ContextCategory::Characters, score, reasons));
    }
    for hit in &results.world_entries {
        let (score, reasons) = score_world(hit);
        items.push(search_item(hit, ContextCategory::World, score, reasons));
    }
    for hit in &results.plot_elements {
        let (score, reasons) = score_plot(hit, state);
        items.push(search_item(hit, ContextCategory::Plot, score, reasons));
    }
    for hit in &results.power_elements {
        let (score, reasons) = score_power(hit, state);
        items.push(search_item(hit, ContextCategory::Power, score, reasons));
    }

    items.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    items
}

fn score_character(hit: &SearchHit, state: &NovelState) -> (f64, Vec<String>) {
    let mut score = f64::from(hit.score) * 40.0;
    let mut reasons = vec![format!("relevance {:.2}", hit.score)];

    let character = state
        .character_by_id(&hit.id)
        .or_else(|| state.character_by_name(&hit.name));
    if let Some(c) = character {
        if c.is_protagonist {
            score += 100.0;
            reasons.push("protagonist".into());
        }
        if !c.relationships.is_empty() {
            score += c.relationships.len() as f64 * 5.0;
            reasons.push(format!("{} relationships", c.relationships.len()));
        }
        if c.status == CharacterStatus::Alive {
            score += 20.0;
            reasons.push("alive".into());
        }
        let in_active_thread = state
            .threads
            .iter()
            .any(|t| t.status == ThreadStatus::Active && t.character_ids.contains(&c.id));
        if in_active_thread {
            score += 25.0;
            reasons.push("in active thread".into());
        }
    }

    let antagonist = state.antagonists.iter().find(|a| {
        a.id == hit.id
            || a.character_id.as_deref() == Some(hit.id.as_str())
            || a.name.eq_ignore_ascii_case(&hit.name)
    });
    let threat = match antagonist {
        Some(a) => {
            score += 15.0;
            reasons.push("antagonist".into());
            Some(a.threat_level)
        }
        None => hit.meta_str("threat_level").and_then(ThreatLevel::parse),
    };
    if let Some(level) = threat {
        let bonus = threat_bonus(level);
        if bonus > 0.0 {
            score += bonus;
            reasons.push(format!("{level:?} threat").to_lowercase());
        }
    }

    (score, reasons)
}

fn score_world(hit: &SearchHit) -> (f64, Vec<String>) {
    let mut score = f64::from(hit.score) * 30.0;
    let mut reasons = vec![format!("relevance {:.2}", hit.score)];
    let category = hit.meta_str("category").unwrap_or(&hit.kind);
    if matches!(category, "geography" | "sects") {
        score += 15.0;
        reasons.push(format!("{category} entry"));
    }
    (score, reasons)
}

fn score_plot(hit: &SearchHit, state: &NovelState) -> (f64, Vec<String>) {
    let mut score = f64::from(hit.score) * 35.0;
    let mut reasons = vec![format!("relevance {:.2}", hit.score)];

    let thread = state.threads.iter().find(|t| t.id == hit.id);
    let active = match thread {
        Some(t) => t.status == ThreadStatus::Active,
        None => hit.meta_str("status") == Some("active"),
    };
    if active {
        score += 25.0;
        reasons.push("active thread".into());
    }
    let conflict = match thread {
        Some(t) => t.kind == ThreadKind::Conflict,
        None => hit.meta_str("thread_kind") == Some("conflict"),
    };
    if conflict {
        score += 15.0;
        reasons.push("conflict".into());
    }
    (score, reasons)
}

fn score_power(hit: &SearchHit, state: &NovelState) -> (f64, Vec<String>) {
    let mut score = f64::from(hit.score) * 35.0;
    let mut reasons = vec![format!("relevance {:.2}", hit.score)];

    let realm = state
        .protagonist()
        .map(|p| p.cultivation.trim().to_lowercase())
        .filter(|r| !r.is_empty());
    if let Some(realm) = realm {
        let text = format!("{} {}", hit.name, hit.content).to_lowercase();
        if text.contains(&realm) {
            score += 20.0;
            reasons.push("matches protagonist realm".into());
        }
    }
    (score, reasons)
}

fn threat_bonus(level: ThreatLevel) -> f64 {
    match level {
        ThreatLevel::Low => 0.0,
        ThreatLevel::Medium => 10.0,
        ThreatLevel::High => 20.0,
        ThreatLevel::Extreme => 30.0,
    }
}

fn search_item(
    hit: &SearchHit,
    category: ContextCategory,
    score: f64,
    reasons: Vec<String>,
) -> PrioritizedItem {
    let content = if hit.content.trim().is_empty() {
        hit.name.clone()
    } else {
        format!("{}: {}", hit.name, hit.content.trim())
    };
    PrioritizedItem::new(
        format!("{}:{}", category.as_str(), hit.id),
        category,
        content,
        score,
        reasons.join(", "),
    )
}

// ── Structural list ───────────────────────────────────────────────────────

/// Whole sections with their structural priorities, highest first.
/// Empty sections are left out.
pub fn build_prioritized_context_list(sections: &ContextSections) -> Vec<PrioritizedItem> {
    [
        (ContextCategory::Continuity, &sections.continuity),
        (ContextCategory::LoreBible, &sections.lore_bible),
        (ContextCategory::Characters, &sections.characters),
        (ContextCategory::Plot, &sections.plot),
        (ContextCategory::World, &sections.world),
        (ContextCategory::Power, &sections.power),
        (ContextCategory::Chapters, &sections.chapters),
    ]
    .into_iter()
    .filter(|(_, content)| !content.trim().is_empty())
    .map(|(category, content)| {
        PrioritizedItem::new(
            category.as_str(),
            category,
            content.as_str(),
            category.structural_priority(),
            "structural",
        )
    })
    .collect()
}

// ── Selection ─────────────────────────────────────────────────────────────

/// Greedy two-pass selection.
///
/// Pass one takes every must-include id, in input order, that still fits;
/// pass two fills the rest of the budget in input order. The selection is
/// returned in input order.
pub fn select_within_budget(
    items: &[PrioritizedItem],
    token_budget: usize,
    must_include: &[&str],
) -> Vec<PrioritizedItem> {
    let required: HashSet<&str> = must_include.iter().copied().collect();
    let mut selected = vec![false; items.len()];
    let mut remaining = token_budget;

    for (i, item) in items.iter().enumerate() {
        if required.contains(item.id.as_str()) && item.token_count <= remaining {
            selected[i] = true;
            remaining -= item.token_count;
        }
    }
    for (i, item) in items.iter().enumerate() {
        if !selected[i] && item.token_count <= remaining {
            selected[i] = true;
            remaining -= item.token_count;
        }
    }

    items
        .iter()
        .zip(selected)
        .filter_map(|(item, keep)| keep.then(|| item.clone()))
        .collect()
}

// ── Budgets ───────────────────────────────────────────────────────────────

/// Split `total` by the configured percentages, flooring each share.
pub fn allocate_budget(total: usize, percentages: &BudgetPercentages) -> BudgetAllocation {
    let share = |pct: u32| {
        let pct = pct as usize;
        // floor(total * pct / 100) without overflowing on large totals
        (total / 100) * pct + (total % 100) * pct / 100
    };
    BudgetAllocation {
        continuity: share(percentages.continuity),
        lore_bible: share(percentages.lore_bible),
        characters: share(percentages.characters),
        plot_elements: share(percentages.plot),
        world_building: share(percentages.world),
        power_elements: share(percentages.power),
        recent_chapters: share(percentages.chapters),
        style: share(percentages.style),
    }
}

/// Reclaim unused budget and hand it to categories that used all of theirs.
///
/// Under-used categories drop to their usage. The surplus goes, in
/// [`ContextCategory::REBALANCE_ORDER`], to categories whose usage reached
/// their allocation, each growing by at most half its original allocation.
/// Whatever is left afterwards is discarded.
pub fn rebalance_budget(
    allocation: &BudgetAllocation,
    usage: &BudgetAllocation,
) -> BudgetAllocation {
    let mut rebalanced = *allocation;
    let mut surplus = 0usize;

    for category in ContextCategory::ALL {
        let allocated = allocation.get(category);
        let used = usage.get(category);
        if used < allocated {
            surplus += allocated - used;
            rebalanced.set(category, used);
        }
    }

    for category in ContextCategory::REBALANCE_ORDER {
        if surplus == 0 {
            break;
        }
        let allocated = allocation.get(category);
        if usage.get(category) < allocated {
            continue;
        }
        let grant = (allocated / 2).min(surplus);
        rebalanced.set(category, allocated + grant);
        surplus -= grant;
    }

    rebalanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::novel::{Antagonist, Character, Relationship, StoryThread};

    fn hit(id: &str, name: &str, score: f32) -> SearchHit {
        SearchHit {
            id: id.into(),
            name: name.into(),
            kind: "character".into(),
            score,
            content: format!("{name} details"),
            ..Default::default()
        }
    }

    fn item(id: &str, tokens: usize) -> PrioritizedItem {
        PrioritizedItem::new(id, ContextCategory::Plot, "x".repeat(tokens * 4), 1.0, "")
    }

    // ── Scoring ──

    fn scoring_state() -> NovelState {
        NovelState {
            characters: vec![
                Character {
                    id: "p".into(),
                    name: "Han Xiao".into(),
                    is_protagonist: true,
                    cultivation: "Nascent Soul".into(),
                    relationships: vec![Relationship {
                        character_id: "c".into(),
                        name: "Lin Yue".into(),
                        kind: "friend".into(),
                    }],
                    ..Default::default()
                },
                Character {
                    id: "villain".into(),
                    name: "Mo Chen".into(),
                    status: CharacterStatus::Deceased,
                    ..Default::default()
                },
            ],
            antagonists: vec![Antagonist {
                id: "a1".into(),
                name: "Mo Chen".into(),
                character_id: Some("villain".into()),
                threat_level: ThreatLevel::Extreme,
                ..Default::default()
            }],
            threads: vec![StoryThread {
                id: "t1".into(),
                title: "Blood feud".into(),
                kind: ThreadKind::Conflict,
                status: ThreadStatus::Active,
                character_ids: vec!["p".into()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn protagonist_scores_additively() {
        let results = SearchResults {
            characters: vec![hit("p", "Han Xiao", 0.5)],
            ..Default::default()
        };
        let items = prioritize_search_results(&results, &scoring_state());
        // 0.5*40 + 100 + 1*5 + 20 + 25
        assert!((items[0].priority - 170.0).abs() < 1e-9);
        assert!(items[0].reason.contains("protagonist"));
        assert_eq!(items[0].id, "characters:p");
    }

    #[test]
    fn antagonist_gets_link_and_threat_bonus() {
        let results = SearchResults {
            characters: vec![hit("villain", "Mo Chen", 1.0)],
            ..Default::default()
        };
        let items = prioritize_search_results(&results, &scoring_state());
        // 40 + antagonist 15 + extreme 30, deceased so no alive bonus
        assert!((items[0].priority - 85.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_character_uses_metadata_threat() {
        let mut stranger = hit("x", "Stranger", 0.0);
        stranger.metadata.insert("threat_level".into(), "high".into());
        let results = SearchResults {
            characters: vec![stranger],
            ..Default::default()
        };
        let items = prioritize_search_results(&results, &scoring_state());
        assert!((items[0].priority - 20.0).abs() < 1e-9);
    }

    #[test]
    fn plot_and_power_bonuses() {
        let mut plot = hit("t1", "Blood feud", 1.0);
        plot.kind = "thread".into();
        let mut power = hit("k1", "Soul Forging", 0.0);
        power.content = "A method only Nascent Soul cultivators can attempt.".into();
        let mut world = hit("w1", "Frostpeak", 1.0);
        world.metadata.insert("category".into(), "geography".into());
        let results = SearchResults {
            plot_elements: vec![plot],
            power_elements: vec![power],
            world_entries: vec![world],
            ..Default::default()
        };
        let items = prioritize_search_results(&results, &scoring_state());
        let by_id = |id: &str| items.iter().find(|i| i.id == id).map(|i| i.priority);
        assert_eq!(by_id("plot:t1"), Some(35.0 + 25.0 + 15.0));
        assert_eq!(by_id("power:k1"), Some(20.0));
        assert_eq!(by_id("world:w1"), Some(30.0 + 15.0));
    }

    #[test]
    fn results_sorted_descending() {
        let results = SearchResults {
            characters: vec![hit("nobody", "Nobody", 0.1), hit("p", "Han Xiao", 0.1)],
            world_entries: vec![hit("w", "Place", 0.9)],
            ..Default::default()
        };
        let items = prioritize_search_results(&results, &scoring_state());
        assert!(items.windows(2).all(|w| w[0].priority >= w[1].priority));
        assert_eq!(items[0].id, "characters:p");
    }

    // ── Structural list ──

    #[test]
    fn structural_list_omits_empty_sections() {
        let sections = ContextSections {
            continuity: "bridge".into(),
            plot: "threads".into(),
            world: "   ".into(),
            chapters: "text".into(),
            ..Default::default()
        };
        let items = build_prioritized_context_list(&sections);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["continuity", "plot", "chapters"]);
        assert_eq!(items[0].priority, 1000.0);
        assert_eq!(items[1].priority, 650.0);
        assert_eq!(items[2].priority, 300.0);
    }

    // ── Selection ──

    #[test]
    fn selection_skips_items_that_do_not_fit() {
        let items = vec![item("a", 5), item("b", 10), item("c", 3)];
        let ids: Vec<String> = select_within_budget(&items, 9, &[])
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn must_include_wins_over_earlier_items() {
        let items = vec![item("a", 6), item("b", 6), item("must", 6)];
        let ids: Vec<String> = select_within_budget(&items, 12, &["must"])
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a", "must"]);
    }

    #[test]
    fn must_include_that_cannot_fit_is_skipped() {
        let items = vec![item("big", 50), item("small", 2)];
        let ids: Vec<String> = select_within_budget(&items, 10, &["big"])
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["small"]);
    }

    #[test]
    fn selection_never_exceeds_budget() {
        let items: Vec<PrioritizedItem> = (1..20).map(|n| item(&format!("i{n}"), n)).collect();
        for budget in [0, 1, 7, 33, 100, 1000] {
            let used: usize = select_within_budget(&items, budget, &["i3", "i9"])
                .iter()
                .map(|i| i.token_count)
                .sum();
            assert!(used <= budget);
        }
    }

    // ── Budgets ──

    #[test]
    fn default_allocation_of_sixteen_thousand() {
        let a = allocate_budget(16_000, &BudgetPercentages::default());
        assert_eq!(a.continuity, 3_200);
        assert_eq!(a.lore_bible, 2_400);
        assert_eq!(a.style, 800);
        assert_eq!(a.total(), 16_000);
        assert_eq!(a.search_share(), 8_000);
    }

    #[test]
    fn allocation_never_exceeds_total() {
        let pct = BudgetPercentages::default();
        for total in [0usize, 1, 7, 99, 101, 333, 8_001, 123_457, usize::MAX / 2] {
            assert!(allocate_budget(total, &pct).total() <= total, "total {total}");
        }
    }

    #[test]
    fn allocation_floors_each_share() {
        let a = allocate_budget(99, &BudgetPercentages::default());
        assert_eq!(a.continuity, 19);
        assert_eq!(a.style, 4);
    }

    #[test]
    fn rebalance_moves_surplus_in_priority_order() {
        let allocation = allocate_budget(1_000, &BudgetPercentages::default());
        // continuity 200, lore 150, characters 150, plot 150, world 100,
        // power 100, chapters 100, style 50
        let usage = BudgetAllocation {
            continuity: 200,
            lore_bible: 0,
            characters: 150,
            plot_elements: 150,
            world_building: 100,
            power_elements: 40,
            recent_chapters: 100,
            style: 0,
        };
        let r = rebalance_budget(&allocation, &usage);
        // surplus = 150 + 60 + 50 = 260
        assert_eq!(r.lore_bible, 0);
        assert_eq!(r.power_elements, 40);
        assert_eq!(r.style, 0);
        assert_eq!(r.continuity, 300);
        assert_eq!(r.characters, 225);
        // 260 - 100 - 75 = 85 left for plot (cap 75), then 10 for world
        assert_eq!(r.plot_elements, 225);
        assert_eq!(r.world_building, 110);
        assert_eq!(r.recent_chapters, 100);
    }

    #[test]
    fn rebalance_never_exceeds_one_and_a_half_times_original() {
        let allocation = allocate_budget(10_000, &BudgetPercentages::default());
        let usage = BudgetAllocation {
            continuity: 50_000,
            ..Default::default()
        };
        let r = rebalance_budget(&allocation, &usage);
        for category in ContextCategory::ALL {
            assert!(r.get(category) * 2 <= allocation.get(category) * 3);
        }
        assert_eq!(r.continuity, 3_000);
    }

    #[test]
    fn rebalance_without_surplus_is_identity() {
        let allocation = allocate_budget(1_000, &BudgetPercentages::default());
        assert_eq!(rebalance_budget(&allocation, &allocation), allocation);
    }
}
