//! Budgeted assembly of a [`MemoryContext`] into the final context string.
//!
//! Sections are considered in a fixed priority order:
//!
//! 1. **Continuity bridge**: how the previous chapter ended
//! 2. **Lore bible**: halved with a marker if it would take over the budget
//! 3. **Active arc summary**
//! 4. **Character states**
//! 5. **Thread status**
//! 6. **Semantic search** results
//! 7. **Style profile**
//! 8. **Previous chapter ending**: only if not already quoted by the first
//!    section, and allowed a small slack over the budget
//!
//! A section that does not fit is skipped whole; later, smaller sections are
//! still tried. Sections are separated by a blank line and each separator is
//! charged to the section after it.
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs.

use chronicle_config::BudgetConfig;
use chronicle_core::token;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tiers::MemoryContext;

const SEPARATOR: &str = "\n\n";
const LORE_TRUNCATION_MARKER: &str = "\n[... lore bible truncated ...]";

// ── Types ─────────────────────────────────────────────────────────────────

/// Limits applied during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyLimits {
    /// Extra room for the previous-chapter ending, percent of the budget.
    pub previous_ending_slack_pct: usize,
    /// Lore bibles above this share of the budget are halved.
    pub lore_bible_max_share_pct: usize,
}

impl Default for AssemblyLimits {
    fn default() -> Self {
        Self {
            previous_ending_slack_pct: 5,
            lore_bible_max_share_pct: 50,
        }
    }
}

impl From<&BudgetConfig> for AssemblyLimits {
    fn from(config: &BudgetConfig) -> Self {
        Self {
            previous_ending_slack_pct: config.previous_ending_slack_pct,
            lore_bible_max_share_pct: config.lore_bible_max_share_pct,
        }
    }
}

/// The assembled context and how it was built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    pub metadata: AssemblyMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Tokens charged to included sections, separators included.
    pub total_tokens: usize,
    pub budget: usize,
    /// 0.0–100.0, may exceed 100 by the previous-ending slack.
    pub utilization_pct: f32,
    /// Included sections, in output order.
    pub sections: Vec<SectionStats>,
    pub drops: Vec<DropInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStats {
    pub name: String,
    pub tokens: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub section: String,
    pub tokens_dropped: usize,
    pub reason: String,
}

// ── Assembly ──────────────────────────────────────────────────────────────

/// Assemble with the default limits (5% ending slack, 50% lore share).
pub fn assemble_context_with_budget(context: &MemoryContext, token_budget: usize) -> String {
    assemble(context, token_budget, &AssemblyLimits::default()).text
}

/// Assemble `context` into at most `token_budget` tokens, plus the
/// previous-ending slack.
pub fn assemble(
    context: &MemoryContext,
    token_budget: usize,
    limits: &AssemblyLimits,
) -> AssembledContext {
    let ordered: [(&str, &str); 7] = [
        ("continuity_bridge", context.short_term.continuity_bridge.as_str()),
        ("lore_bible", context.lore_bible_text.as_str()),
        ("active_arc", context.mid_term.active_arc_summary.as_str()),
        ("character_states", context.mid_term.character_digest.as_str()),
        ("thread_status", context.mid_term.thread_digest.as_str()),
        ("semantic_search", context.long_term.formatted_text.as_str()),
        ("style_profile", context.short_term.style_profile.as_str()),
    ];

    let mut parts: Vec<String> = Vec::new();
    let mut sections: Vec<SectionStats> = Vec::new();
    let mut drops: Vec<DropInfo> = Vec::new();
    let mut used = 0usize;

    for (name, text) in ordered {
        if text.trim().is_empty() {
            continue;
        }

        let mut text = text.to_string();
        let mut truncated = false;
        if name == "lore_bible" {
            let max_share = token_budget * limits.lore_bible_max_share_pct / 100;
            if token::estimate_tokens(&text) > max_share {
                text = halve_lore_bible(&text);
                truncated = true;
            }
        }

        let cost = charged_tokens(&parts, &text);
        if used + cost <= token_budget {
            used += cost;
            parts.push(text);
            sections.push(SectionStats {
                name: name.into(),
                tokens: cost,
                truncated,
            });
        } else {
            drops.push(DropInfo {
                section: name.into(),
                tokens_dropped: cost,
                reason: format!("needs {cost} tokens, {} left", token_budget - used),
            });
        }
    }

    let ending = context.short_term.previous_chapter_ending.as_str();
    if !ending.trim().is_empty() {
        let already_quoted = parts.first().is_some_and(|first| first.contains(ending));
        let text = format!("[Previous Chapter Ending]\n{ending}");
        let cost = charged_tokens(&parts, &text);
        let slack = token_budget * limits.previous_ending_slack_pct / 100;

        if already_quoted {
            drops.push(DropInfo {
                section: "previous_ending".into(),
                tokens_dropped: cost,
                reason: "already quoted by the first section".into(),
            });
        } else if used + cost <= token_budget + slack {
            used += cost;
            parts.push(text);
            sections.push(SectionStats {
                name: "previous_ending".into(),
                tokens: cost,
                truncated: false,
            });
        } else {
            drops.push(DropInfo {
                section: "previous_ending".into(),
                tokens_dropped: cost,
                reason: "exceeds budget and slack".into(),
            });
        }
    }

    debug!(
        budget = token_budget,
        used,
        included = sections.len(),
        dropped = drops.len(),
        "Assembled memory context"
    );

    let utilization_pct = if token_budget == 0 {
        0.0
    } else {
        used as f32 / token_budget as f32 * 100.0
    };

    AssembledContext {
        text: parts.join(SEPARATOR),
        metadata: AssemblyMetadata {
            total_tokens: used,
            budget: token_budget,
            utilization_pct,
            sections,
            drops,
        },
    }
}

/// Tokens charged for appending `text`: the separator travels with it.
fn charged_tokens(parts: &[String], text: &str) -> usize {
    if parts.is_empty() {
        token::estimate_tokens(text)
    } else {
        token::estimate_tokens(&format!("{SEPARATOR}{text}"))
    }
}

/// The first half of the lore bible, by characters, plus a marker.
fn halve_lore_bible(text: &str) -> String {
    let half = text.chars().count() / 2;
    let cut = text.char_indices().nth(half).map_or(text.len(), |(i, _)| i);
    format!("{}{LORE_TRUNCATION_MARKER}", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::{LongTermContext, MidTermContext, ShortTermContext};

    fn context() -> MemoryContext {
        MemoryContext {
            short_term: ShortTermContext {
                continuity_bridge: "[Continuity]\nChapter 3 ended with:\nThe gate fell.".into(),
                previous_chapter_ending: "The gate fell.".into(),
                style_profile: "[Style Guide]\nTone: grim".into(),
                ..Default::default()
            },
            mid_term: MidTermContext {
                active_arc_summary: "[Current Arc: Siege]\nThe city is under siege.".into(),
                character_digest: "[Character States]\n- Han Xiao (Core, alive)".into(),
                thread_digest: "[Thread Status]\n- The siege [conflict]: active".into(),
                ..Default::default()
            },
            long_term: LongTermContext {
                formatted_text: "[World Details]\n- Frostpeak: A frozen mountain.".into(),
                is_available: true,
                ..Default::default()
            },
            lore_bible_text: "[Lore Bible]\nHan Xiao is a Core cultivator.".into(),
            ..Default::default()
        }
    }

    #[test]
    fn everything_fits_in_priority_order() {
        let ctx = context();
        let text = assemble_context_with_budget(&ctx, 10_000);
        let positions: Vec<usize> = [
            "[Continuity]",
            "[Lore Bible]",
            "[Current Arc",
            "[Character States]",
            "[Thread Status]",
            "[World Details]",
            "[Style Guide]",
        ]
        .iter()
        .map(|h| text.find(h).expect("section present"))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        // The bridge already quotes the ending.
        assert!(!text.contains("[Previous Chapter Ending]"));
    }

    #[test]
    fn budget_below_bridge_gives_empty_output() {
        let ctx = MemoryContext {
            short_term: ShortTermContext {
                continuity_bridge: "x".repeat(400),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(assemble_context_with_budget(&ctx, 99), "");
    }

    #[test]
    fn oversized_section_is_skipped_and_later_ones_tried() {
        let mut ctx = context();
        ctx.mid_term.character_digest = "y".repeat(4_000);
        let text = assemble_context_with_budget(&ctx, 200);
        assert!(!text.contains("yyyy"));
        assert!(text.contains("[Thread Status]"));
        assert!(text.contains("[Style Guide]"));
    }

    #[test]
    fn lore_bible_halved_when_over_half_the_budget() {
        let mut ctx = MemoryContext::default();
        ctx.lore_bible_text = "L".repeat(480);
        // 120 tokens > 50% of 200, so it is cut to 240 chars plus the marker.
        let assembled = assemble(&ctx, 200, &AssemblyLimits::default());
        assert!(assembled.text.starts_with(&"L".repeat(240)));
        assert!(!assembled.text.contains(&"L".repeat(241)));
        assert!(assembled.text.ends_with(LORE_TRUNCATION_MARKER));
        assert!(assembled.metadata.sections[0].truncated);
        assert_eq!(
            assembled.metadata.sections[0].tokens,
            token::estimate_tokens(&assembled.text)
        );
    }

    #[test]
    fn lore_bible_within_share_is_untouched() {
        let mut ctx = MemoryContext::default();
        ctx.lore_bible_text = "L".repeat(400);
        let text = assemble_context_with_budget(&ctx, 200);
        assert_eq!(text, "L".repeat(400));
    }

    #[test]
    fn previous_ending_added_when_bridge_dropped() {
        let mut ctx = context();
        ctx.short_term.continuity_bridge = "b".repeat(4_000);
        ctx.short_term.previous_chapter_ending = "The gate fell at dawn.".into();
        let text = assemble_context_with_budget(&ctx, 300);
        assert!(text.ends_with("[Previous Chapter Ending]\nThe gate fell at dawn."));
    }

    #[test]
    fn previous_ending_uses_slack_only() {
        let ctx = MemoryContext {
            short_term: ShortTermContext {
                continuity_bridge: "c".repeat(400), // 100 tokens
                previous_chapter_ending: "e".repeat(4),
                ..Default::default()
            },
            ..Default::default()
        };
        // Ending section costs 8 tokens with its header and separator.
        let full = assemble(&ctx, 100, &AssemblyLimits::default());
        assert!(!full.text.contains("[Previous Chapter Ending]"), "5 tokens of slack");
        let roomy = assemble(&ctx, 104, &AssemblyLimits::default());
        assert!(roomy.text.contains("[Previous Chapter Ending]"));
        assert!(roomy.metadata.total_tokens > 104);
    }

    #[test]
    fn output_never_exceeds_budget_plus_slack() {
        let ctx = context();
        for budget in [0usize, 1, 5, 17, 40, 63, 90, 128, 500] {
            let assembled = assemble(&ctx, budget, &AssemblyLimits::default());
            let limit = budget + budget * 5 / 100;
            assert!(
                token::estimate_tokens(&assembled.text) <= limit,
                "budget {budget}: {} tokens",
                token::estimate_tokens(&assembled.text)
            );
            assert!(assembled.metadata.total_tokens <= limit);
        }
    }

    #[test]
    fn empty_context_assembles_to_nothing() {
        let assembled = assemble(&MemoryContext::default(), 1_000, &AssemblyLimits::default());
        assert!(assembled.text.is_empty());
        assert!(assembled.metadata.sections.is_empty());
        assert!(assembled.metadata.drops.is_empty());
    }

    #[test]
    fn limits_follow_budget_config() {
        let config = BudgetConfig {
            previous_ending_slack_pct: 10,
            lore_bible_max_share_pct: 30,
            ..Default::default()
        };
        let limits = AssemblyLimits::from(&config);
        assert_eq!(limits.previous_ending_slack_pct, 10);
        assert_eq!(limits.lore_bible_max_share_pct, 30);
    }
}
