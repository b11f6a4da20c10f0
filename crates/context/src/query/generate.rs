//! Search-query generation from extracted entities and keywords.

use std::collections::HashSet;

use chronicle_core::novel::NovelState;

use super::extract::Keywords;
use super::{EntityKind, ExtractedEntity, GeneratedQuery, QueryKind, QueryPriority};

const MAX_CHARACTER_QUERIES: usize = 3;
const MAX_LOCATION_QUERIES: usize = 2;
const MAX_TECHNIQUE_QUERIES: usize = 2;
/// Weakest character entity that earns a query.
const MIN_CHARACTER_CONFIDENCE: f32 = 0.6;

/// Build, deduplicate, order and truncate the search queries.
pub fn generate_queries(
    entities: &[ExtractedEntity],
    keywords: &Keywords,
    state: &NovelState,
    max_queries: usize,
) -> Vec<GeneratedQuery> {
    let mut queries = Vec::new();
    let protagonist = state.protagonist().map(|p| p.name.as_str());

    let characters = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Character && e.confidence >= MIN_CHARACTER_CONFIDENCE)
        .filter(|e| protagonist.is_none_or(|p| !p.eq_ignore_ascii_case(&e.name)))
        .take(MAX_CHARACTER_QUERIES);
    for entity in characters {
        let priority = if entity.confidence >= 0.9 {
            QueryPriority::High
        } else {
            QueryPriority::Medium
        };
        queries.push(GeneratedQuery::new(
            format!("{} background, relationships and current status", entity.name),
            QueryKind::Character,
            priority,
            format!("{} appears in recent text", entity.name),
        ));

        if let Some(p) = protagonist
            && entity.context.to_lowercase().contains(&p.to_lowercase())
        {
            queries.push(GeneratedQuery::new(
                format!("{p} and {} relationship history", entity.name),
                QueryKind::Relationship,
                QueryPriority::Medium,
                format!("{} appears alongside {p}", entity.name),
            ));
        }
    }

    let places = entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Location | EntityKind::Sect))
        .take(MAX_LOCATION_QUERIES);
    for entity in places {
        let (text, kind) = match entity.kind {
            EntityKind::Sect => (
                format!("{} sect hierarchy, members and techniques", entity.name),
                QueryKind::Sect,
            ),
            _ => (
                format!("{} geography, factions and notable features", entity.name),
                QueryKind::Location,
            ),
        };
        queries.push(GeneratedQuery::new(
            text,
            kind,
            QueryPriority::Medium,
            format!("{} is mentioned in recent text", entity.name),
        ));
    }

    let artifacts = entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Technique | EntityKind::Item))
        .take(MAX_TECHNIQUE_QUERIES);
    for entity in artifacts {
        let (text, kind) = match entity.kind {
            EntityKind::Item => (
                format!("{} origin, powers and current owner", entity.name),
                QueryKind::Item,
            ),
            _ => (
                format!("{} technique effects, requirements and users", entity.name),
                QueryKind::Technique,
            ),
        };
        queries.push(GeneratedQuery::new(
            text,
            kind,
            QueryPriority::Medium,
            format!("{} is used in recent text", entity.name),
        ));
    }

    if keywords.has_power("breakthrough") || keywords.has_power("tribulation") {
        queries.push(GeneratedQuery::new(
            "Cultivation breakthrough requirements and tribulation dangers",
            QueryKind::Power,
            QueryPriority::Medium,
            "breakthrough vocabulary in recent text",
        ));
    }
    if !keywords.relationship.is_empty() {
        queries.push(GeneratedQuery::new(
            "Key relationships, loyalties and grudges between characters",
            QueryKind::Relationship,
            QueryPriority::Low,
            format!("relationship terms: {}", keywords.relationship.join(", ")),
        ));
    }
    if !keywords.power.is_empty() {
        queries.push(GeneratedQuery::new(
            "Cultivation realm hierarchy and power levels",
            QueryKind::Power,
            QueryPriority::Low,
            format!("power terms: {}", keywords.power.join(", ")),
        ));
    }

    finalize(queries, max_queries)
}

/// Drop case-insensitive duplicates, stable-sort by priority, truncate.
pub fn finalize(queries: Vec<GeneratedQuery>, max_queries: usize) -> Vec<GeneratedQuery> {
    let mut seen = HashSet::new();
    let mut queries: Vec<GeneratedQuery> = queries
        .into_iter()
        .filter(|q| seen.insert(q.text.to_lowercase()))
        .collect();
    queries.sort_by_key(|q| q.priority);
    queries.truncate(max_queries);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::novel::Character;

    fn entity(name: &str, kind: EntityKind, confidence: f32, context: &str) -> ExtractedEntity {
        ExtractedEntity {
            name: name.into(),
            kind,
            confidence,
            context: context.into(),
        }
    }

    fn state() -> NovelState {
        NovelState {
            characters: vec![Character {
                id: "p".into(),
                name: "Han Xiao".into(),
                is_protagonist: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn character_queries_skip_protagonist_and_weak_entities() {
        let entities = vec![
            entity("Han Xiao", EntityKind::Character, 1.0, ""),
            entity("Lin Yue", EntityKind::Character, 1.0, "Lin Yue glared"),
            entity("Mo Chen", EntityKind::Character, 0.7, "Mo Chen said"),
            entity("Stone Bridge", EntityKind::Character, 0.4, ""),
        ];
        let queries = generate_queries(&entities, &Keywords::default(), &state(), 8);
        let texts: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Lin Yue background, relationships and current status",
                "Mo Chen background, relationships and current status",
            ]
        );
        assert_eq!(queries[0].priority, QueryPriority::High);
        assert_eq!(queries[1].priority, QueryPriority::Medium);
    }

    #[test]
    fn relationship_query_when_protagonist_in_snippet() {
        let entities = vec![entity("Lin Yue", EntityKind::Character, 1.0, "han xiao bowed to Lin Yue")];
        let queries = generate_queries(&entities, &Keywords::default(), &state(), 8);
        assert!(queries
            .iter()
            .any(|q| q.kind == QueryKind::Relationship && q.text == "Han Xiao and Lin Yue relationship history"));
    }

    #[test]
    fn at_most_three_character_queries() {
        let entities: Vec<ExtractedEntity> = (0..6)
            .map(|i| entity(&format!("Name{i}"), EntityKind::Character, 1.0, ""))
            .collect();
        let queries = generate_queries(&entities, &Keywords::default(), &state(), 8);
        assert_eq!(queries.len(), 3);
    }

    #[test]
    fn locations_and_techniques_capped_at_two() {
        let entities = vec![
            entity("Frostpeak", EntityKind::Location, 0.9, ""),
            entity("Azure Sect", EntityKind::Sect, 1.0, ""),
            entity("Misty Vale", EntityKind::Location, 0.6, ""),
            entity("Azure Palm", EntityKind::Technique, 1.0, ""),
            entity("Jade Gourd", EntityKind::Item, 1.0, ""),
            entity("Iron Body", EntityKind::Technique, 1.0, ""),
        ];
        let queries = generate_queries(&entities, &Keywords::default(), &state(), 8);
        let kinds: Vec<QueryKind> = queries.iter().map(|q| q.kind).collect();
        assert_eq!(
            kinds,
            vec![QueryKind::Location, QueryKind::Sect, QueryKind::Technique, QueryKind::Item]
        );
    }

    #[test]
    fn keyword_queries_are_ordered_after_entities() {
        let keywords = Keywords {
            power: vec!["breakthrough".into()],
            action: vec![],
            relationship: vec!["master".into()],
        };
        let entities = vec![entity("Lin Yue", EntityKind::Character, 1.0, "")];
        let queries = generate_queries(&entities, &keywords, &state(), 8);
        let priorities: Vec<QueryPriority> = queries.iter().map(|q| q.priority).collect();
        assert_eq!(
            priorities,
            vec![
                QueryPriority::High,
                QueryPriority::Medium,
                QueryPriority::Low,
                QueryPriority::Low
            ]
        );
        assert_eq!(queries[1].kind, QueryKind::Power);
    }

    #[test]
    fn finalize_dedups_case_insensitively_and_sorts_stably() {
        let queries = vec![
            GeneratedQuery::new("low one", QueryKind::General, QueryPriority::Low, ""),
            GeneratedQuery::new("Medium A", QueryKind::General, QueryPriority::Medium, ""),
            GeneratedQuery::new("medium a", QueryKind::General, QueryPriority::High, ""),
            GeneratedQuery::new("Medium B", QueryKind::General, QueryPriority::Medium, ""),
            GeneratedQuery::new("high", QueryKind::General, QueryPriority::High, ""),
        ];
        let texts: Vec<String> = finalize(queries, 3).into_iter().map(|q| q.text).collect();
        assert_eq!(texts, vec!["high", "Medium A", "Medium B"]);
    }
}
