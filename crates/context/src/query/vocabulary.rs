//! Fixed vocabularies for keyword and entity heuristics.

/// Maps a trigger substring in the analysis window to a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule {
    pub trigger: &'static str,
    pub keyword: &'static str,
}

const fn rule(trigger: &'static str, keyword: &'static str) -> KeywordRule {
    KeywordRule { trigger, keyword }
}

pub const POWER_TERMS: &[KeywordRule] = &[
    rule("breakthrough", "breakthrough"),
    rule("broke through", "breakthrough"),
    rule("break through", "breakthrough"),
    rule("breaking through", "breakthrough"),
    rule("tribulation", "tribulation"),
    rule("cultivation", "cultivation"),
    rule("cultivating", "cultivation"),
    rule("realm", "realm"),
    rule("qi condensation", "qi condensation"),
    rule("foundation establishment", "foundation establishment"),
    rule("core formation", "core formation"),
    rule("golden core", "core formation"),
    rule("nascent", "nascent"),
    rule("dantian", "dantian"),
    rule("meridian", "meridian"),
    rule("bottleneck", "bottleneck"),
    rule("elixir", "pill"),
    rule("pill", "pill"),
    rule("spirit stone", "spirit stone"),
];

pub const ACTION_TERMS: &[KeywordRule] = &[
    rule("battle", "battle"),
    rule("fought", "fight"),
    rule("fight", "fight"),
    rule("duel", "duel"),
    rule("attack", "attack"),
    rule("ambush", "ambush"),
    rule("escape", "escape"),
    rule("fled", "escape"),
    rule("chase", "pursuit"),
    rule("pursu", "pursuit"),
    rule("tournament", "tournament"),
    rule("killed", "death"),
    rule("slain", "death"),
    rule("defeat", "defeat"),
];

pub const RELATIONSHIP_TERMS: &[KeywordRule] = &[
    rule("master", "master"),
    rule("disciple", "disciple"),
    rule("brother", "sibling"),
    rule("sister", "sibling"),
    rule("friend", "friendship"),
    rule("rival", "rivalry"),
    rule("enemy", "enmity"),
    rule("enemies", "enmity"),
    rule("betray", "betrayal"),
    rule("ally", "alliance"),
    rule("alliance", "alliance"),
    rule("love", "romance"),
    rule("marriage", "romance"),
    rule("father", "family"),
    rule("mother", "family"),
];

/// Title-Case words that never start a character name.
pub const STOP_WORDS: &[&str] = &[
    "The", "A", "An", "And", "But", "Or", "If", "When", "While", "Then", "After", "Before",
    "He", "She", "It", "They", "We", "You", "His", "Her", "Its", "Their", "This", "That",
    "These", "Those", "There", "Here", "What", "Why", "How", "Who", "Where", "Yes", "No",
    "Not", "In", "At", "On", "To", "From", "With", "Without", "For", "Of", "By", "As",
    "Chapter", "Meanwhile", "Suddenly", "However", "Although", "Even", "Still", "Now",
    "Soon", "Once", "Only", "Perhaps", "Finally", "Elder", "Young", "Master", "Senior",
    "Junior", "Brother", "Sister", "Sect", "Realm",
];

/// Verbs that, directly after a Title-Case name, suggest a character.
pub const DIALOGUE_VERBS: &[&str] = &[
    "said", "spoke", "asked", "replied", "nodded", "smiled", "frowned", "was", "had", "could",
];

/// Vocabularies consulted by the query analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerVocabulary {
    pub power_terms: &'static [KeywordRule],
    pub action_terms: &'static [KeywordRule],
    pub relationship_terms: &'static [KeywordRule],
    pub stop_words: &'static [&'static str],
    pub dialogue_verbs: &'static [&'static str],
}

impl Default for AnalyzerVocabulary {
    fn default() -> Self {
        Self {
            power_terms: POWER_TERMS,
            action_terms: ACTION_TERMS,
            relationship_terms: RELATIONSHIP_TERMS,
            stop_words: STOP_WORDS,
            dialogue_verbs: DIALOGUE_VERBS,
        }
    }
}

impl AnalyzerVocabulary {
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.iter().any(|w| *w == word)
    }
}
