//! Error types for the Chronicle domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error type so the engine can
//! tell a failed search apart from a failed lore synthesis. Timeouts and
//! panics are not collaborator errors; the tier manager reports those.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search service unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum LoreError {
    #[error("Lore synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("No protagonist defined for novel {0}")]
    MissingProtagonist(String),
}

/// Loading a novel snapshot from disk.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read novel snapshot at {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Invalid novel snapshot: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_error_displays_correctly() {
        let err = SearchError::Unavailable("index has not been built".into());
        assert_eq!(
            err.to_string(),
            "Search service unavailable: index has not been built"
        );
    }

    #[test]
    fn state_error_displays_correctly() {
        let err = StateError::ReadFailed {
            path: "novel.json".into(),
            reason: "No such file".into(),
        };
        assert!(err.to_string().contains("novel.json"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn missing_protagonist_names_novel() {
        let err = LoreError::MissingProtagonist("novel-1".into());
        assert!(err.to_string().ends_with("novel novel-1"));
    }
}
