//! Branch failure taxonomy for the tier manager.
//!
//! None of these ever reach a caller of `gather_memory_context`; they are
//! logged and replaced by the failing branch's empty value.

use chronicle_core::error::{LoreError, SearchError};
use thiserror::Error;

/// Why a single tier branch produced no value.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("lore synthesis failed: {0}")]
    Lore(#[from] LoreError),

    #[error("{tier} tier timed out after {timeout_ms}ms")]
    TimedOut { tier: &'static str, timeout_ms: u64 },

    #[error("{tier} tier panicked: {message}")]
    Panicked { tier: &'static str, message: String },
}
