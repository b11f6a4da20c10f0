//! # Chronicle Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! Chronicle memory engine. This crate has **zero framework dependencies**; it
//! defines the novel model and the seams that the other crates implement
//! against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (vector search, lore synthesis) is a trait
//! here. Implementations live in `chronicle-memory`. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with hanging/failing/panicking stubs
//! - One shared token estimator for all budget accounting

pub mod error;
pub mod lore;
pub mod novel;
pub mod search;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{LoreError, SearchError, StateError};
pub use lore::{LoreBible, LoreSynthesizer, ProtagonistSnapshot, format_lore_bible};
pub use novel::{
    Antagonist, ArcStatus, Chapter, Character, CharacterStatus, CharacterUpdate, NamedEntry,
    NovelState, Relationship, StoryArc, StoryThread, StyleProfile, Territory, ThreadKind,
    ThreadStatus, ThreatLevel, WorldCategory, WorldEntry,
};
pub use search::{SearchHit, SearchOptions, SearchResults, VectorSearch};
pub use token::estimate_tokens;
