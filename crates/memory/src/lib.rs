//! Collaborator implementations for the Chronicle memory engine.
//!
//! - [`NoopSearch`] / [`NoopLore`]: disable a collaborator entirely
//! - [`InMemoryIndex`]: term-vector search over a novel snapshot
//! - [`StateLoreSynthesizer`]: lore bible derived from the snapshot

pub mod in_memory;
pub mod lore;
pub mod noop;
pub mod vector;

pub use in_memory::InMemoryIndex;
pub use lore::StateLoreSynthesizer;
pub use noop::{NoopLore, NoopSearch};
pub use vector::{cosine_similarity, term_vector, tokenize};
