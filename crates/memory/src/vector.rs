//! Term-vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Tokenization into lowercase terms (stop words removed)
//! - Sparse term-frequency vectors
//! - Cosine similarity between sparse vectors

use std::collections::HashMap;

/// A sparse term-frequency vector.
pub type TermVector = HashMap<String, f32>;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "he", "her",
    "his", "in", "is", "it", "its", "of", "on", "or", "she", "that", "the", "their", "them",
    "they", "this", "to", "was", "were", "what", "when", "which", "with",
];

/// Split text into lowercase alphanumeric terms, dropping stop words and
/// single characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Build a term-frequency vector from text.
pub fn term_vector(text: &str) -> TermVector {
    let mut vector = TermVector::new();
    for term in tokenize(text) {
        *vector.entry(term).or_insert(0.0) += 1.0;
    }
    vector
}

/// Compute cosine similarity between two sparse vectors.
///
/// Returns a value in [0, 1] for term-frequency vectors (all weights are
/// non-negative). Returns 0.0 if either vector is empty.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Iterate the smaller map for the dot product.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| *x as f64 * *y as f64))
        .sum();

    let norm_a: f64 = a.values().map(|x| (*x as f64) * (*x as f64)).sum();
    let norm_b: f64 = b.values().map(|x| (*x as f64) * (*x as f64)).sum();

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}
