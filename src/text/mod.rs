//! Text normalization and tokenization for OCR output and queries.
//!
//! Chinese-aware segmentation via jieba, with English words preserved.
//! Tokens shorter than 2 characters are treated as recognition noise,
//! not search terms.

pub mod variants;

use jieba_rs::Jieba;
use once_cell::sync::Lazy;

pub use variants::{to_simplified, to_traditional};

static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Collapse whitespace runs to single spaces and strip everything that is
/// neither alphanumeric (including CJK ideographs) nor whitespace.
///
/// Idempotent: `clean(clean(t)) == clean(t)`.
pub fn clean(text: &str) -> String {
    let stripped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else {
                // Punctuation and symbols become separators so glued
                // fragments do not fuse into one token.
                ' '
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Segment text into search tokens, dropping tokens shorter than 2 chars.
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    JIEBA
        .cut(text, true)
        .into_iter()
        .map(|w| w.trim())
        .filter(|w| w.chars().count() >= 2)
        .map(|w| w.to_string())
        .collect()
}

/// Append the simplified and traditional form of each token when it
/// differs from the original and is not already present. Original token
/// order is preserved; variants are appended after the originals.
pub fn expand_variants(tokens: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = tokens.to_vec();

    for token in tokens {
        for variant in [to_simplified(token), to_traditional(token)] {
            if variant != *token && !expanded.contains(&variant) {
                expanded.push(variant);
            }
        }
    }

    expanded
}
