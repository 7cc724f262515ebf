//! Perceptual-similarity and multi-strategy text search.

use std::path::Path;
use std::str::FromStr;

use crate::error::Result;
use crate::hashing::{self, bit_length, hamming_distance};
use crate::store::{ImageRecord, IndexStore, TextHit};
use crate::text;

/// One similarity-search result, best matches first.
#[derive(Debug, Clone)]
pub struct SimilarMatch {
    pub file_path: String,
    pub external_ref: String,
    pub content_hash: Option<String>,
    pub updated_at: String,
    pub ocr_text: String,
    pub similarity: f64,
}

impl SimilarMatch {
    fn exact(record: ImageRecord) -> Self {
        Self::with_similarity(record, 1.0)
    }

    fn with_similarity(record: ImageRecord, similarity: f64) -> Self {
        Self {
            file_path: record.file_path,
            external_ref: record.external_ref,
            content_hash: record.content_hash,
            updated_at: record.updated_at,
            ocr_text: record.ocr_text,
            similarity,
        }
    }
}

/// Find stored images similar to the query image.
///
/// An identical `content_hash` short-circuits perceptual comparison and
/// returns that single record with similarity 1.0, regardless of
/// `threshold`. Otherwise all fingerprints are scanned and records
/// within `threshold` hamming bits are ranked by similarity.
pub fn find_similar(
    store: &IndexStore,
    query_path: &Path,
    threshold: u32,
    max_results: usize,
) -> Result<Vec<SimilarMatch>> {
    let query = hashing::extract_fingerprints(query_path)?;

    if let Some(exact) = store.find_by_content_hash(&query.content_hash)? {
        tracing::info!(path = %exact.file_path, "exact content match");
        return Ok(vec![SimilarMatch::exact(exact)]);
    }

    let bits = bit_length(&query.perceptual_hash).max(1);
    let mut matches: Vec<SimilarMatch> = store
        .scan_fingerprints()?
        .into_iter()
        .filter_map(|record| {
            let stored = record.perceptual_hash.as_deref()?;
            let distance = hamming_distance(&query.perceptual_hash, stored);
            if distance <= threshold {
                let similarity = 1.0 - f64::from(distance) / f64::from(bits);
                Some(SimilarMatch::with_similarity(record, similarity))
            } else {
                None
            }
        })
        .collect();

    // Stable sort keeps store scan order on ties.
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(max_results);
    Ok(matches)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Ranked lookup, falling back to substring when it finds nothing.
    #[default]
    Smart,
    /// Both strategies merged; recall over latency.
    Comprehensive,
    RankedOnly,
    SubstringOnly,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "smart" => Ok(SearchMode::Smart),
            "comprehensive" => Ok(SearchMode::Comprehensive),
            "ranked" => Ok(SearchMode::RankedOnly),
            "substring" => Ok(SearchMode::SubstringOnly),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// One keyword-lookup strategy over the index store.
trait TextSearchStrategy {
    fn search(&self, store: &IndexStore, variants: &[String], limit: usize) -> Result<Vec<TextHit>>;
}

/// Ranked-OR query over the full-text index. A query failure (as opposed
/// to zero hits) degrades silently to an empty result so callers can
/// fall back.
struct RankedStrategy;

impl TextSearchStrategy for RankedStrategy {
    fn search(&self, store: &IndexStore, variants: &[String], limit: usize) -> Result<Vec<TextHit>> {
        let match_expr = variants
            .iter()
            .map(|v| format!("\"{}\"", v.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        match store.ranked_search(&match_expr, limit) {
            Ok(hits) => Ok(hits),
            Err(e) => {
                tracing::debug!(error = %e, "ranked search failed, degrading to empty result");
                Ok(Vec::new())
            }
        }
    }
}

/// LIKE-substring lookup ordered by recency.
struct SubstringStrategy;

impl TextSearchStrategy for SubstringStrategy {
    fn search(&self, store: &IndexStore, variants: &[String], limit: usize) -> Result<Vec<TextHit>> {
        store.substring_search(variants, limit)
    }
}

/// Keyword search over OCR text.
///
/// Keywords are cleaned, tokenized and expanded with simplified and
/// traditional script variants, so either script finds records stored in
/// the other. When normalization leaves no tokens, the raw cleaned
/// string is matched as a substring instead.
pub fn search_by_text(
    store: &IndexStore,
    keywords: &str,
    max_results: usize,
    mode: SearchMode,
) -> Result<Vec<TextHit>> {
    let cleaned = text::clean(keywords);
    let tokens = text::tokenize(&cleaned);

    if tokens.is_empty() {
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(keywords, "no tokens after normalization, raw substring search");
        return SubstringStrategy.search(store, &[cleaned], max_results);
    }

    let variants = text::expand_variants(&tokens);

    match mode {
        SearchMode::RankedOnly => RankedStrategy.search(store, &variants, max_results),
        SearchMode::SubstringOnly => SubstringStrategy.search(store, &variants, max_results),
        SearchMode::Smart => {
            let hits = RankedStrategy.search(store, &variants, max_results)?;
            if hits.is_empty() {
                SubstringStrategy.search(store, &variants, max_results)
            } else {
                Ok(hits)
            }
        }
        SearchMode::Comprehensive => {
            let ranked = RankedStrategy.search(store, &variants, max_results)?;
            let substring = SubstringStrategy.search(store, &variants, max_results)?;

            let mut merged = ranked;
            for hit in substring {
                if !merged.iter().any(|h| h.file_path == hit.file_path) {
                    merged.push(hit);
                }
            }
            merged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            merged.truncate(max_results);
            Ok(merged)
        }
    }
}
