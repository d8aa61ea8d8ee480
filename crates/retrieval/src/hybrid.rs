//! Hybrid score fusion
//!
//! Merges the semantic and keyword result lists into one scored list.
//! Semantic similarities are shifted from [-1, 1] to [0, 1]; each business
//! keeps the maximum of its scores over all occurrences; the combined score
//! is the weighted sum, clamped. When the classifier category is
//! authoritative its override recomputes the keyword category signal before
//! fusion.

use std::collections::HashMap;

use serde::Serialize;

use localfind_core::Business;

use crate::keyword::{authoritative_category_relevance, combine_relevance, KeywordHit};
use crate::semantic::SemanticHit;

/// Fusion weights. Defaults 0.7 semantic / 0.3 keyword.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

/// One fused result with its component scores attached for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct HybridItem {
    pub business: Business,
    /// Max cosine over semantic hits, shifted to [0, 1]
    pub semantic_score: f64,
    /// Max keyword relevance over keyword hits, [0, 1]
    pub keyword_score: f64,
    /// Weighted sum, clamped to [0, 1]
    pub combined_score: f64,
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Shift a cosine similarity from [-1, 1] onto [0, 1].
fn shift_similarity(similarity: f64) -> f64 {
    clamp01((similarity + 1.0) / 2.0)
}

/// Merge the two result lists. `authoritative_category` is the classifier
/// category when its confidence cleared the authority bar.
pub fn merge_hybrid(
    semantic: Vec<SemanticHit>,
    keyword: Vec<KeywordHit>,
    weights: FusionWeights,
    authoritative_category: Option<&str>,
) -> Vec<HybridItem> {
    struct Accum {
        business: Business,
        semantic: f64,
        keyword: f64,
    }

    let mut by_id: HashMap<String, Accum> = HashMap::new();

    for hit in semantic {
        let score = shift_similarity(hit.similarity as f64);
        by_id
            .entry(hit.business.id.clone())
            .and_modify(|acc| acc.semantic = acc.semantic.max(score))
            .or_insert(Accum {
                business: hit.business,
                semantic: score,
                keyword: 0.0,
            });
    }

    for hit in keyword {
        let relevance = match authoritative_category {
            Some(category) => {
                // Only exact hits on the authoritative category keep their
                // category contribution; everything else falls back to the
                // text score alone
                let category_relevance =
                    authoritative_category_relevance(&hit.business, category);
                clamp01(combine_relevance(hit.text_score, category_relevance))
            }
            None => clamp01(hit.relevance),
        };

        by_id
            .entry(hit.business.id.clone())
            .and_modify(|acc| acc.keyword = acc.keyword.max(relevance))
            .or_insert(Accum {
                business: hit.business,
                semantic: 0.0,
                keyword: relevance,
            });
    }

    // Fallback dedupe for stores with duplicate records under different
    // ids: (lowercased name, lowercased city) keeps the higher-scoring copy
    // and folds the maxes together
    let mut by_name_city: HashMap<(String, String), Accum> = HashMap::new();
    for (_, acc) in by_id {
        let name = acc.business.name.to_lowercase();
        let city = acc
            .business
            .city()
            .map(|c| c.to_lowercase())
            .unwrap_or_default();
        match by_name_city.entry((name, city)) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.semantic = existing.semantic.max(acc.semantic);
                existing.keyword = existing.keyword.max(acc.keyword);
                // Keep the lexicographically-first id for determinism
                if acc.business.id < existing.business.id {
                    existing.business = acc.business;
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(acc);
            }
        }
    }

    let mut items: Vec<HybridItem> = by_name_city
        .into_values()
        .map(|acc| {
            let combined =
                clamp01(weights.semantic * acc.semantic + weights.keyword * acc.keyword);
            HybridItem {
                business: acc.business,
                semantic_score: acc.semantic,
                keyword_score: acc.keyword,
                combined_score: combined,
            }
        })
        .collect();

    items.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.business.id.cmp(&b.business.id))
    });
    items
}
