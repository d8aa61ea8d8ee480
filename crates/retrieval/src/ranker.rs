//! Multi-factor ranker
//!
//! Scores each surviving business from six normalized factors. Running the
//! ranker twice over an unchanged list yields an identical order: every
//! factor is a pure function of the item and the tie-breaks (rating
//! descending, then name ascending) close the remaining gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use localfind_config::constants::ranking;
use localfind_core::geo::haversine_m;
use localfind_core::Business;

use crate::hybrid::HybridItem;
use crate::keyword::keyword_boost;

/// One ranked result as surfaced to the caller. Deserializable because
/// end-to-end result pages live in the cache for five minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedBusiness {
    pub business: Business,
    /// Final rank score
    pub score: f64,
    /// Relevance factor after the keyword-in-name boost
    pub relevance: f64,
    pub semantic_score: f64,
    pub keyword_score: f64,
    /// Meters from the search origin, when a location is known
    pub distance_m: Option<f64>,
}

/// Rank the filtered items. `query_keywords` are the tokenized query words
/// used for the name boost; `origin` enables the distance factor and
/// populates `distance_m`.
pub fn rank(
    items: Vec<HybridItem>,
    query_keywords: &[String],
    origin: Option<(f64, f64)>,
    now: DateTime<Utc>,
) -> Vec<RankedBusiness> {
    let mut ranked: Vec<RankedBusiness> = items
        .into_iter()
        .map(|item| score_item(item, query_keywords, origin, now))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.business
                    .rating
                    .partial_cmp(&a.business.rating)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.business.name.cmp(&b.business.name))
    });
    ranked
}

fn score_item(
    item: HybridItem,
    query_keywords: &[String],
    origin: Option<(f64, f64)>,
    now: DateTime<Utc>,
) -> RankedBusiness {
    let business = item.business;

    let name = if business.normalized_name.is_empty() {
        business.name.to_lowercase()
    } else {
        business.normalized_name.clone()
    };
    let boost = keyword_boost(query_keywords, &name, &business.description)
        .min(ranking::NAME_BOOST_CAP);
    let relevance = (item.combined_score + boost).min(1.0);

    let distance_m = origin.and_then(|(lat, lng)| {
        business
            .coordinates()
            .map(|coords| haversine_m(lat, lng, coords.lat, coords.lng))
    });
    let distance_factor = distance_m
        .map(|d| (1.0 - d / ranking::DISTANCE_CEILING_M).max(0.0))
        .unwrap_or(0.0);

    let rating_factor = (business.rating / 5.0).clamp(0.0, 1.0);

    let reviews_factor = (((business.review_count as f64) + 1.0).log10() / 3.0).min(1.0);

    let verified_factor = if business.verified { 1.0 } else { 0.0 };

    let age_days = (now - business.updated_at).num_seconds() as f64 / 86_400.0;
    let recency_factor = (1.0 - age_days / ranking::RECENCY_WINDOW_DAYS).clamp(0.0, 1.0);

    let score = ranking::RELEVANCE_WEIGHT * relevance
        + ranking::DISTANCE_WEIGHT * distance_factor
        + ranking::RATING_WEIGHT * rating_factor
        + ranking::REVIEWS_WEIGHT * reviews_factor
        + ranking::VERIFIED_WEIGHT * verified_factor
        + ranking::RECENCY_WEIGHT * recency_factor;

    RankedBusiness {
        score,
        relevance,
        semantic_score: item.semantic_score,
        keyword_score: item.keyword_score,
        distance_m,
        business,
    }
}
