//! Query analysis results
//!
//! The typed output of the NLP stage: intent, category, entities, and the
//! resolved search location. Model JSON is parsed into these shapes with
//! validation; unknown fields are treated as absent.

use serde::{Deserialize, Serialize};

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    #[default]
    Search,
    Book,
    Compare,
    Review,
    Directions,
    Unknown,
}

impl QueryIntent {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "search" => QueryIntent::Search,
            "book" => QueryIntent::Book,
            "compare" => QueryIntent::Compare,
            "review" => QueryIntent::Review,
            "directions" => QueryIntent::Directions,
            _ => QueryIntent::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Search => "search",
            QueryIntent::Book => "book",
            QueryIntent::Compare => "compare",
            QueryIntent::Review => "review",
            QueryIntent::Directions => "directions",
            QueryIntent::Unknown => "unknown",
        }
    }
}

/// Entities pulled out of the query, normalized and deduplicated preserving
/// first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub business_names: Vec<String>,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub prices: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    /// Aggregate extraction confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
            && self.business_names.is_empty()
            && self.times.is_empty()
            && self.prices.is_empty()
            && self.features.is_empty()
    }
}

/// Per-entity-list confidence used when merging analyzer output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityConfidence(pub f64);

/// Where the resolved location came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// A location entity in the query text
    Explicit,
    /// The stored user profile
    Profile,
    /// Device geolocation supplied with the request
    Geolocation,
    /// Approximated from the request IP
    Ip,
}

/// Search center resolved for the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in meters
    pub radius_m: u32,
    pub source: LocationSource,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Profile locations older than 30 days are marked stale but still used
    #[serde(default)]
    pub stale: bool,
}

/// Full analysis of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// The query after sanitization and normalization
    pub normalized_query: String,
    pub intent: QueryIntent,
    pub intent_confidence: f64,
    /// Canonical taxonomy id of the detected primary category
    pub category: String,
    pub category_confidence: f64,
    /// Up to three alternative category ids
    #[serde(default)]
    pub category_alternatives: Vec<String>,
    pub entities: ExtractedEntities,
    pub location: Option<ResolvedLocation>,
    /// 0.3 * intent + 0.4 * category + 0.3 * entities
    pub confidence: f64,
}

impl QueryAnalysis {
    /// A degraded analysis used when the model path is unavailable.
    pub fn fallback(normalized_query: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            normalized_query: normalized_query.into(),
            intent: QueryIntent::Search,
            intent_confidence: 0.5,
            category: category.into(),
            category_confidence: 0.0,
            category_alternatives: Vec::new(),
            entities: ExtractedEntities::default(),
            location: None,
            confidence: 0.15,
        }
    }

    /// The classifier output is authoritative for downstream category
    /// decisions when its confidence clears this bar.
    pub fn category_is_authoritative(&self) -> bool {
        self.category_confidence >= 0.7
    }

    /// Recompute the aggregate confidence from the sub-task confidences.
    pub fn aggregate_confidence(intent: f64, category: f64, entities: f64) -> f64 {
        0.3 * intent + 0.4 * category + 0.3 * entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_parse() {
        assert_eq!(QueryIntent::parse("search"), QueryIntent::Search);
        assert_eq!(QueryIntent::parse(" BOOK "), QueryIntent::Book);
        assert_eq!(QueryIntent::parse("navigate"), QueryIntent::Unknown);
    }

    #[test]
    fn test_aggregate_confidence() {
        let c = QueryAnalysis::aggregate_confidence(1.0, 1.0, 1.0);
        assert!((c - 1.0).abs() < 1e-9);
        let c = QueryAnalysis::aggregate_confidence(0.0, 1.0, 0.0);
        assert!((c - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_authoritative_threshold() {
        let mut analysis = QueryAnalysis::fallback("coffee", "cafe");
        assert!(!analysis.category_is_authoritative());
        analysis.category_confidence = 0.7;
        assert!(analysis.category_is_authoritative());
    }
}
