//! Heuristic fallback analysis
//!
//! Used when the model path is down: intent defaults to search, the
//! category comes from a taxonomy keyword scan, and entities come from the
//! location/price tables. Confidence stays low so downstream stages never
//! treat the guess as authoritative.

use localfind_core::{ExtractedEntities, QueryAnalysis, QueryIntent};
use localfind_normalize::{
    is_known_city, normalize_location_name, normalize_price_range, taxonomy, GENERAL_CATEGORY,
};

/// Build a degraded analysis from lexical signals alone.
pub fn heuristic_analysis(normalized_query: &str) -> QueryAnalysis {
    let tax = taxonomy();
    let categories = tax.extract_categories(normalized_query);
    let category = categories
        .first()
        .cloned()
        .unwrap_or_else(|| GENERAL_CATEGORY.to_string());
    let category_confidence = if categories.is_empty() { 0.0 } else { 0.4 };

    let mut entities = ExtractedEntities::default();
    for word in normalized_query.split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric());
        if cleaned.is_empty() {
            continue;
        }
        if is_known_city(cleaned) {
            if let Some(city) = normalize_location_name(cleaned) {
                if !entities.locations.contains(&city) {
                    entities.locations.push(city);
                }
            }
        }
        if let Some(tier) = normalize_price_range(cleaned) {
            let token = tier.as_str().to_string();
            if !entities.prices.contains(&token) {
                entities.prices.push(token);
            }
        }
    }
    entities.confidence = if entities.is_empty() { 0.0 } else { 0.3 };

    let entity_confidence = entities.confidence;
    QueryAnalysis {
        normalized_query: normalized_query.to_string(),
        intent: QueryIntent::Search,
        intent_confidence: 0.5,
        category,
        category_confidence,
        category_alternatives: categories.into_iter().skip(1).take(3).collect(),
        entities,
        location: None,
        confidence: QueryAnalysis::aggregate_confidence(0.5, category_confidence, entity_confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_keywords() {
        let analysis = heuristic_analysis("coffee shops near me");
        assert_eq!(analysis.category, "cafe");
        assert_eq!(analysis.intent, QueryIntent::Search);
        assert!(analysis.category_confidence < 0.7);
    }

    #[test]
    fn test_city_and_price_entities() {
        let analysis = heuristic_analysis("cheap restaurants in bangalore");
        assert_eq!(analysis.category, "food");
        assert_eq!(analysis.entities.locations, vec!["Bangalore".to_string()]);
        assert_eq!(analysis.entities.prices, vec!["$".to_string()]);
    }

    #[test]
    fn test_no_hits_is_general() {
        let analysis = heuristic_analysis("zzqy wvut");
        assert_eq!(analysis.category, GENERAL_CATEGORY);
        assert_eq!(analysis.category_confidence, 0.0);
        assert!(analysis.entities.is_empty());
    }

    #[test]
    fn test_multi_word_phrase() {
        let analysis = heuristic_analysis("where to work out");
        assert_eq!(analysis.category, "fitness");
    }
}
