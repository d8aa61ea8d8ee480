//! Keyword retriever
//!
//! Two passes over the business store: a contains-scan over name,
//! description, and category for the kept query words, and a category pass
//! driven by taxonomy extraction. Candidates are merged by id (name-pass
//! wins ties) and scored with the text-match ladder plus the category
//! relevance combination.

use std::collections::HashMap;
use std::time::Duration;

use localfind_core::{Business, BusinessStatus, BusinessStore, Result, ScanField};
use localfind_normalize::{normalize_business_name, taxonomy};
use localfind_resilience::retry_with_backoff;

/// How a candidate's category related to the query's extracted categories.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryMatch {
    /// Business category is exactly one of the query categories
    Exact(String),
    /// A query category is the parent of the business category
    Parent(String),
    /// Both resolve into the taxonomy but are unrelated
    Related(String),
    None,
}

impl CategoryMatch {
    /// The category-relevance value attached to each match class.
    pub fn relevance(&self) -> f64 {
        match self {
            CategoryMatch::Exact(_) => 0.7,
            CategoryMatch::Parent(_) => 0.4,
            CategoryMatch::Related(_) => 0.3,
            CategoryMatch::None => 0.0,
        }
    }

    /// The business-side root category this match was made against.
    pub fn matched_root(&self) -> Option<&str> {
        match self {
            CategoryMatch::Exact(root)
            | CategoryMatch::Parent(root)
            | CategoryMatch::Related(root) => Some(root),
            CategoryMatch::None => None,
        }
    }
}

/// One scored keyword candidate. The text score and category match are kept
/// separate so the hybrid merger can recompute relevance under the
/// classifier authority override.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub business: Business,
    /// 0.6 * name_match + 0.2 * description_match + keyword bonus
    pub text_score: f64,
    pub category_match: CategoryMatch,
    /// Combined relevance in [0, 1]
    pub relevance: f64,
}

/// Combine the text score with a category-relevance value per the scoring
/// ladder. Clamped to 1.0.
pub fn combine_relevance(text_score: f64, category_relevance: f64) -> f64 {
    let combined = if category_relevance >= 0.7 {
        category_relevance + 0.2 * text_score
    } else if category_relevance >= 0.4 {
        text_score.max(0.7 * category_relevance + 0.3 * text_score)
    } else {
        text_score.max(category_relevance)
    };
    combined.min(1.0)
}

const STOP_PREPOSITIONS: &[&str] = &["in", "near", "at", "around"];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "for", "me", "my", "to", "of", "and", "or", "best", "top", "good", "find",
    "show", "get", "want", "need", "looking", "some", "any", "place", "places", "where", "what",
    "with",
];

/// Split a query into the words used for matching: stop-prepositions are
/// stripped, then words shorter than three characters or in the stop-word
/// set are dropped unless they appear inside a recognized multi-word phrase.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let phrase_words = phrase_protected_words(&lowered);

    lowered
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .filter(|w| !STOP_PREPOSITIONS.contains(&w.as_str()))
        .filter(|w| {
            phrase_words.contains(w.as_str())
                || (w.len() >= 3 && !STOP_WORDS.contains(&w.as_str()))
        })
        .collect()
}

/// Words protected from stop-word dropping because a recognized multi-word
/// phrase in the query contains them ("work out" keeps "out").
fn phrase_protected_words(lowered_query: &str) -> std::collections::HashSet<&'static str> {
    static PHRASES: &[(&str, &[&str])] = &[
        ("work out", &["work", "out"]),
        ("eat out", &["eat", "out"]),
        ("hang out", &["hang", "out"]),
        ("take away", &["take", "away"]),
        ("dine in", &["dine"]),
    ];
    let mut protected = std::collections::HashSet::new();
    for (phrase, words) in PHRASES {
        if lowered_query.contains(phrase) {
            for w in *words {
                protected.insert(*w);
            }
        }
    }
    protected
}

/// Text-match ladder over one field.
pub fn match_text(field: &str, query: &str) -> f64 {
    let field = field.trim().to_lowercase();
    let query = query.trim().to_lowercase();
    if field.is_empty() || query.is_empty() {
        return 0.0;
    }

    if field == query {
        return 1.0;
    }
    if field.starts_with(&query) {
        return 0.9;
    }
    if query.starts_with(&field) {
        return 0.8;
    }

    let query_words: Vec<&str> = query.split_whitespace().collect();
    if !query_words.is_empty() && query_words.iter().all(|w| contains_word(&field, w)) {
        return 0.7;
    }
    if !query_words.is_empty() && query_words.iter().all(|w| field.contains(w)) {
        return 0.5;
    }
    if field.contains(&query) {
        return 0.3;
    }
    if query_words.iter().any(|w| field.contains(w)) {
        return 0.2;
    }
    0.0
}

/// Whole-word containment.
fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|w| w == word)
}

/// Per-keyword boost for query words found in the name or description,
/// capped at 0.25.
pub fn keyword_boost(keywords: &[String], name: &str, description: &str) -> f64 {
    let name = name.to_lowercase();
    let description = description.to_lowercase();
    let mut boost: f64 = 0.0;

    for keyword in keywords.iter().filter(|k| k.len() >= 3) {
        if contains_word(&name, keyword) {
            boost += 0.15;
        } else if name.contains(keyword.as_str()) {
            boost += 0.10;
        } else if description.contains(keyword.as_str()) {
            boost += 0.05;
        }
    }

    boost.min(0.25)
}

/// Classify a business's category against the query's extracted categories.
/// Exact means the stored id itself matched; a subcategory under a query
/// category is a parent match; any other pair that both resolve into the
/// taxonomy is related.
pub fn category_match_for(business: &Business, query_categories: &[String]) -> CategoryMatch {
    let tax = taxonomy();
    let Some(business_root) = tax.normalize_category(&business.category) else {
        return CategoryMatch::None;
    };
    let stored_is_id = tax.contains(&business.category);

    for query_cat in query_categories {
        // Denormalized stores hold raw words; folding those to a root that
        // equals the query category still counts as exact
        if business.category == *query_cat || (!stored_is_id && business_root == *query_cat) {
            return CategoryMatch::Exact(business_root);
        }
    }
    for query_cat in query_categories {
        if stored_is_id && tax.is_within(&business.category, query_cat) {
            return CategoryMatch::Parent(business_root);
        }
    }
    if !query_categories.is_empty() {
        return CategoryMatch::Related(business_root);
    }
    CategoryMatch::None
}

/// Category relevance under the classifier authority override: only an
/// exact match to the authoritative category (or its parent) contributes;
/// the reserved general root drops every category contribution.
pub fn authoritative_category_relevance(business: &Business, authoritative: &str) -> f64 {
    use localfind_normalize::GENERAL_CATEGORY;

    if authoritative == GENERAL_CATEGORY {
        return 0.0;
    }
    let tax = taxonomy();
    if business.category == authoritative {
        return 0.7;
    }
    if let Some(parent) = tax.get(authoritative).and_then(|c| c.parent.as_deref()) {
        if business.category == parent {
            return 0.7;
        }
    }
    // Denormalized stored category that folds exactly onto the
    // authoritative root
    if !tax.contains(&business.category)
        && tax.normalize_category(&business.category).as_deref() == Some(authoritative)
    {
        return 0.7;
    }
    0.0
}

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct KeywordRetrieverConfig {
    /// Per-pass fetch budget handed to the store
    pub scan_limit: usize,
    pub store_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for KeywordRetrieverConfig {
    fn default() -> Self {
        Self {
            scan_limit: 200,
            store_retries: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// The keyword retriever.
pub struct KeywordRetriever<S: BusinessStore> {
    store: S,
    config: KeywordRetrieverConfig,
}

impl<S: BusinessStore> KeywordRetriever<S> {
    pub fn new(store: S, config: KeywordRetrieverConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Category ids the taxonomy extracts from a query. Exposed for the
    /// orchestrator's heuristic fallback.
    pub fn category_terms(&self, query: &str) -> Vec<String> {
        taxonomy().extract_categories(query)
    }

    /// Run both passes and score the merged candidates.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        let keywords = tokenize_query(query);
        let query_categories = self.category_terms(query);

        // Name/description/category term pass
        let name_pass = if keywords.is_empty() {
            Vec::new()
        } else {
            let fields = [ScanField::Name, ScanField::Description, ScanField::Category];
            let keywords_ref = &keywords;
            retry_with_backoff(
                || async {
                    self.store
                        .scan_with_contains(
                            &fields,
                            keywords_ref,
                            &[BusinessStatus::Active],
                            self.config.scan_limit,
                        )
                        .await
                },
                self.config.store_retries,
                self.config.retry_backoff,
            )
            .await?
        };

        // Category pass
        let mut category_pass: Vec<Business> = Vec::new();
        for category in &query_categories {
            let batch = retry_with_backoff(
                || async {
                    self.store
                        .query_by_category_and_city(category, "", self.config.scan_limit)
                        .await
                },
                self.config.store_retries,
                self.config.retry_backoff,
            )
            .await?;
            category_pass.extend(batch);
        }

        // Merge deduplicated by id; name-pass candidates win ties
        let mut merged: HashMap<String, Business> = HashMap::new();
        for business in category_pass {
            merged.entry(business.id.clone()).or_insert(business);
        }
        for business in name_pass {
            merged.insert(business.id.clone(), business);
        }

        let normalized_query = normalize_business_name(query).unwrap_or_else(|| query.to_lowercase());

        let mut hits: Vec<KeywordHit> = merged
            .into_values()
            .filter(|b| b.status == BusinessStatus::Active)
            .map(|business| {
                let name = if business.normalized_name.is_empty() {
                    business.name.to_lowercase()
                } else {
                    business.normalized_name.clone()
                };
                let name_match = match_text(&name, &normalized_query);
                let description_match = match_text(&business.description, &normalized_query);
                let bonus = keyword_boost(&keywords, &name, &business.description);
                let text_score = 0.6 * name_match + 0.2 * description_match + bonus;

                let category_match = category_match_for(&business, &query_categories);
                let relevance = combine_relevance(text_score, category_match.relevance());

                KeywordHit {
                    business,
                    text_score,
                    category_match,
                    relevance,
                }
            })
            .filter(|hit| hit.relevance > 0.0)
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.business.id.cmp(&b.business.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use localfind_core::{BusinessStatus, Coordinates, StructuredLocation};

    fn business(id: &str, name: &str, category: &str, description: &str) -> Business {
        Business {
            id: id.to_string(),
            name: name.to_string(),
            normalized_name: name.to_lowercase(),
            description: description.to_string(),
            category: category.to_string(),
            subcategory: None,
            tags: vec![],
            location: StructuredLocation {
                city: Some("Mumbai".to_string()),
                coordinates: Some(Coordinates::new(19.07, 72.88)),
                ..Default::default()
            },
            phone: None,
            email: None,
            website: None,
            rating: 4.0,
            review_count: 10,
            price_range: None,
            amenities: vec![],
            hours: None,
            status: BusinessStatus::Active,
            verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            embedding_version: None,
        }
    }

    struct FakeStore {
        businesses: Vec<Business>,
    }

    #[async_trait]
    impl BusinessStore for FakeStore {
        async fn get_business(&self, id: &str) -> Result<Option<Business>> {
            Ok(self.businesses.iter().find(|b| b.id == id).cloned())
        }

        async fn query_by_category_and_city(
            &self,
            category_id: &str,
            city: &str,
            limit: usize,
        ) -> Result<Vec<Business>> {
            Ok(self
                .businesses
                .iter()
                .filter(|b| {
                    taxonomy()
                        .normalize_category(&b.category)
                        .is_some_and(|root| root == category_id || b.category == category_id)
                })
                .filter(|b| city.is_empty() || b.city() == Some(city))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn query_by_city(&self, city: &str, limit: usize) -> Result<Vec<Business>> {
            Ok(self
                .businesses
                .iter()
                .filter(|b| b.city() == Some(city))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn scan_with_contains(
            &self,
            fields: &[ScanField],
            terms: &[String],
            status_filter: &[BusinessStatus],
            limit: usize,
        ) -> Result<Vec<Business>> {
            Ok(self
                .businesses
                .iter()
                .filter(|b| status_filter.contains(&b.status))
                .filter(|b| {
                    terms.iter().any(|t| {
                        fields.iter().any(|f| match f {
                            ScanField::Name => b.normalized_name.contains(t),
                            ScanField::Description => b.description.to_lowercase().contains(t),
                            ScanField::Category => b.category.contains(t),
                        })
                    })
                })
                .take(limit)
                .cloned()
                .collect())
        }

        async fn list_vector_business_ids(&self, _version: &str) -> Result<Vec<String>> {
            Ok(self.businesses.iter().map(|b| b.id.clone()).collect())
        }
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_prepositions() {
        assert_eq!(
            tokenize_query("coffee shops near me"),
            vec!["coffee".to_string(), "shops".to_string()]
        );
        assert_eq!(
            tokenize_query("best restaurants in Mumbai"),
            vec!["restaurants".to_string(), "mumbai".to_string()]
        );
    }

    #[test]
    fn test_tokenize_keeps_phrase_words() {
        let tokens = tokenize_query("where to work out");
        assert!(tokens.contains(&"work".to_string()));
        assert!(tokens.contains(&"out".to_string()));
    }

    #[test]
    fn test_match_text_ladder() {
        assert_eq!(match_text("starbucks", "starbucks"), 1.0);
        assert_eq!(match_text("starbucks coffee", "starbucks"), 0.9);
        assert_eq!(match_text("starbucks", "starbucks powai"), 0.8);
        assert_eq!(match_text("blue tokai coffee roasters", "blue coffee"), 0.7);
        assert_eq!(match_text("bluetokai coffeeroasters", "blue coffee"), 0.5);
        assert_eq!(match_text("chai point", "chai latte"), 0.2);
        assert_eq!(match_text("salad days", "burger"), 0.0);
    }

    #[test]
    fn test_keyword_boost_caps() {
        let keywords = vec![
            "coffee".to_string(),
            "roasters".to_string(),
            "beans".to_string(),
        ];
        let boost = keyword_boost(&keywords, "coffee roasters and beans", "");
        assert_eq!(boost, 0.25);
    }

    #[test]
    fn test_keyword_boost_short_words_ignored() {
        let keywords = vec!["go".to_string()];
        assert_eq!(keyword_boost(&keywords, "go goa gone", ""), 0.0);
    }

    #[test]
    fn test_combine_relevance_ladder() {
        // Strong category match dominates
        assert!((combine_relevance(0.5, 0.7) - 0.8).abs() < 1e-9);
        // Parent match blends
        let blended = combine_relevance(0.2, 0.4);
        assert!((blended - (0.7 * 0.4 + 0.3 * 0.2)).abs() < 1e-9);
        // Weak match is a floor
        assert_eq!(combine_relevance(0.1, 0.3), 0.3);
        assert_eq!(combine_relevance(0.6, 0.3), 0.6);
        // Clamped
        assert_eq!(combine_relevance(1.0, 0.9), 1.0);
    }

    #[tokio::test]
    async fn test_retrieve_name_match_ranks_first() {
        let store = FakeStore {
            businesses: vec![
                business("1", "Starbucks Coffee", "cafe", "coffee chain"),
                business("2", "Tea Villa", "cafe", "tea and snacks"),
                business("3", "Gold Gym", "fitness", "weights and cardio"),
            ],
        };
        let retriever = KeywordRetriever::new(store, KeywordRetrieverConfig::default());
        let hits = retriever.retrieve("starbucks", 10).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].business.id, "1");
    }

    #[tokio::test]
    async fn test_retrieve_category_pass_finds_synonym_matches() {
        let store = FakeStore {
            businesses: vec![
                business("1", "Iron Paradise", "fitness", "strength training"),
                business("2", "Asana Studio", "yoga_studio", "yoga classes"),
                business("3", "Cake Walk", "bakery", "cakes"),
            ],
        };
        let retriever = KeywordRetriever::new(store, KeywordRetrieverConfig::default());
        let hits = retriever.retrieve("where to work out", 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.business.id.as_str()).collect();
        assert!(ids.contains(&"1"), "gym missing from {ids:?}");
        assert!(ids.contains(&"2"), "yoga studio missing from {ids:?}");
        assert!(!ids.contains(&"3"));
    }

    #[tokio::test]
    async fn test_inactive_businesses_dropped() {
        let mut inactive = business("1", "Closed Cafe", "cafe", "was a cafe");
        inactive.status = BusinessStatus::Suspended;
        let store = FakeStore {
            businesses: vec![inactive, business("2", "Open Cafe", "cafe", "still a cafe")],
        };
        let retriever = KeywordRetriever::new(store, KeywordRetrieverConfig::default());
        let hits = retriever.retrieve("cafe", 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.business.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn test_limit_respected_and_sorted() {
        let store = FakeStore {
            businesses: (0..30)
                .map(|i| business(&format!("b{i:02}"), &format!("Cafe {i}"), "cafe", ""))
                .collect(),
        };
        let retriever = KeywordRetriever::new(store, KeywordRetrieverConfig::default());
        let hits = retriever.retrieve("cafe", 5).await.unwrap();
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].relevance >= pair[1].relevance);
        }
    }
}
