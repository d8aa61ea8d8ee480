//! Semantic retriever
//!
//! Pre-filters a candidate set by category or region, fetches stored
//! vectors for the active embedding version in parallel micro-batches,
//! scores by cosine similarity, and applies the radius filter. Candidate
//! ids and similarity results are cached; per-id fetch failures are logged
//! and tolerated, never fatal for the whole call.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use localfind_cache::{candidates_key, similarity_key, QueryCache};
use localfind_config::constants::{retrieval, ttl};
use localfind_core::geo::haversine_m;
use localfind_core::{Business, BusinessStore, Result, VectorIndex};

use crate::embedder::is_zero_vector;
use crate::similarity::cosine_similarity;

/// Geographic constraint on the candidate set. The radius cut only
/// applies when `radius_km` is set; city-scoped searches pass the city for
/// candidate selection and leave the radius unset.
#[derive(Debug, Clone)]
pub struct GeoFilter {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
    /// Known city name, used for the store's city index when present
    pub city: Option<String>,
}

/// One scored semantic candidate. Similarity is the raw cosine in [-1, 1];
/// the hybrid merger shifts it.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub business: Business,
    pub similarity: f32,
}

/// Cached similarity entry.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSimilarity {
    id: String,
    similarity: f32,
}

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct SemanticRetrieverConfig {
    /// Embedding version tag of the stored vectors
    pub version: String,
    /// Deploy-time vector dimension
    pub dimension: usize,
    /// Hard cap on candidates per request
    pub candidate_cap: usize,
    /// Vector fetches per micro-batch
    pub fetch_batch: usize,
    /// Embedding components hashed into the similarity cache key
    pub fingerprint_components: usize,
}

impl Default for SemanticRetrieverConfig {
    fn default() -> Self {
        Self {
            version: "v2".to_string(),
            dimension: 1024,
            candidate_cap: retrieval::CANDIDATE_CAP,
            fetch_batch: retrieval::VECTOR_FETCH_BATCH,
            fingerprint_components: retrieval::FINGERPRINT_COMPONENTS,
        }
    }
}

/// The semantic retriever.
pub struct SemanticRetriever<S: BusinessStore, V: VectorIndex> {
    store: Arc<S>,
    vectors: Arc<V>,
    cache: Arc<QueryCache>,
    config: SemanticRetrieverConfig,
}

impl<S: BusinessStore, V: VectorIndex> SemanticRetriever<S, V> {
    pub fn new(
        store: Arc<S>,
        vectors: Arc<V>,
        cache: Arc<QueryCache>,
        config: SemanticRetrieverConfig,
    ) -> Self {
        Self {
            store,
            vectors,
            cache,
            config,
        }
    }

    /// Retrieve the top `limit` candidates by cosine similarity. A zero
    /// query vector short-circuits to an empty contribution.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        category: Option<&str>,
        location: Option<&GeoFilter>,
        limit: usize,
    ) -> Result<Vec<SemanticHit>> {
        if is_zero_vector(query_vector) {
            tracing::debug!("zero query vector, skipping semantic retrieval");
            return Ok(Vec::new());
        }
        if query_vector.len() != self.config.dimension {
            return Err(localfind_core::Error::EmbeddingDimensionMismatch {
                expected: self.config.dimension,
                actual: query_vector.len(),
            });
        }

        let filter_part = format!(
            "cat={};loc={};rad={};limit={limit}",
            category.unwrap_or(""),
            location
                .map(|l| format!("{:.2},{:.2}", l.lat, l.lng))
                .unwrap_or_default(),
            location
                .and_then(|l| l.radius_km)
                .map(|km| format!("{km:.0}"))
                .unwrap_or_default(),
        );
        let result_key = similarity_key(
            query_vector,
            self.config.fingerprint_components,
            &filter_part,
        );

        if let Some(cached) = self
            .cache
            .get_json::<Vec<CachedSimilarity>>(&result_key)
            .await
        {
            let hits = self.rehydrate(cached, location).await;
            if !hits.is_empty() {
                return Ok(hits);
            }
        }

        let candidate_ids = self.candidate_ids(category, location).await?;

        let mut scored: Vec<SemanticHit> = Vec::new();
        for batch in candidate_ids.chunks(self.config.fetch_batch) {
            let fetches = batch.iter().map(|id| self.fetch_candidate(id, location));
            for hit in join_all(fetches).await.into_iter().flatten() {
                if let Some(similarity) = cosine_similarity(query_vector, &hit.1) {
                    scored.push(SemanticHit {
                        business: hit.0,
                        similarity,
                    });
                }
            }
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.business.id.cmp(&b.business.id))
        });
        scored.truncate(limit);

        let cached: Vec<CachedSimilarity> = scored
            .iter()
            .map(|hit| CachedSimilarity {
                id: hit.business.id.clone(),
                similarity: hit.similarity,
            })
            .collect();
        self.cache
            .set_json(
                &result_key,
                &cached,
                Duration::from_secs(ttl::SIMILARITY_SECS),
            )
            .await;

        Ok(scored)
    }

    /// Candidate selection with the 10-minute id-set cache. Category index
    /// first, then city, then the full vector-bearing population.
    async fn candidate_ids(
        &self,
        category: Option<&str>,
        location: Option<&GeoFilter>,
    ) -> Result<Vec<String>> {
        let key = candidates_key(
            category,
            location.map(|l| (l.lat, l.lng)),
            location.and_then(|l| l.radius_km),
        );
        if let Some(cached) = self.cache.get_json::<Vec<String>>(&key).await {
            return Ok(cached);
        }

        let cap = self.config.candidate_cap;
        let mut ids: Vec<String> = if let Some(category) = category {
            let city = location.and_then(|l| l.city.as_deref()).unwrap_or("");
            self.store
                .query_by_category_and_city(category, city, cap)
                .await?
                .into_iter()
                .map(|b| b.id)
                .collect()
        } else if let Some(location) = location {
            match location.city.as_deref() {
                Some(city) => self
                    .store
                    .query_by_city(city, cap)
                    .await?
                    .into_iter()
                    .map(|b| b.id)
                    .collect(),
                None => self.store.list_vector_business_ids(&self.config.version).await?,
            }
        } else {
            self.store.list_vector_business_ids(&self.config.version).await?
        };

        ids.truncate(cap);
        self.cache
            .set_json(&key, &ids, Duration::from_secs(ttl::CANDIDATES_SECS))
            .await;
        Ok(ids)
    }

    /// Fetch one candidate's record and vector. Failures are logged and the
    /// candidate omitted; a location filter also drops records without
    /// usable coordinates.
    async fn fetch_candidate(
        &self,
        id: &str,
        location: Option<&GeoFilter>,
    ) -> Option<(Business, Vec<f32>)> {
        let business = match self.store.get_business(id).await {
            Ok(Some(business)) => business,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(id, "candidate record fetch failed: {e}");
                return None;
            }
        };

        if let Some(filter) = location {
            match business.coordinates() {
                Some(coords) => {
                    if let Some(radius_km) = filter.radius_km {
                        let distance =
                            haversine_m(filter.lat, filter.lng, coords.lat, coords.lng);
                        if distance > radius_km * 1000.0 {
                            return None;
                        }
                    }
                }
                None => return None,
            }
        }

        let vector = match self.vectors.get_vector(id, &self.config.version).await {
            Ok(Some(vector)) => vector,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(id, "vector fetch failed: {e}");
                return None;
            }
        };

        if vector.len() != self.config.dimension {
            tracing::warn!(
                id,
                expected = self.config.dimension,
                actual = vector.len(),
                "stored vector has wrong dimension, dropping candidate"
            );
            return None;
        }

        Some((business, vector))
    }

    /// Rebuild hits from a cached similarity set. Ids that no longer
    /// resolve are dropped; radius is re-applied against fresh records.
    async fn rehydrate(
        &self,
        cached: Vec<CachedSimilarity>,
        location: Option<&GeoFilter>,
    ) -> Vec<SemanticHit> {
        let fetches = cached.iter().map(|entry| async move {
            match self.store.get_business(&entry.id).await {
                Ok(Some(business)) => Some(SemanticHit {
                    business,
                    similarity: entry.similarity,
                }),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(id = %entry.id, "cached candidate refetch failed: {e}");
                    None
                }
            }
        });

        join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .filter(|hit| match location.and_then(|f| f.radius_km.map(|r| (f, r))) {
                Some((filter, radius_km)) => hit.business.coordinates().is_some_and(|coords| {
                    haversine_m(filter.lat, filter.lng, coords.lat, coords.lng)
                        <= radius_km * 1000.0
                }),
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use localfind_core::{
        BusinessStatus, Coordinates, Error, ScanField, StructuredLocation,
    };
    use std::collections::HashMap;

    const DIM: usize = 8;

    fn business(id: &str, city: &str, lat: f64, lng: f64) -> Business {
        Business {
            id: id.to_string(),
            name: format!("Biz {id}"),
            normalized_name: format!("biz {id}"),
            description: String::new(),
            category: "cafe".to_string(),
            subcategory: None,
            tags: vec![],
            location: StructuredLocation {
                city: Some(city.to_string()),
                coordinates: Some(Coordinates::new(lat, lng)),
                ..Default::default()
            },
            phone: None,
            email: None,
            website: None,
            rating: 4.0,
            review_count: 5,
            price_range: None,
            amenities: vec![],
            hours: None,
            status: BusinessStatus::Active,
            verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            embedding_version: Some("v2".to_string()),
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
                .filter(|b| b.category == category_id)
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
            _fields: &[ScanField],
            _terms: &[String],
            _status_filter: &[BusinessStatus],
            _limit: usize,
        ) -> Result<Vec<Business>> {
            Ok(Vec::new())
        }

        async fn list_vector_business_ids(&self, _version: &str) -> Result<Vec<String>> {
            Ok(self.businesses.iter().map(|b| b.id.clone()).collect())
        }
    }

    struct FakeVectors {
        vectors: HashMap<String, Vec<f32>>,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl VectorIndex for FakeVectors {
        async fn get_vector(&self, business_id: &str, _version: &str) -> Result<Option<Vec<f32>>> {
            if self.fail_ids.iter().any(|id| id == business_id) {
                return Err(Error::StoreUnavailable("vector table flaked".to_string()));
            }
            Ok(self.vectors.get(business_id).cloned())
        }
    }

    fn unit_vector(direction: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        v[direction % DIM] = 1.0;
        v
    }

    fn retriever(
        businesses: Vec<Business>,
        vectors: HashMap<String, Vec<f32>>,
        fail_ids: Vec<String>,
    ) -> SemanticRetriever<FakeStore, FakeVectors> {
        SemanticRetriever::new(
            Arc::new(FakeStore { businesses }),
            Arc::new(FakeVectors { vectors, fail_ids }),
            Arc::new(QueryCache::memory_unswept()),
            SemanticRetrieverConfig {
                dimension: DIM,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_scores_sorted_by_similarity() {
        let businesses = vec![
            business("a", "Mumbai", 19.07, 72.88),
            business("b", "Mumbai", 19.08, 72.87),
        ];
        let mut vectors = HashMap::new();
        vectors.insert("a".to_string(), unit_vector(0));
        vectors.insert("b".to_string(), unit_vector(1));
        let retriever = retriever(businesses, vectors, vec![]);

        let query = unit_vector(0);
        let hits = retriever.retrieve(&query, None, None, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].business.id, "a");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_zero_vector_short_circuits() {
        let retriever = retriever(vec![business("a", "Mumbai", 19.07, 72.88)], HashMap::new(), vec![]);
        let hits = retriever
            .retrieve(&vec![0.0; DIM], None, None, 10)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_query_dimension_is_error() {
        let retriever = retriever(vec![], HashMap::new(), vec![]);
        let result = retriever.retrieve(&vec![1.0; 4], None, None, 10).await;
        assert!(matches!(
            result,
            Err(Error::EmbeddingDimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_per_id_failures_tolerated() {
        let businesses = vec![
            business("a", "Mumbai", 19.07, 72.88),
            business("b", "Mumbai", 19.08, 72.87),
        ];
        let mut vectors = HashMap::new();
        vectors.insert("a".to_string(), unit_vector(0));
        vectors.insert("b".to_string(), unit_vector(0));
        let retriever = retriever(businesses, vectors, vec!["b".to_string()]);

        let hits = retriever
            .retrieve(&unit_vector(0), None, None, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].business.id, "a");
    }

    #[tokio::test]
    async fn test_mismatched_stored_vector_dropped() {
        let businesses = vec![business("a", "Mumbai", 19.07, 72.88)];
        let mut vectors = HashMap::new();
        vectors.insert("a".to_string(), vec![1.0; DIM + 2]);
        let retriever = retriever(businesses, vectors, vec![]);

        let hits = retriever
            .retrieve(&unit_vector(0), None, None, 10)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_radius_filter_drops_distant() {
        // Mumbai and Pune are ~120km apart
        let businesses = vec![
            business("near", "Mumbai", 19.08, 72.88),
            business("far", "Pune", 18.52, 73.86),
        ];
        let mut vectors = HashMap::new();
        vectors.insert("near".to_string(), unit_vector(0));
        vectors.insert("far".to_string(), unit_vector(0));
        let retriever = retriever(businesses, vectors, vec![]);

        let filter = GeoFilter {
            lat: 19.076,
            lng: 72.8777,
            radius_km: Some(10.0),
            city: None,
        };
        let hits = retriever
            .retrieve(&unit_vector(0), None, Some(&filter), 10)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.business.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
    }

    #[tokio::test]
    async fn test_category_narrows_candidates() {
        let mut gym = business("gym", "Mumbai", 19.07, 72.88);
        gym.category = "fitness".to_string();
        let businesses = vec![business("cafe1", "Mumbai", 19.07, 72.88), gym];
        let mut vectors = HashMap::new();
        vectors.insert("cafe1".to_string(), unit_vector(0));
        vectors.insert("gym".to_string(), unit_vector(0));
        let retriever = retriever(businesses, vectors, vec![]);

        let hits = retriever
            .retrieve(&unit_vector(0), Some("cafe"), None, 10)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.business.id.as_str()).collect();
        assert_eq!(ids, vec!["cafe1"]);
    }

    #[tokio::test]
    async fn test_similarity_cache_round_trip() {
        let businesses = vec![business("a", "Mumbai", 19.07, 72.88)];
        let mut vectors = HashMap::new();
        vectors.insert("a".to_string(), unit_vector(0));
        let cache = Arc::new(QueryCache::memory_unswept());
        let retriever = SemanticRetriever::new(
            Arc::new(FakeStore { businesses }),
            Arc::new(FakeVectors {
                vectors,
                fail_ids: vec![],
            }),
            Arc::clone(&cache),
            SemanticRetrieverConfig {
                dimension: DIM,
                ..Default::default()
            },
        );

        let first = retriever
            .retrieve(&unit_vector(0), None, None, 10)
            .await
            .unwrap();
        let second = retriever
            .retrieve(&unit_vector(0), None, None, 10)
            .await
            .unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].business.id, second[0].business.id);
    }
}
