//! The query pipeline orchestrator
//!
//! Sequences the stages of one request - sanitize, cache probe, analyze,
//! location resolve, embed, retrieve, filter, rank, format - recording a
//! telemetry step per stage. Only `InvalidQuery` short-circuits; every
//! other failure degrades to the stage's declared fallback and is recorded
//! as a non-fatal error. Cache writes happen off the response path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use localfind_cache::{analysis_key, embedding_key, results_key, QueryCache};
use localfind_config::constants::ttl;
use localfind_core::{
    BusinessStore, ErrorKind, PipelineTelemetry, PriceTier, QueryAnalysis, Result, SearchFilters,
    StepTimer, VectorIndex,
};
use localfind_normalize::GENERAL_CATEGORY;
use localfind_nlp::{heuristic_analysis, CallContext, QueryAnalyzer};
use localfind_resilience::{with_fallback, FallbackLog};
use localfind_retrieval::{
    apply_filters, merge_hybrid, rank, tokenize_query, FilterContext, FilterPolicy, FusionWeights,
    GeoFilter, KeywordHit, KeywordRetriever, QueryEmbedder, RankedBusiness, SemanticHit,
    SemanticRetriever,
};

use crate::location::{LocationInputs, LocationResolver};
use crate::response::SearchResponse;
use crate::sanitize::{is_near_me_query, normalize_query, sanitize_query};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whole-request deadline
    pub request_timeout: Duration,
    /// Result page size
    pub page_size: usize,
    /// Candidate budget per retriever
    pub retrieval_limit: usize,
    /// Query length ceiling enforced during sanitization
    pub max_query_chars: usize,
    pub weights: FusionWeights,
    pub filter_policy: FilterPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            page_size: 20,
            retrieval_limit: 50,
            max_query_chars: 500,
            weights: FusionWeights::default(),
            filter_policy: FilterPolicy::default(),
        }
    }
}

/// Caller session context.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    /// Explicit filters; these win over analysis-derived values
    pub filters: Option<SearchFilters>,
    /// Device geolocation
    pub location: Option<(f64, f64)>,
}

/// Request transport context.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
}

/// Result page as it lives in the five-minute cache.
#[derive(Serialize, Deserialize)]
struct CachedResults {
    ranked: Vec<RankedBusiness>,
    total: usize,
}

/// The query processing pipeline. Owns its components by reference so
/// process-wide state (limiter, caches, memo maps) is constructed once and
/// injected; tests build a fresh pipeline per case.
pub struct SearchPipeline<S, V>
where
    S: BusinessStore + 'static,
    V: VectorIndex + 'static,
{
    analyzer: Arc<QueryAnalyzer>,
    embedder: Arc<QueryEmbedder>,
    keyword: KeywordRetriever<Arc<S>>,
    semantic: SemanticRetriever<S, V>,
    locations: LocationResolver,
    cache: Arc<QueryCache>,
    fallback_log: Arc<FallbackLog>,
    config: PipelineConfig,
}

impl<S, V> SearchPipeline<S, V>
where
    S: BusinessStore + 'static,
    V: VectorIndex + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyzer: Arc<QueryAnalyzer>,
        embedder: Arc<QueryEmbedder>,
        keyword: KeywordRetriever<Arc<S>>,
        semantic: SemanticRetriever<S, V>,
        locations: LocationResolver,
        cache: Arc<QueryCache>,
        fallback_log: Arc<FallbackLog>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            analyzer,
            embedder,
            keyword,
            semantic,
            locations,
            cache,
            fallback_log,
            config,
        }
    }

    /// Process one query end to end. Only `InvalidQuery` is returned as an
    /// error; every other failure is recorded in `performance.errors` and
    /// the response carries whatever the surviving stages produced.
    pub async fn process_query(
        &self,
        raw_query: &str,
        user_id: Option<&str>,
        session: Option<SearchSession>,
        request: Option<RequestMeta>,
    ) -> Result<SearchResponse> {
        let deadline = Instant::now() + self.config.request_timeout;
        let total_timer = StepTimer::start();
        let mut telemetry = PipelineTelemetry::new();

        let session = session.unwrap_or_default();
        let ip = request.and_then(|r| r.ip);

        // Validate & sanitize: the one stage allowed to fail the request
        let timer = StepTimer::start();
        let sanitized = sanitize_query(raw_query, self.config.max_query_chars)?;
        telemetry.record_step("sanitize", timer.started(), false);

        // Normalize the query string
        let timer = StepTimer::start();
        let normalized = normalize_query(&sanitized);
        telemetry.record_step("normalize", timer.started(), false);

        let explicit_filters = session.filters.clone().unwrap_or_default();
        let filters_part = explicit_filters.cache_key_part();

        // Full-result probe: return immediately when analysis, embedding,
        // and results are all cached for this query + filters
        let timer = StepTimer::start();
        if let Some(response) = self
            .probe_full_cache(&normalized, &filters_part, timer.started(), &mut telemetry)
            .await
        {
            return Ok(response);
        }

        let ctx = CallContext {
            user_id: user_id.map(|u| u.to_string()),
            ip: ip.clone(),
        };

        // Analyze, under the request deadline
        let timer = StepTimer::start();
        let mut analysis = match remaining(deadline) {
            Some(budget) => {
                match tokio::time::timeout(budget, self.analyzer.analyze_query(&normalized, &ctx))
                    .await
                {
                    Ok(outcome) => {
                        telemetry.model_calls += outcome.model_calls;
                        let degraded = !outcome.errors.is_empty();
                        for error in outcome.errors {
                            telemetry.record_error(
                                ErrorKind::ModelUnavailable,
                                format!("analysis: {error}"),
                            );
                        }
                        telemetry.record_step("analyze", timer.started(), false);
                        let mut analysis = outcome.analysis;
                        if degraded {
                            backfill_from_heuristics(&mut analysis, &normalized);
                        }
                        analysis
                    }
                    Err(_) => {
                        telemetry.record_step_error(
                            "analyze",
                            timer.started(),
                            ErrorKind::Timeout,
                            "analysis exceeded the request deadline",
                        );
                        heuristic_analysis(&normalized)
                    }
                }
            }
            None => {
                telemetry.record_error(ErrorKind::Timeout, "request deadline exceeded");
                heuristic_analysis(&normalized)
            }
        };

        // Normalize entities into the filter record; explicit caller
        // filters win over derived ones
        let timer = StepTimer::start();
        let derived = derive_filters(&analysis);
        let filters = explicit_filters.merged_with_derived(derived);
        telemetry.record_step("normalize_entities", timer.started(), false);

        // Resolve the search location
        let timer = StepTimer::start();
        let near_me = is_near_me_query(&normalized) && analysis.entities.locations.is_empty();
        let resolved = self
            .locations
            .resolve(&LocationInputs {
                entity_locations: &analysis.entities.locations,
                session_location: session.location,
                user_id,
                ip: ip.as_deref(),
            })
            .await;
        telemetry.record_step("resolve_location", timer.started(), false);
        analysis.location = resolved.clone();

        let location_missing = near_me && resolved.is_none();
        if location_missing {
            telemetry.record_error(
                ErrorKind::Internal,
                "location: a near-me query needs a resolvable location",
            );
        }

        // Embed, falling back to the zero vector
        let timer = StepTimer::start();
        let vector = match remaining(deadline) {
            Some(_) if !location_missing => {
                let ((vector, from_cache), error) = with_fallback(
                    "embed_query",
                    || async {
                        self.embedder
                            .embed_query(&normalized, user_id, ip.as_deref())
                            .await
                    },
                    (self.embedder.zero_vector(), false),
                    Some(&self.fallback_log),
                )
                .await;
                match error {
                    None => {
                        if !from_cache {
                            telemetry.record_model_call();
                        }
                        telemetry.record_step("embed", timer.started(), from_cache);
                    }
                    Some(error) => {
                        telemetry.record_step_error(
                            "embed",
                            timer.started(),
                            error.kind(),
                            error.to_string(),
                        );
                    }
                }
                vector
            }
            Some(_) => self.embedder.zero_vector(),
            None => {
                telemetry.record_error(ErrorKind::Timeout, "request deadline exceeded");
                self.embedder.zero_vector()
            }
        };

        // Retrieve, filter, rank
        let ranked = if location_missing {
            Vec::new()
        } else {
            self.retrieve_and_rank(
                &normalized,
                &analysis,
                &filters,
                resolved.as_ref(),
                near_me,
                &vector,
                deadline,
                &mut telemetry,
            )
            .await
        };

        // Write caches off the response path
        self.spawn_cache_writes(&normalized, &filters_part, &analysis, &ranked);

        telemetry.partial_results = !telemetry.errors.is_empty();
        telemetry.total_ms = total_timer.elapsed_ms();
        Ok(SearchResponse::paginate(
            ranked,
            self.config.page_size,
            0,
            analysis,
            telemetry,
        ))
    }

    async fn probe_full_cache(
        &self,
        normalized: &str,
        filters_part: &str,
        started: Instant,
        telemetry: &mut PipelineTelemetry,
    ) -> Option<SearchResponse> {
        let analysis = self
            .cache
            .get_json::<QueryAnalysis>(&analysis_key(normalized, filters_part))
            .await?;
        let results = self
            .cache
            .get_json::<CachedResults>(&results_key(normalized, filters_part))
            .await?;
        let embedding_cached = self
            .cache
            .get(&embedding_key(self.embedder.version(), normalized))
            .await
            .is_some();
        if !embedding_cached {
            return None;
        }

        let mut telemetry_out = std::mem::take(telemetry);
        telemetry_out.record_step("cache_probe", started, true);
        telemetry_out.total_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(query = normalized, "full-result cache hit");

        Some(SearchResponse::paginate(
            results.ranked,
            self.config.page_size,
            0,
            analysis,
            telemetry_out,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    async fn retrieve_and_rank(
        &self,
        normalized: &str,
        analysis: &QueryAnalysis,
        filters: &SearchFilters,
        resolved: Option<&localfind_core::ResolvedLocation>,
        near_me: bool,
        vector: &[f32],
        deadline: Instant,
        telemetry: &mut PipelineTelemetry,
    ) -> Vec<RankedBusiness> {
        let authoritative = analysis
            .category_is_authoritative()
            .then(|| analysis.category.clone());

        // Category for semantic candidate selection: confident, non-general
        let semantic_category = (analysis.category != GENERAL_CATEGORY
            && analysis.category_confidence >= 0.5)
            .then(|| analysis.category.clone());

        let geo_filter = resolved.map(|loc| GeoFilter {
            lat: loc.lat,
            lng: loc.lng,
            radius_km: near_me.then(|| {
                filters
                    .max_distance_m
                    .map(|m| m as f64 / 1000.0)
                    .unwrap_or(loc.radius_m as f64 / 1000.0)
            }),
            city: loc.city.clone(),
        });

        let timer = StepTimer::start();
        let (keyword_hits, semantic_hits) = match remaining(deadline) {
            Some(budget) => {
                let keyword_future = self.keyword.retrieve(normalized, self.config.retrieval_limit);
                let semantic_future = self.semantic.retrieve(
                    vector,
                    semantic_category.as_deref(),
                    geo_filter.as_ref(),
                    self.config.retrieval_limit,
                );
                match tokio::time::timeout(budget, async {
                    tokio::join!(keyword_future, semantic_future)
                })
                .await
                {
                    Ok((keyword_result, semantic_result)) => {
                        let keyword_hits: Vec<KeywordHit> = match keyword_result {
                            Ok(hits) => hits,
                            Err(error) => {
                                telemetry.record_error(
                                    ErrorKind::StoreUnavailable,
                                    format!("keyword retrieval: {error}"),
                                );
                                Vec::new()
                            }
                        };
                        let semantic_hits: Vec<SemanticHit> = match semantic_result {
                            Ok(hits) => hits,
                            Err(error) => {
                                telemetry.record_error(error.kind(), format!("semantic retrieval: {error}"));
                                Vec::new()
                            }
                        };
                        (keyword_hits, semantic_hits)
                    }
                    Err(_) => {
                        telemetry.record_step_error(
                            "retrieve",
                            timer.started(),
                            ErrorKind::Timeout,
                            "retrieval exceeded the request deadline",
                        );
                        return Vec::new();
                    }
                }
            }
            None => {
                telemetry.record_error(ErrorKind::Timeout, "request deadline exceeded");
                return Vec::new();
            }
        };
        telemetry.record_step("retrieve", timer.started(), false);

        let timer = StepTimer::start();
        let items = merge_hybrid(
            semantic_hits,
            keyword_hits,
            self.config.weights,
            authoritative.as_deref(),
        );
        telemetry.record_step("merge", timer.started(), false);

        let timer = StepTimer::start();
        let origin = resolved
            .filter(|loc| loc.lat != 0.0 || loc.lng != 0.0)
            .map(|loc| (loc.lat, loc.lng));
        let filter_ctx = FilterContext {
            resolved_city: resolved.and_then(|loc| loc.city.clone()),
            is_near_me: near_me,
            origin,
            now: Some(Utc::now()),
        };
        let items = apply_filters(items, filters, &filter_ctx, &self.config.filter_policy);
        telemetry.record_step("filter", timer.started(), false);

        let timer = StepTimer::start();
        let keywords = tokenize_query(normalized);
        let ranked = rank(items, &keywords, origin, Utc::now());
        telemetry.record_step("rank", timer.started(), false);

        ranked
    }

    fn spawn_cache_writes(
        &self,
        normalized: &str,
        filters_part: &str,
        analysis: &QueryAnalysis,
        ranked: &[RankedBusiness],
    ) {
        let cache = Arc::clone(&self.cache);
        let analysis_key = analysis_key(normalized, filters_part);
        let results_key = results_key(normalized, filters_part);
        let analysis = analysis.clone();
        let cached = CachedResults {
            ranked: ranked.to_vec(),
            total: ranked.len(),
        };
        tokio::spawn(async move {
            cache
                .set_json(
                    &analysis_key,
                    &analysis,
                    Duration::from_secs(ttl::ANALYSIS_SECS),
                )
                .await;
            cache
                .set_json(&results_key, &cached, Duration::from_secs(ttl::RESULTS_SECS))
                .await;
        });
    }
}

fn remaining(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    (now < deadline).then(|| deadline - now)
}

/// Fill the gaps a degraded analysis left with lexical heuristics.
fn backfill_from_heuristics(analysis: &mut QueryAnalysis, normalized: &str) {
    let heuristic = heuristic_analysis(normalized);
    if analysis.category == GENERAL_CATEGORY && analysis.category_confidence == 0.0 {
        analysis.category = heuristic.category;
        analysis.category_confidence = heuristic.category_confidence;
        if analysis.category_alternatives.is_empty() {
            analysis.category_alternatives = heuristic.category_alternatives;
        }
    }
    if analysis.entities.is_empty() {
        analysis.entities = heuristic.entities;
    }
    analysis.confidence = QueryAnalysis::aggregate_confidence(
        analysis.intent_confidence,
        analysis.category_confidence,
        analysis.entities.confidence,
    );
}

/// Derive filter values from the analysis. Categories come from confident
/// non-general classifications; cities and price tiers from the entities;
/// "open now" phrasing turns on the hours filter.
fn derive_filters(analysis: &QueryAnalysis) -> SearchFilters {
    let mut derived = SearchFilters::default();

    if analysis.category != GENERAL_CATEGORY && analysis.category_confidence >= 0.3 {
        derived.categories = vec![analysis.category.clone()];
    }
    derived.cities = analysis.entities.locations.clone();
    derived.price_tiers = analysis
        .entities
        .prices
        .iter()
        .filter_map(|token| PriceTier::parse(token))
        .collect();
    if analysis
        .entities
        .times
        .iter()
        .any(|t| t == "open now" || t == "now" || t == "open")
    {
        derived.hours.open_now = true;
    }

    derived
}
