//! The query analyzer
//!
//! Runs the three analysis tasks over the language-model collaborator.
//! Every call is admitted through the rate limiter, retried with backoff
//! for transient classes, and bounded by a hard timeout. Results are
//! memoized in-process for a day keyed by the lowercased trimmed query.
//!
//! The fan-out is all-settle: a failed sub-task never cancels its siblings;
//! defaults fill the missing piece and the error is reported alongside.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use localfind_core::{
    Error, ExtractedEntities, LanguageModel, QueryAnalysis, QueryIntent, Result,
};
use localfind_normalize::{
    normalize_business_name, normalize_location_name, normalize_price_range, taxonomy,
    GENERAL_CATEGORY,
};
use localfind_resilience::{retry_with_backoff, FallbackLog, RateLimiter};

use crate::parse::{clamp_confidence, parse_reply, CategoryReply, EntitiesReply, IntentReply};
use crate::prompts;

/// Analyzer tuning. The business-name validator is bypassed for search
/// traffic by default; the flag is preserved so a caller can re-enable it.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Hard timeout per model call
    pub call_timeout: Duration,
    /// Admission wait budget per call
    pub wait_slot: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// In-process memo lifetime
    pub memo_ttl: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Validate extracted business names instead of accepting them verbatim
    pub validate_business_names: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            wait_slot: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            memo_ttl: Duration::from_secs(24 * 60 * 60),
            max_tokens: 256,
            temperature: 0.0,
            validate_business_names: false,
        }
    }
}

/// Per-request principal context for rate-limit scoping.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub user_id: Option<String>,
    pub ip: Option<String>,
}

/// Classified category with alternatives.
#[derive(Debug, Clone)]
pub struct CategoryResult {
    pub category: String,
    pub confidence: f64,
    pub alternatives: Vec<String>,
}

/// Output of a full analysis, with the errors that degraded it.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub analysis: QueryAnalysis,
    pub model_calls: u32,
    pub errors: Vec<Error>,
}

struct MemoEntry<T> {
    value: T,
    expires_at: Instant,
}

/// The NLP analyzer component. Constructed once and shared; tests build a
/// fresh one per case so memo state never leaks between them.
pub struct QueryAnalyzer {
    llm: Arc<dyn LanguageModel>,
    limiter: Arc<RateLimiter>,
    fallback_log: Arc<FallbackLog>,
    options: AnalyzerOptions,
    intent_memo: DashMap<String, MemoEntry<(QueryIntent, f64)>>,
    category_memo: DashMap<String, MemoEntry<CategoryResult>>,
    entity_memo: DashMap<String, MemoEntry<ExtractedEntities>>,
}

impl QueryAnalyzer {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        limiter: Arc<RateLimiter>,
        fallback_log: Arc<FallbackLog>,
        options: AnalyzerOptions,
    ) -> Self {
        Self {
            llm,
            limiter,
            fallback_log,
            options,
            intent_memo: DashMap::new(),
            category_memo: DashMap::new(),
            entity_memo: DashMap::new(),
        }
    }

    fn memo_key(query: &str) -> String {
        query.trim().to_lowercase()
    }

    fn memo_get<T: Clone>(map: &DashMap<String, MemoEntry<T>>, key: &str) -> Option<T> {
        let entry = map.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            map.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn memo_put<T>(&self, map: &DashMap<String, MemoEntry<T>>, key: String, value: T) {
        map.insert(
            key,
            MemoEntry {
                value,
                expires_at: Instant::now() + self.options.memo_ttl,
            },
        );
    }

    /// One admitted, retried, timeout-bounded model call.
    async fn call_model(&self, prompt: String, ctx: &CallContext) -> Result<String> {
        self.limiter
            .wait_for_slot(ctx.user_id.as_deref(), ctx.ip.as_deref(), self.options.wait_slot)
            .await?;

        let llm = Arc::clone(&self.llm);
        let options = &self.options;
        retry_with_backoff(
            || {
                let llm = Arc::clone(&llm);
                let prompt = prompt.clone();
                async move {
                    match tokio::time::timeout(
                        options.call_timeout,
                        llm.generate(
                            &prompt,
                            Some(prompts::SYSTEM),
                            options.max_tokens,
                            options.temperature,
                        ),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(Error::ModelUnavailable(format!(
                            "model call timed out after {}ms",
                            options.call_timeout.as_millis()
                        ))),
                    }
                }
            },
            options.max_retries,
            options.initial_backoff,
        )
        .await
    }

    /// Detect the query intent. Invalid labels collapse to unknown.
    pub async fn detect_intent(
        &self,
        query: &str,
        ctx: &CallContext,
    ) -> Result<(QueryIntent, f64)> {
        let key = Self::memo_key(query);
        if let Some(hit) = Self::memo_get(&self.intent_memo, &key) {
            return Ok(hit);
        }

        let reply = self.call_model(prompts::intent_prompt(query), ctx).await?;
        let parsed: IntentReply = parse_reply(&reply)?;
        let intent = QueryIntent::parse(&parsed.intent);
        let confidence = if intent == QueryIntent::Unknown {
            0.0
        } else {
            clamp_confidence(parsed.confidence)
        };

        self.memo_put(&self.intent_memo, key, (intent, confidence));
        Ok((intent, confidence))
    }

    /// Classify the primary category. The raw label goes through the
    /// taxonomy normalizer; low confidence collapses to the reserved root.
    pub async fn classify_category(
        &self,
        query: &str,
        ctx: &CallContext,
    ) -> Result<CategoryResult> {
        let key = Self::memo_key(query);
        if let Some(hit) = Self::memo_get(&self.category_memo, &key) {
            return Ok(hit);
        }

        let tax = taxonomy();
        let reply = self
            .call_model(prompts::category_prompt(query, tax), ctx)
            .await?;
        let parsed: CategoryReply = parse_reply(&reply)?;

        let confidence = clamp_confidence(parsed.confidence);
        let mapped = tax.normalize_category(&parsed.category);
        let category = match (mapped, confidence) {
            (Some(id), c) if c >= 0.3 => id,
            (Some(id), _) => {
                tracing::debug!(
                    category = %id,
                    confidence,
                    "classifier confidence below floor, collapsing to general"
                );
                GENERAL_CATEGORY.to_string()
            }
            (None, _) => {
                tracing::debug!(raw = %parsed.category, "classifier label not in taxonomy");
                GENERAL_CATEGORY.to_string()
            }
        };

        let mut alternatives: Vec<String> = Vec::new();
        for alt in parsed.alternatives {
            if let Some(id) = tax.normalize_category(&alt) {
                if id != category && !alternatives.contains(&id) {
                    alternatives.push(id);
                }
            }
            if alternatives.len() == 3 {
                break;
            }
        }

        let result = CategoryResult {
            category,
            confidence,
            alternatives,
        };
        self.memo_put(&self.category_memo, key, result.clone());
        Ok(result)
    }

    /// Extract entities, normalized through the C1 tables and deduplicated
    /// preserving first occurrence.
    pub async fn extract_entities(
        &self,
        query: &str,
        ctx: &CallContext,
    ) -> Result<ExtractedEntities> {
        let key = Self::memo_key(query);
        if let Some(hit) = Self::memo_get(&self.entity_memo, &key) {
            return Ok(hit);
        }

        let reply = self.call_model(prompts::entities_prompt(query), ctx).await?;
        let parsed: EntitiesReply = parse_reply(&reply)?;
        let entities = self.normalize_entities(parsed);

        self.memo_put(&self.entity_memo, key, entities.clone());
        Ok(entities)
    }

    fn normalize_entities(&self, raw: EntitiesReply) -> ExtractedEntities {
        let mut entities = ExtractedEntities {
            confidence: clamp_confidence(raw.confidence),
            ..Default::default()
        };

        for loc in raw.locations {
            if let Some(city) = normalize_location_name(&loc) {
                if !entities.locations.contains(&city) {
                    entities.locations.push(city);
                }
            }
        }

        for name in raw.business_names {
            if self.options.validate_business_names && !plausible_business_name(&name) {
                tracing::debug!(name, "dropping implausible business name");
                continue;
            }
            if let Some(normalized) = normalize_business_name(&name) {
                if !entities.business_names.contains(&normalized) {
                    entities.business_names.push(normalized);
                }
            }
        }

        for time in raw.times {
            let cleaned = time.trim().to_lowercase();
            if !cleaned.is_empty() && !entities.times.contains(&cleaned) {
                entities.times.push(cleaned);
            }
        }

        for price in raw.prices {
            if let Some(tier) = normalize_price_range(&price) {
                let token = tier.as_str().to_string();
                if !entities.prices.contains(&token) {
                    entities.prices.push(token);
                }
            }
        }

        for feature in raw.features {
            let cleaned = feature.trim().to_lowercase();
            if !cleaned.is_empty() && !entities.features.contains(&cleaned) {
                entities.features.push(cleaned);
            }
        }

        entities
    }

    /// Run all three tasks in parallel. A failed sub-task is replaced by its
    /// default and reported in the outcome's error list; siblings are never
    /// cancelled.
    pub async fn analyze_query(&self, query: &str, ctx: &CallContext) -> AnalysisOutcome {
        let key = Self::memo_key(query);
        let memoized = (
            Self::memo_get(&self.intent_memo, &key).is_some(),
            Self::memo_get(&self.category_memo, &key).is_some(),
            Self::memo_get(&self.entity_memo, &key).is_some(),
        );

        let (intent_result, category_result, entities_result) = tokio::join!(
            self.detect_intent(query, ctx),
            self.classify_category(query, ctx),
            self.extract_entities(query, ctx),
        );

        let mut errors = Vec::new();
        let mut model_calls = 0u32;
        let mut count_call = |was_memoized: bool| {
            if !was_memoized {
                model_calls += 1;
            }
        };

        let (intent, intent_confidence) = match intent_result {
            Ok(pair) => {
                count_call(memoized.0);
                pair
            }
            Err(e) => {
                self.record_failure("detect_intent", &e);
                errors.push(e);
                (QueryIntent::Search, 0.5)
            }
        };

        let category = match category_result {
            Ok(result) => {
                count_call(memoized.1);
                result
            }
            Err(e) => {
                self.record_failure("classify_category", &e);
                errors.push(e);
                CategoryResult {
                    category: GENERAL_CATEGORY.to_string(),
                    confidence: 0.0,
                    alternatives: Vec::new(),
                }
            }
        };

        let entities = match entities_result {
            Ok(entities) => {
                count_call(memoized.2);
                entities
            }
            Err(e) => {
                self.record_failure("extract_entities", &e);
                errors.push(e);
                ExtractedEntities::default()
            }
        };

        if category.confidence < 0.5 {
            tracing::debug!(
                category = %category.category,
                confidence = category.confidence,
                "low-confidence category result"
            );
        }

        let confidence = QueryAnalysis::aggregate_confidence(
            intent_confidence,
            category.confidence,
            entities.confidence,
        );

        AnalysisOutcome {
            analysis: QueryAnalysis {
                normalized_query: query.to_string(),
                intent,
                intent_confidence,
                category: category.category,
                category_confidence: category.confidence,
                category_alternatives: category.alternatives,
                entities,
                location: None,
                confidence,
            },
            model_calls,
            errors,
        }
    }

    fn record_failure(&self, operation: &str, error: &Error) {
        let class = localfind_resilience::classify(error);
        tracing::warn!(operation, ?class, "analysis sub-task failed: {error}");
        self.fallback_log.record(operation, class, error);
    }
}
