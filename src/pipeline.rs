//! Pipeline Orchestrator. Owns the fast and accurate step sequencing, the
//! error mapping into caller-facing classes, timing/metric recording, and
//! cache population/consumption. No global state — every dependency
//! (`LlmGateway`, `RetrievalIndex`, `ContextCache`, `QueryStore`, `Metrics`)
//! is injected through `Orchestrator::new`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::{ActDedupSourceExtractor, AssemblerConfig, ContextAssembler, ExtractSources, PromptTier};
use crate::cache::ContextCache;
use crate::config::Config;
use crate::domain::query_record::{Question, ResponseSlot};
use crate::domain::source::Source;
use crate::domain::{Act, Chunk, RetrievalBundle};
use crate::error::CoreError;
use crate::gateway::{GenerateTextParams, LlmGateway};
use crate::index::{FetchRelatedActsParams, RetrievalIndex, SemanticSearchParams};
use crate::metrics::{Metrics, Stream, Tier};
use crate::store::QueryStore;

/// Result of `Orchestrator::process_fast`.
#[derive(Debug, Clone)]
pub struct FastResult {
    pub query_id: Uuid,
    pub content: String,
    pub sources: Vec<Source>,
    pub model_name: String,
    pub generation_ms: u64,
    pub pipeline_ms: u64,
}

/// Result of `Orchestrator::process_accurate`.
#[derive(Debug, Clone)]
pub struct AccurateResult {
    pub query_id: Uuid,
    pub content: String,
    pub model_name: String,
    pub generation_ms: u64,
    pub pipeline_ms: u64,
}

/// Retrieval context computed once and shared by both tiers: chunks,
/// related acts, and the rendered passage text that goes into the prompt.
struct RetrievalContext {
    chunks: Vec<Chunk>,
    related: Vec<Act>,
    rendered: String,
}

pub struct Orchestrator {
    gateway: Arc<dyn LlmGateway>,
    index: Arc<dyn RetrievalIndex>,
    assembler: ContextAssembler,
    source_extractor: Box<dyn ExtractSources + Send + Sync>,
    cache: Arc<dyn ContextCache>,
    store: Arc<dyn QueryStore>,
    metrics: Arc<Metrics>,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        index: Arc<dyn RetrievalIndex>,
        assembler_config: AssemblerConfig,
        cache: Arc<dyn ContextCache>,
        store: Arc<dyn QueryStore>,
        metrics: Arc<Metrics>,
        config: Config,
    ) -> Self {
        let assembler = ContextAssembler::new(assembler_config);
        Self {
            gateway,
            index,
            assembler,
            source_extractor: Box::new(ActDedupSourceExtractor),
            cache,
            store,
            metrics,
            config,
        }
    }

    /// Embedding, semantic search, related-act traversal, and context
    /// rendering, shared by the fresh fast run and the accurate pipeline's
    /// cache-miss recompute path.
    async fn retrieve(&self, question: &str) -> Result<RetrievalContext, CoreError> {
        let step_started = Instant::now();
        let embedding = self.gateway.generate_embedding(question, None).await?;
        self.metrics.record(
            Stream::EmbeddingMs,
            step_started.elapsed().as_millis() as u64,
        );

        let step_started = Instant::now();
        let chunks = self
            .index
            .semantic_search(
                SemanticSearchParams {
                    query_embedding: embedding,
                    top_k: self.config.top_k,
                    distance_threshold: self.config.distance_threshold,
                    act_id_filter: None,
                },
                self.index.native_dim(),
                self.config.min_results,
            )
            .await?;
        self.metrics.record(
            Stream::SemanticSearchMs,
            step_started.elapsed().as_millis() as u64,
        );

        let mut act_ids: Vec<String> = Vec::new();
        for chunk in &chunks {
            if !act_ids.contains(&chunk.act_id) {
                act_ids.push(chunk.act_id.clone());
            }
        }

        let step_started = Instant::now();
        let related = self
            .index
            .fetch_related_acts(FetchRelatedActsParams {
                seed_act_ids: act_ids,
                depth: self.config.related_acts_depth,
                relation_kinds: None,
            })
            .await?;
        self.metrics.record(
            Stream::RelatedActsMs,
            step_started.elapsed().as_millis() as u64,
        );

        let step_started = Instant::now();
        let rendered = self.assembler.render(&chunks, &related);
        self.metrics.record(
            Stream::RenderMs,
            step_started.elapsed().as_millis() as u64,
        );

        Ok(RetrievalContext {
            chunks,
            related,
            rendered,
        })
    }

    /// `ProcessFast(userId, question) -> FastResult`.
    pub async fn process_fast(&self, user_id: &str, question: &str) -> Result<FastResult, CoreError> {
        let pipeline_started = Instant::now();
        let parsed = Question::parse(question)?;

        let query_id = self.store.create(user_id, parsed.as_str().to_string()).await?;
        debug!(%query_id, "fast pipeline: query record created");

        let retrieval = match self.retrieve(parsed.as_str()).await {
            Ok(r) => r,
            Err(e) => {
                self.metrics.record_outcome(Tier::Fast, false);
                warn!(%query_id, error = %e, "fast pipeline: retrieval failed");
                return Err(e);
            }
        };

        let prompt = self
            .assembler
            .build_user_prompt(parsed.as_str(), &retrieval.rendered);
        let system_prompt = self.assembler.build_system_prompt(PromptTier::Fast);

        let params = GenerateTextParams::new(prompt, self.config.fast_model.clone())
            .with_system_prompt(system_prompt)
            .with_timeout(self.config.fast_timeout());

        let outcome = match self.gateway.generate_text(params).await {
            Ok(o) => o,
            Err(CoreError::Timeout(ms)) => {
                self.metrics.record_outcome(Tier::Fast, false);
                warn!(%query_id, "fast pipeline: generation timed out");
                return Err(CoreError::GenerationTimeout(ms));
            }
            Err(e) => {
                self.metrics.record_outcome(Tier::Fast, false);
                warn!(%query_id, error = %e, "fast pipeline: generation failed");
                return Err(e);
            }
        };

        let sources = self
            .source_extractor
            .extract_sources(&outcome.text, &retrieval.chunks);

        if let Err(e) = self
            .store
            .update_fast(
                query_id,
                ResponseSlot {
                    content: outcome.text.clone(),
                    model_name: self.config.fast_model.clone(),
                    generation_ms: outcome.generation_ms,
                    sources: Some(sources.clone()),
                },
            )
            .await
        {
            self.metrics.record_outcome(Tier::Fast, false);
            warn!(%query_id, error = %e, "fast pipeline: failed to persist fast slot");
            return Err(e);
        }

        let bundle = RetrievalBundle {
            chunks: retrieval.chunks,
            related_acts: retrieval.related,
            rendered_context: retrieval.rendered,
            cached_at: Utc::now(),
        };
        // Cache write failure never fails the fast pipeline: the accurate
        // pipeline just recomputes on miss.
        if let Err(e) = self.cache.put(query_id, bundle).await {
            warn!(%query_id, error = %e, "fast pipeline: cache write failed, proceeding anyway");
        }

        let pipeline_ms = pipeline_started.elapsed().as_millis() as u64;
        self.metrics.record(Stream::FastGenerationMs, outcome.generation_ms);
        self.metrics.record(Stream::PipelineMs, pipeline_ms);
        self.metrics.record_outcome(Tier::Fast, true);
        info!(%query_id, pipeline_ms, "fast pipeline: completed");

        Ok(FastResult {
            query_id,
            content: outcome.text,
            sources,
            model_name: self.config.fast_model.clone(),
            generation_ms: outcome.generation_ms,
            pipeline_ms,
        })
    }

    /// `ProcessAccurate(queryId, question) -> AccurateResult`.
    pub async fn process_accurate(
        &self,
        query_id: Uuid,
        question: &str,
    ) -> Result<AccurateResult, CoreError> {
        let pipeline_started = Instant::now();
        let parsed = Question::parse(question)?;

        let rendered_context = match self.cache.get(query_id).await {
            Ok(Some(bundle)) => {
                self.metrics.record_cache_hit();
                debug!(%query_id, "accurate pipeline: cache hit");
                bundle.rendered_context
            }
            Ok(None) => {
                self.metrics.record_cache_miss();
                debug!(%query_id, "accurate pipeline: cache miss, recomputing retrieval");
                self.retrieve(parsed.as_str()).await?.rendered
            }
            Err(e) => {
                // Cache unavailability degrades to recompute; never fails
                // the accurate pipeline.
                warn!(%query_id, error = %e, "accurate pipeline: cache unavailable, recomputing");
                self.metrics.record_cache_miss();
                self.retrieve(parsed.as_str()).await?.rendered
            }
        };

        let prompt = self.assembler.build_user_prompt(parsed.as_str(), &rendered_context);
        let system_prompt = self.assembler.build_system_prompt(PromptTier::Accurate);

        let params = GenerateTextParams::new(prompt, self.config.accurate_model.clone())
            .with_system_prompt(system_prompt)
            .with_timeout(self.config.accurate_timeout());

        let outcome = match self.gateway.generate_text(params).await {
            Ok(o) => o,
            Err(CoreError::Timeout(ms)) => {
                self.metrics.record_outcome(Tier::Accurate, false);
                warn!(%query_id, "accurate pipeline: generation timed out");
                return Err(CoreError::GenerationTimeout(ms));
            }
            Err(e) => {
                self.metrics.record_outcome(Tier::Accurate, false);
                warn!(%query_id, error = %e, "accurate pipeline: generation failed");
                return Err(e);
            }
        };

        if let Err(e) = self
            .store
            .update_accurate(
                query_id,
                ResponseSlot {
                    content: outcome.text.clone(),
                    model_name: self.config.accurate_model.clone(),
                    generation_ms: outcome.generation_ms,
                    sources: None,
                },
            )
            .await
        {
            self.metrics.record_outcome(Tier::Accurate, false);
            warn!(%query_id, error = %e, "accurate pipeline: failed to persist accurate slot");
            return Err(e);
        }

        let pipeline_ms = pipeline_started.elapsed().as_millis() as u64;
        self.metrics.record(Stream::AccurateGenerationMs, outcome.generation_ms);
        self.metrics.record(Stream::PipelineMs, pipeline_ms);
        self.metrics.record_outcome(Tier::Accurate, true);
        info!(%query_id, pipeline_ms, "accurate pipeline: completed");

        Ok(AccurateResult {
            query_id,
            content: outcome.text,
            model_name: self.config.accurate_model.clone(),
            generation_ms: outcome.generation_ms,
            pipeline_ms,
        })
    }

    /// Preconditions for accepting a background accurate-response request:
    /// the query exists for this user, `fast` is populated, `accurate` is
    /// not.
    pub async fn can_accept_accurate(
        &self,
        query_id: Uuid,
        user_id: &str,
    ) -> Result<bool, CoreError> {
        let record = self.store.get_by_id(query_id, user_id).await?;
        Ok(match record {
            Some(r) => r.fast.is_some() && r.accurate.is_none(),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InProcessCache;
    use crate::domain::act::{Act, ActStatus};
    use crate::domain::chunk::Chunk;
    use crate::domain::embedding::Embedding as DomainEmbedding;
    use crate::domain::relation::RelationKind;
    use crate::gateway::{GenerateStructuredParams, GenerationOutcome};
    use crate::store::InMemoryQueryStore;
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGateway {
        fast_delay_ms: u64,
        embedding_calls: AtomicUsize,
        generate_calls: AtomicUsize,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                fast_delay_ms: 0,
                embedding_calls: AtomicUsize::new(0),
                generate_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmGateway for FakeGateway {
        async fn health_check(&self, _force: bool) -> bool {
            true
        }

        async fn list_models(&self, _refresh: bool) -> Result<Vec<String>, CoreError> {
            Ok(vec!["fast".into(), "accurate".into()])
        }

        async fn validate_model(&self, _model_name: &str) -> Result<bool, CoreError> {
            Ok(true)
        }

        async fn generate_text(
            &self,
            params: GenerateTextParams,
        ) -> Result<GenerationOutcome, CoreError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            if self.fast_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.fast_delay_ms)).await;
            }
            Ok(GenerationOutcome {
                text: format!("odpowiedź dla modelu {}", params.model),
                generation_ms: self.fast_delay_ms,
            })
        }

        async fn generate_structured(
            &self,
            _params: GenerateStructuredParams,
        ) -> Result<JsonValue, CoreError> {
            unimplemented!("not exercised by pipeline tests")
        }

        async fn generate_embedding(
            &self,
            text: &str,
            _model: Option<&str>,
        ) -> Result<DomainEmbedding, CoreError> {
            self.embedding_calls.fetch_add(1, Ordering::SeqCst);
            if text.trim().is_empty() {
                return Err(CoreError::Embedding("empty input".into()));
            }
            Ok(DomainEmbedding::new(vec![0.1; 768]))
        }

        async fn warmup(&self, _model: &str, _timeout: std::time::Duration) -> bool {
            true
        }

        async fn warmup_all(&self, _models: &[String]) {}
    }

    struct FakeIndex {
        search_calls: AtomicUsize,
        related_calls: AtomicUsize,
        n_chunks: usize,
    }

    fn act_summary(id: &str) -> crate::domain::act::ActSummary {
        crate::domain::act::ActSummary {
            id: id.to_string(),
            title: format!("Ustawa {id}"),
            publisher: "Dz.U.".to_string(),
            year: 2020,
            position: 1,
            status: ActStatus::InForce,
        }
    }

    #[async_trait]
    impl RetrievalIndex for FakeIndex {
        fn native_dim(&self) -> usize {
            1024
        }

        async fn semantic_search(
            &self,
            _params: SemanticSearchParams,
            _native_dim: usize,
            min_results: usize,
        ) -> Result<Vec<Chunk>, CoreError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.n_chunks < min_results {
                return Err(CoreError::NoRelevantActs);
            }
            Ok((0..self.n_chunks)
                .map(|i| Chunk {
                    id: format!("chunk-{i}"),
                    act_id: "act-1".to_string(),
                    chunk_index: i as u32,
                    content: format!("fragment {i}"),
                    metadata: None,
                    distance: 0.1 + i as f32 * 0.01,
                    act: act_summary("act-1"),
                })
                .collect())
        }

        async fn fetch_related_acts(
            &self,
            params: FetchRelatedActsParams,
        ) -> Result<Vec<Act>, CoreError> {
            self.related_calls.fetch_add(1, Ordering::SeqCst);
            if params.seed_act_ids.is_empty() {
                return Err(CoreError::Validation("empty seeds".into()));
            }
            Ok(vec![Act {
                id: "act-related".to_string(),
                title: "Ustawa powiązana".to_string(),
                publisher: "Dz.U.".to_string(),
                year: 2019,
                position: 2,
                status: ActStatus::InForce,
                enacted_on: None,
                effective_on: None,
                depth: 1,
            }])
        }
    }

    fn test_config() -> Config {
        let mut c = Config::default();
        c.fast_model = "fast".to_string();
        c.accurate_model = "accurate".to_string();
        c.min_results = 3;
        c
    }

    fn orchestrator(n_chunks: usize) -> Orchestrator {
        let gateway = Arc::new(FakeGateway::new());
        let index = Arc::new(FakeIndex {
            search_calls: AtomicUsize::new(0),
            related_calls: AtomicUsize::new(0),
            n_chunks,
        });
        let cache = Arc::new(InProcessCache::new(300));
        let store = Arc::new(InMemoryQueryStore::new());
        let metrics = Arc::new(Metrics::new());
        Orchestrator::new(
            gateway,
            index,
            AssemblerConfig::default(),
            cache,
            store,
            metrics,
            test_config(),
        )
    }

    #[tokio::test]
    async fn fast_pipeline_happy_path_populates_fast_slot_and_cache() {
        let orch = orchestrator(10);
        let result = orch
            .process_fast("user-1", "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();

        assert!(!result.content.is_empty());
        assert_eq!(result.sources.len(), 1); // all 10 chunks share act-1
        assert_eq!(result.model_name, "fast");

        let record = orch
            .store
            .get_by_id(result.query_id, "user-1")
            .await
            .unwrap()
            .unwrap();
        assert!(record.fast.is_some());
        assert!(record.accurate.is_none());

        assert!(orch.cache.get(result.query_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fast_pipeline_retrieval_vacuum_surfaces_no_relevant_acts() {
        let orch = orchestrator(1);
        let err = orch
            .process_fast("user-1", "Jaka jest prognoza pogody na jutro?")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoRelevantActs));
    }

    #[tokio::test]
    async fn accurate_pipeline_cache_hit_skips_embedding_and_search() {
        let orch = orchestrator(5);
        let fast = orch
            .process_fast("user-1", "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();

        let accurate = orch
            .process_accurate(fast.query_id, "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();

        assert_eq!(accurate.query_id, fast.query_id);
        assert_eq!(accurate.model_name, "accurate");

        let record = orch
            .store
            .get_by_id(fast.query_id, "user-1")
            .await
            .unwrap()
            .unwrap();
        assert!(record.accurate.is_some());
    }

    #[tokio::test]
    async fn accurate_pipeline_cache_miss_recomputes_retrieval() {
        let orch = orchestrator(5);
        let fast = orch
            .process_fast("user-1", "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();

        // Force a miss by evicting the cached bundle.
        orch.cache.delete(fast.query_id).await.unwrap();

        let accurate = orch
            .process_accurate(fast.query_id, "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();
        assert_eq!(accurate.query_id, fast.query_id);
    }

    #[tokio::test]
    async fn can_accept_accurate_requires_fast_populated_and_accurate_empty() {
        let orch = orchestrator(5);
        let fast = orch
            .process_fast("user-1", "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();

        assert!(orch.can_accept_accurate(fast.query_id, "user-1").await.unwrap());

        orch.process_accurate(fast.query_id, "Jakie są warunki zawarcia umowy sprzedaży?")
            .await
            .unwrap();

        assert!(!orch.can_accept_accurate(fast.query_id, "user-1").await.unwrap());
    }

    #[tokio::test]
    async fn accurate_before_fast_rejected() {
        let orch = orchestrator(5);
        assert!(!orch
            .can_accept_accurate(Uuid::new_v4(), "user-1")
            .await
            .unwrap());
    }
}
