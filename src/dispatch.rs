//! Background dispatch for the accurate pipeline: a bounded channel plus a
//! dedicated worker task, with explicit work submission and its own
//! shutdown lifecycle that drains in-flight work before returning.
//!
//! The API layer accepts an accurate-response request, returns
//! `status: processing` immediately, and calls `BackgroundDispatcher::submit`.
//! The worker runs `Orchestrator::process_accurate`, swallows all errors
//! (logs them; never propagates to whoever enqueued the work). Success/
//! failure accounting lives entirely inside `Orchestrator::process_accurate`
//! itself, so it is recorded exactly once regardless of whether the call
//! came from here or from a synchronous caller. The Query Store is the
//! source of truth a polling client observes — completion is never
//! signalled back through the channel itself.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pipeline::Orchestrator;

/// One unit of background work: run the accurate pipeline for `query_id`
/// against `question` and drop the result on the floor (the Query Store
/// already recorded it).
struct Job {
    query_id: Uuid,
    question: String,
}

/// Bounded mpsc channel + a capped number of concurrently-running workers.
/// `submit` never blocks the caller for long: the channel has backpressure
/// capacity, and `try_send` is used so a saturated dispatcher degrades by
/// logging and refusing new work rather than stalling the submitter.
pub struct BackgroundDispatcher {
    tx: mpsc::Sender<Job>,
    worker: tokio::task::JoinHandle<()>,
}

/// Channel slots buffered before `submit` starts refusing new work.
const QUEUE_CAPACITY: usize = 256;

impl BackgroundDispatcher {
    /// Spawns the dispatcher's worker loop. `max_concurrent` bounds how many
    /// accurate pipelines run at once from background dispatch — this is
    /// separate from (and typically smaller than) the gateway's own
    /// per-model semaphore, since background work competes with foreground
    /// fast pipelines for the same gateway semaphores.
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent: usize) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(run_worker(rx, orchestrator, max_concurrent.max(1)));
        Self { tx, worker }
    }

    /// Enqueues an accurate-pipeline run. Never blocks: a full queue is
    /// logged and the work is dropped rather than stalling the submitter.
    pub fn submit(&self, query_id: Uuid, question: String) {
        if let Err(e) = self.tx.try_send(Job { query_id, question }) {
            warn!(%query_id, error = %e, "background dispatch queue full or closed, dropping accurate request");
        }
    }

    /// Stops accepting new work and awaits in-flight jobs draining. Dropping
    /// the sender closes the channel; the worker loop exits once it has
    /// drained whatever was already queued.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(error = %e, "background dispatch worker panicked during shutdown");
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    orchestrator: Arc<Orchestrator>,
    max_concurrent: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut in_flight = tokio::task::JoinSet::new();

    while let Some(job) = rx.recv().await {
        let permit = semaphore.clone().acquire_owned().await;
        let orchestrator = orchestrator.clone();

        in_flight.spawn(async move {
            let _permit = permit;
            let query_id = job.query_id;
            match orchestrator.process_accurate(query_id, &job.question).await {
                Ok(result) => {
                    info!(%query_id, pipeline_ms = result.pipeline_ms, "background accurate pipeline completed");
                }
                Err(e) => {
                    // Swallowed: never propagated to the caller that
                    // enqueued this job. `process_accurate` already recorded
                    // the failure outcome before returning it.
                    error!(%query_id, error = %e, "background accurate pipeline failed");
                }
            }
        });

        // Bound the JoinSet itself so a burst of completions doesn't pile
        // up unawaited task handles indefinitely.
        while in_flight.len() > max_concurrent * 4 {
            in_flight.join_next().await;
        }
    }

    // Drain whatever was still running when the channel closed.
    while in_flight.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InProcessCache;
    use crate::config::Config;
    use crate::domain::act::{Act, ActStatus};
    use crate::domain::chunk::Chunk;
    use crate::domain::embedding::Embedding;
    use crate::error::CoreError;
    use crate::gateway::{
        GenerateStructuredParams, GenerateTextParams, GenerationOutcome, LlmGateway,
    };
    use crate::index::{FetchRelatedActsParams, RetrievalIndex, SemanticSearchParams};
    use crate::metrics::Metrics;
    use crate::store::{InMemoryQueryStore, QueryStore};
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use std::time::Duration;

    struct StubGateway;

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn health_check(&self, _force: bool) -> bool {
            true
        }
        async fn list_models(&self, _refresh: bool) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }
        async fn validate_model(&self, _model_name: &str) -> Result<bool, CoreError> {
            Ok(true)
        }
        async fn generate_text(
            &self,
            params: GenerateTextParams,
        ) -> Result<GenerationOutcome, CoreError> {
            Ok(GenerationOutcome {
                text: format!("odpowiedź: {}", params.model),
                generation_ms: 5,
            })
        }
        async fn generate_structured(
            &self,
            _params: GenerateStructuredParams,
        ) -> Result<JsonValue, CoreError> {
            unimplemented!()
        }
        async fn generate_embedding(
            &self,
            _text: &str,
            _model: Option<&str>,
        ) -> Result<Embedding, CoreError> {
            Ok(Embedding::new(vec![0.1; 768]))
        }
        async fn warmup(&self, _model: &str, _timeout: Duration) -> bool {
            true
        }
        async fn warmup_all(&self, _models: &[String]) {}
    }

    struct StubIndex;

    #[async_trait]
    impl RetrievalIndex for StubIndex {
        fn native_dim(&self) -> usize {
            1024
        }
        async fn semantic_search(
            &self,
            _params: SemanticSearchParams,
            _native_dim: usize,
            _min_results: usize,
        ) -> Result<Vec<Chunk>, CoreError> {
            Ok(vec![Chunk {
                id: "c1".into(),
                act_id: "a1".into(),
                chunk_index: 0,
                content: "treść".into(),
                metadata: None,
                distance: 0.1,
                act: crate::domain::act::ActSummary {
                    id: "a1".into(),
                    title: "Ustawa".into(),
                    publisher: "Dz.U.".into(),
                    year: 2020,
                    position: 1,
                    status: ActStatus::InForce,
                },
            }])
        }
        async fn fetch_related_acts(
            &self,
            _params: FetchRelatedActsParams,
        ) -> Result<Vec<Act>, CoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn submitted_job_eventually_populates_accurate_slot() {
        let gateway = Arc::new(StubGateway);
        let index = Arc::new(StubIndex);
        let cache = Arc::new(InProcessCache::new(300));
        let store = Arc::new(InMemoryQueryStore::new());
        let metrics = Arc::new(Metrics::new());

        let orchestrator = Arc::new(Orchestrator::new(
            gateway,
            index,
            crate::assembler::AssemblerConfig::default(),
            cache,
            store.clone(),
            metrics.clone(),
            Config::default(),
        ));

        let query_id = store
            .create("user-1", "Jakie są warunki zawarcia umowy?".into())
            .await
            .unwrap();
        store
            .update_fast(
                query_id,
                crate::domain::query_record::ResponseSlot {
                    content: "szybka odpowiedź".into(),
                    model_name: "fast".into(),
                    generation_ms: 10,
                    sources: Some(vec![]),
                },
            )
            .await
            .unwrap();

        let dispatcher = BackgroundDispatcher::new(orchestrator, 2);
        dispatcher.submit(query_id, "Jakie są warunki zawarcia umowy?".into());
        dispatcher.shutdown().await;

        let record = store.get_by_id(query_id, "user-1").await.unwrap().unwrap();
        assert!(record.accurate.is_some());
    }

    #[tokio::test]
    async fn submit_after_shutdown_does_not_panic() {
        let gateway = Arc::new(StubGateway);
        let index = Arc::new(StubIndex);
        let cache = Arc::new(InProcessCache::new(300));
        let store = Arc::new(InMemoryQueryStore::new());
        let metrics = Arc::new(Metrics::new());

        let orchestrator = Arc::new(Orchestrator::new(
            gateway,
            index,
            crate::assembler::AssemblerConfig::default(),
            cache,
            store,
            metrics.clone(),
            Config::default(),
        ));
        let dispatcher = BackgroundDispatcher::new(orchestrator, 1);
        dispatcher.shutdown().await;
    }
}
