//! Contract-level coverage for `RetrievalIndex` implementers: ascending-
//! distance ordering, threshold filtering, top-k capping, and the
//! `NoRelevantActs` refusal boundary below the configured minimum. A
//! reference implementation exercises exactly the post-processing
//! `RpcIndex` performs on whatever its backing store returns.

use async_trait::async_trait;
use iuris::domain::{Act, ActStatus, ActSummary, Chunk};
use iuris::error::CoreError;
use iuris::index::{FetchRelatedActsParams, RetrievalIndex, SemanticSearchParams};

struct ReferenceIndex {
    candidates: Vec<Chunk>,
}

#[async_trait]
impl RetrievalIndex for ReferenceIndex {
    fn native_dim(&self) -> usize {
        1024
    }

    async fn semantic_search(
        &self,
        params: SemanticSearchParams,
        _native_dim: usize,
        min_results: usize,
    ) -> Result<Vec<Chunk>, CoreError> {
        let mut chunks = self.candidates.clone();
        chunks.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        chunks.retain(|c| c.distance < params.distance_threshold);
        chunks.truncate(params.top_k);
        if chunks.len() < min_results {
            return Err(CoreError::NoRelevantActs);
        }
        Ok(chunks)
    }

    async fn fetch_related_acts(&self, params: FetchRelatedActsParams) -> Result<Vec<Act>, CoreError> {
        if params.seed_act_ids.is_empty() {
            return Err(CoreError::Validation("seed_act_ids must not be empty".into()));
        }
        if !(1..=2).contains(&params.depth) {
            return Err(CoreError::Validation(format!("depth must be 1 or 2, got {}", params.depth)));
        }
        Ok(vec![])
    }
}

fn chunk(id: &str, distance: f32) -> Chunk {
    Chunk {
        id: id.to_string(),
        act_id: "act-1".to_string(),
        chunk_index: 0,
        content: "treść".to_string(),
        metadata: None,
        distance,
        act: ActSummary {
            id: "act-1".to_string(),
            title: "Ustawa".to_string(),
            publisher: "Dz.U.".to_string(),
            year: 2010,
            position: 1,
            status: ActStatus::InForce,
        },
    }
}

fn search_params(top_k: usize, threshold: f32) -> SemanticSearchParams {
    SemanticSearchParams {
        query_embedding: iuris::domain::Embedding::new(vec![0.1; 1024]),
        top_k,
        distance_threshold: threshold,
        act_id_filter: None,
    }
}

#[tokio::test]
async fn results_are_returned_in_ascending_distance_order() {
    let index = ReferenceIndex {
        candidates: vec![chunk("c", 0.5), chunk("a", 0.1), chunk("b", 0.3)],
    };
    let chunks = index.semantic_search(search_params(10, 1.0), 1024, 0).await.unwrap();
    assert_eq!(chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn distance_threshold_excludes_distant_chunks() {
    let index = ReferenceIndex {
        candidates: vec![chunk("near", 0.2), chunk("far", 0.9)],
    };
    let chunks = index.semantic_search(search_params(10, 0.5), 1024, 0).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "near");
}

#[tokio::test]
async fn top_k_caps_the_result_count() {
    let candidates = (0..20).map(|i| chunk(&format!("c{i}"), i as f32 * 0.01)).collect();
    let index = ReferenceIndex { candidates };
    let chunks = index.semantic_search(search_params(5, 2.0), 1024, 0).await.unwrap();
    assert_eq!(chunks.len(), 5);
}

#[tokio::test]
async fn fewer_than_min_results_refuses_with_no_relevant_acts() {
    let index = ReferenceIndex {
        candidates: vec![chunk("a", 0.1)],
    };
    let err = index.semantic_search(search_params(10, 1.0), 1024, 3).await.unwrap_err();
    assert!(matches!(err, CoreError::NoRelevantActs));
}

#[tokio::test]
async fn fetch_related_acts_rejects_empty_seeds() {
    let index = ReferenceIndex { candidates: vec![] };
    let err = index
        .fetch_related_acts(FetchRelatedActsParams {
            seed_act_ids: vec![],
            depth: 2,
            relation_kinds: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn fetch_related_acts_rejects_out_of_range_depth() {
    let index = ReferenceIndex { candidates: vec![] };
    for depth in [0u8, 3u8] {
        let err = index
            .fetch_related_acts(FetchRelatedActsParams {
                seed_act_ids: vec!["act-1".to_string()],
                depth,
                relation_kinds: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
