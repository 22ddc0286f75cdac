//! Retrieval Index. Cosine-distance semantic search plus bounded-depth
//! graph traversal over the act-relation graph. The backing store is an
//! opaque contract; the only concrete implementation here is `RpcIndex`,
//! a thin JSON-RPC client.

pub mod rpc;
mod traversal;

use async_trait::async_trait;

use crate::domain::act::Act;
use crate::domain::chunk::Chunk;
use crate::domain::embedding::Embedding;
use crate::domain::relation::RelationKind;
use crate::error::CoreError;

pub use rpc::RpcIndex;

#[derive(Debug, Clone)]
pub struct SemanticSearchParams {
    pub query_embedding: Embedding,
    pub top_k: usize,
    pub distance_threshold: f32,
    pub act_id_filter: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct FetchRelatedActsParams {
    pub seed_act_ids: Vec<String>,
    pub depth: u8,
    pub relation_kinds: Option<Vec<RelationKind>>,
}

#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// The dimension this index's vectors natively use (e.g. 1024).
    /// Embeddings are reconciled to this before a search is issued.
    fn native_dim(&self) -> usize;

    /// Fails with `CoreError::NoRelevantActs` when the result count falls
    /// below the configured minimum-results floor — the system's deliberate
    /// refusal boundary.
    async fn semantic_search(
        &self,
        params: SemanticSearchParams,
        native_dim: usize,
        min_results: usize,
    ) -> Result<Vec<Chunk>, CoreError>;

    /// Empty `seed_act_ids` is a usage error (`CoreError::Validation`).
    async fn fetch_related_acts(
        &self,
        params: FetchRelatedActsParams,
    ) -> Result<Vec<Act>, CoreError>;
}
