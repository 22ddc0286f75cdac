//! `RpcIndex`: a thin `reqwest` JSON client against two RPC-style endpoints
//! backing the retrieval index. The wire format is this crate's own
//! choice, since the backing store is an opaque contract; every call
//! goes over the wire, no hard-coded stand-in distances.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traversal::traverse;
use super::{FetchRelatedActsParams, RetrievalIndex, SemanticSearchParams};
use crate::domain::act::{Act, ActStatus};
use crate::domain::chunk::Chunk;
use crate::domain::relation::Relation;
use crate::error::CoreError;

pub struct RpcIndex {
    client: Client,
    semantic_search_url: String,
    related_acts_url: String,
}

impl RpcIndex {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            semantic_search_url: format!("{base_url}/rpc/semantic_search"),
            related_acts_url: format!("{base_url}/rpc/fetch_related_acts"),
        }
    }
}

#[derive(Serialize)]
struct SemanticSearchRequest<'a> {
    query_embedding: &'a [f32],
    top_k: usize,
    distance_threshold: f32,
    act_id_filter: &'a Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SemanticSearchResponse {
    chunks: Vec<Chunk>,
}

#[derive(Serialize)]
struct RelatedActsRequest<'a> {
    seed_act_ids: &'a [String],
    depth: u8,
}

#[derive(Deserialize)]
struct RelatedActsResponse {
    edges: Vec<Relation>,
    acts: Vec<ActRecord>,
}

#[derive(Deserialize)]
struct ActRecord {
    id: String,
    title: String,
    publisher: String,
    year: u16,
    position: u32,
    status: ActStatus,
    enacted_on: Option<NaiveDate>,
    effective_on: Option<NaiveDate>,
}

#[async_trait]
impl RetrievalIndex for RpcIndex {
    async fn semantic_search(
        &self,
        params: SemanticSearchParams,
        native_dim: usize,
        min_results: usize,
    ) -> Result<Vec<Chunk>, CoreError> {
        let embedding = params.query_embedding.reconcile_to(native_dim)?;
        let body = SemanticSearchRequest {
            query_embedding: embedding.as_slice(),
            top_k: params.top_k,
            distance_threshold: params.distance_threshold,
            act_id_filter: &params.act_id_filter,
        };

        let resp = self
            .client
            .post(&self.semantic_search_url)
            .json(&body)
            .send()
            .await
            .map_err(CoreError::from)?;

        if !resp.status().is_success() {
            return Err(CoreError::Storage(format!(
                "semantic_search: http {}",
                resp.status()
            )));
        }

        let mut parsed: SemanticSearchResponse = resp.json().await.map_err(CoreError::from)?;
        // Store-side distance is cosine, range 0..2; keep the core's own
        // ordering/threshold/cap guarantees rather than trusting the store.
        parsed
            .chunks
            .sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        parsed.chunks.retain(|c| c.distance < params.distance_threshold);
        parsed.chunks.truncate(params.top_k);

        if parsed.chunks.len() < min_results {
            return Err(CoreError::NoRelevantActs);
        }

        Ok(parsed.chunks)
    }

    async fn fetch_related_acts(
        &self,
        params: FetchRelatedActsParams,
    ) -> Result<Vec<Act>, CoreError> {
        if params.seed_act_ids.is_empty() {
            return Err(CoreError::Validation(
                "seed_act_ids must not be empty".into(),
            ));
        }
        if !(1..=2).contains(&params.depth) {
            return Err(CoreError::Validation(format!(
                "depth must be 1 or 2, got {}",
                params.depth
            )));
        }

        let body = RelatedActsRequest {
            seed_act_ids: &params.seed_act_ids,
            depth: params.depth,
        };

        let resp = self
            .client
            .post(&self.related_acts_url)
            .json(&body)
            .send()
            .await
            .map_err(CoreError::from)?;

        if !resp.status().is_success() {
            return Err(CoreError::Storage(format!(
                "fetch_related_acts: http {}",
                resp.status()
            )));
        }

        let parsed: RelatedActsResponse = resp.json().await.map_err(CoreError::from)?;

        // Traversal is plain in-process graph code over the edges the RPC
        // returned, not delegated to the remote side — depth semantics are
        // this crate's contract to uphold regardless of the store.
        let depths = traverse(
            &parsed.edges,
            &params.seed_act_ids,
            params.depth,
            params.relation_kinds.as_deref(),
        );

        let mut acts: Vec<Act> = parsed
            .acts
            .into_iter()
            .filter_map(|record| {
                depths.get(&record.id).map(|&depth| Act {
                    id: record.id,
                    title: record.title,
                    publisher: record.publisher,
                    year: record.year,
                    position: record.position,
                    status: record.status,
                    enacted_on: record.enacted_on,
                    effective_on: record.effective_on,
                    depth,
                })
            })
            .collect();

        acts.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
        Ok(acts)
    }
}
