//! Out-of-process cache backend: a generic HTTP key-value client, keyed
//! `rag_context:{query_id}`. A shared `reqwest::Client` with scoped
//! per-call timeouts, rather than pulling in a store-specific client
//! crate for a backend whose concrete implementation is left open.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ContextCache;
use crate::domain::RetrievalBundle;
use crate::error::CoreError;

const CACHE_RW_TIMEOUT: Duration = Duration::from_millis(200);

pub struct RemoteCache {
    client: Client,
    base_url: String,
    ttl_secs: u64,
}

impl RemoteCache {
    pub fn new(base_url: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            ttl_secs,
        }
    }

    fn key(&self, query_id: Uuid) -> String {
        format!("rag_context:{query_id}")
    }
}

#[derive(Serialize)]
struct PutRequest<'a> {
    key: String,
    value: &'a RetrievalBundle,
    ttl_secs: u64,
}

#[derive(Deserialize)]
struct GetResponse {
    value: Option<RetrievalBundle>,
}

#[async_trait]
impl ContextCache for RemoteCache {
    /// Transport or server failure is surfaced as `CoreError::Storage` —
    /// absorbing it into a plain miss is `CompositeCache`'s job, not this
    /// backend's, so a caller using `RemoteCache` alone still sees the
    /// distinction between "no value" and "store unreachable".
    async fn get(&self, query_id: Uuid) -> Result<Option<RetrievalBundle>, CoreError> {
        let url = format!("{}/cache/{}", self.base_url, self.key(query_id));
        let resp = self
            .client
            .get(&url)
            .timeout(CACHE_RW_TIMEOUT)
            .send()
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(CoreError::Storage(format!(
                "remote cache get: http {}",
                resp.status()
            )));
        }

        let parsed: GetResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(parsed.value)
    }

    async fn put(&self, query_id: Uuid, bundle: RetrievalBundle) -> Result<(), CoreError> {
        let url = format!("{}/cache", self.base_url);
        let body = PutRequest {
            key: self.key(query_id),
            value: &bundle,
            ttl_secs: self.ttl_secs,
        };
        let resp = self
            .client
            .put(&url)
            .json(&body)
            .timeout(CACHE_RW_TIMEOUT)
            .send()
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CoreError::Storage(format!(
                "remote cache put: http {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn delete(&self, query_id: Uuid) -> Result<(), CoreError> {
        let url = format!("{}/cache/{}", self.base_url, self.key(query_id));
        let resp = self
            .client
            .delete(&url)
            .timeout(CACHE_RW_TIMEOUT)
            .send()
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::Storage(format!(
                "remote cache delete: http {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
