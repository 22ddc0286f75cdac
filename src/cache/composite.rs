//! `CompositeCache`: preferred remote backend with an in-process fallback,
//! fanning every write out to both so a later remote outage doesn't turn
//! a previously-cached bundle into a miss.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::{ContextCache, InProcessCache, RemoteCache};
use crate::domain::RetrievalBundle;
use crate::error::CoreError;

pub struct CompositeCache {
    remote: RemoteCache,
    fallback: InProcessCache,
}

impl CompositeCache {
    pub fn new(remote: RemoteCache, fallback: InProcessCache) -> Self {
        Self { remote, fallback }
    }
}

#[async_trait]
impl ContextCache for CompositeCache {
    /// Remote failure degrades to the in-process fallback, never to an
    /// error the caller must handle.
    async fn get(&self, query_id: Uuid) -> Result<Option<RetrievalBundle>, CoreError> {
        match self.remote.get(query_id).await {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(error = %e, "remote cache unavailable, falling back to in-process");
                self.fallback.get(query_id).await
            }
        }
    }

    async fn put(&self, query_id: Uuid, bundle: RetrievalBundle) -> Result<(), CoreError> {
        if let Err(e) = self.remote.put(query_id, bundle.clone()).await {
            warn!(error = %e, "remote cache write failed, writing to in-process fallback instead");
        }
        // Always also populate the fallback so a subsequent remote outage
        // doesn't turn an already-written bundle into a miss.
        self.fallback.put(query_id, bundle).await
    }

    async fn delete(&self, query_id: Uuid) -> Result<(), CoreError> {
        if let Err(e) = self.remote.delete(query_id).await {
            warn!(error = %e, "remote cache delete failed");
        }
        self.fallback.delete(query_id).await
    }
}
