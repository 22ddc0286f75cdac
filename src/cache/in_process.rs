//! In-process fallback cache backend, a `moka::future::Cache` with a
//! per-entry TTL, used rather than hand-rolling an expiry map.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use uuid::Uuid;

use super::ContextCache;
use crate::domain::RetrievalBundle;
use crate::error::CoreError;

pub struct InProcessCache {
    inner: Cache<Uuid, RetrievalBundle>,
}

impl InProcessCache {
    pub fn new(ttl_secs: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { inner }
    }
}

#[async_trait]
impl ContextCache for InProcessCache {
    async fn get(&self, query_id: Uuid) -> Result<Option<RetrievalBundle>, CoreError> {
        Ok(self.inner.get(&query_id).await)
    }

    async fn put(&self, query_id: Uuid, bundle: RetrievalBundle) -> Result<(), CoreError> {
        self.inner.insert(query_id, bundle).await;
        Ok(())
    }

    async fn delete(&self, query_id: Uuid) -> Result<(), CoreError> {
        self.inner.invalidate(&query_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bundle() -> RetrievalBundle {
        RetrievalBundle {
            chunks: vec![],
            related_acts: vec![],
            rendered_context: "ctx".to_string(),
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_get_within_ttl_returns_value() {
        let cache = InProcessCache::new(300);
        let id = Uuid::new_v4();
        cache.put(id, bundle()).await.unwrap();
        assert!(cache.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn miss_for_unknown_key() {
        let cache = InProcessCache::new(300);
        assert!(cache.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InProcessCache::new(300);
        let id = Uuid::new_v4();
        cache.put(id, bundle()).await.unwrap();
        cache.delete(id).await.unwrap();
        assert!(cache.get(id).await.unwrap().is_none());
    }
}
