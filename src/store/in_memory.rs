//! `InMemoryQueryStore`: a `tokio::sync::RwLock<HashMap<..>>`-backed
//! reference implementation, sufficient for the core's own contract-level
//! tests. A production deployment supplies its own store backed by
//! whatever database the hosting service already uses.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QueryStore, SortOrder};
use crate::domain::query_record::{QueryRecord, ResponseSlot};
use crate::error::CoreError;

#[derive(Default)]
pub struct InMemoryQueryStore {
    records: RwLock<HashMap<Uuid, QueryRecord>>,
}

impl InMemoryQueryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryStore for InMemoryQueryStore {
    async fn create(&self, user_id: &str, question_text: String) -> Result<Uuid, CoreError> {
        let id = Uuid::new_v4();
        let record = QueryRecord::new(id, user_id.to_string(), question_text, Utc::now());
        self.records.write().await.insert(id, record);
        Ok(id)
    }

    async fn get_by_id(
        &self,
        query_id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueryRecord>, CoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(&query_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        page: usize,
        per_page: usize,
        order: SortOrder,
    ) -> Result<(Vec<QueryRecord>, usize), CoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<QueryRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();

        matching.sort_by_key(|r| r.created_at);
        if order == SortOrder::Newest {
            matching.reverse();
        }

        let total = matching.len();
        let start = page.saturating_mul(per_page).min(total);
        let end = (start + per_page).min(total);
        Ok((matching[start..end].to_vec(), total))
    }

    async fn update_fast(&self, query_id: Uuid, slot: ResponseSlot) -> Result<(), CoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&query_id)
            .ok_or_else(|| CoreError::Internal(format!("unknown query id {query_id}")))?;
        record.fast = Some(slot);
        Ok(())
    }

    async fn update_accurate(&self, query_id: Uuid, slot: ResponseSlot) -> Result<(), CoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&query_id)
            .ok_or_else(|| CoreError::Internal(format!("unknown query id {query_id}")))?;
        if record.fast.is_none() {
            return Err(CoreError::Validation(
                "cannot set accurate slot before fast slot is populated".into(),
            ));
        }
        record.accurate = Some(slot);
        Ok(())
    }

    async fn delete(&self, query_id: Uuid, user_id: &str) -> Result<bool, CoreError> {
        let mut records = self.records.write().await;
        if records.get(&query_id).map(|r| r.user_id.as_str()) == Some(user_id) {
            records.remove(&query_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> ResponseSlot {
        ResponseSlot {
            content: "answer".to_string(),
            model_name: "mistral:7b".to_string(),
            generation_ms: 100,
            sources: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryQueryStore::new();
        let id = store.create("user-1", "pytanie?".to_string()).await.unwrap();
        let record = store.get_by_id(id, "user-1").await.unwrap().unwrap();
        assert_eq!(record.question_text, "pytanie?");
        assert!(record.fast.is_none());
    }

    #[tokio::test]
    async fn get_by_id_scoped_to_user() {
        let store = InMemoryQueryStore::new();
        let id = store.create("user-1", "pytanie?".to_string()).await.unwrap();
        assert!(store.get_by_id(id, "user-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_accurate_before_fast_fails() {
        let store = InMemoryQueryStore::new();
        let id = store.create("user-1", "pytanie?".to_string()).await.unwrap();
        assert!(store.update_accurate(id, slot()).await.is_err());
    }

    #[tokio::test]
    async fn update_accurate_after_fast_succeeds() {
        let store = InMemoryQueryStore::new();
        let id = store.create("user-1", "pytanie?".to_string()).await.unwrap();
        store.update_fast(id, slot()).await.unwrap();
        store.update_accurate(id, slot()).await.unwrap();
        let record = store.get_by_id(id, "user-1").await.unwrap().unwrap();
        assert!(record.accurate.is_some());
    }

    #[tokio::test]
    async fn delete_is_user_scoped() {
        let store = InMemoryQueryStore::new();
        let id = store.create("user-1", "pytanie?".to_string()).await.unwrap();
        assert!(!store.delete(id, "user-2").await.unwrap());
        assert!(store.delete(id, "user-1").await.unwrap());
        assert!(store.get_by_id(id, "user-1").await.unwrap().is_none());
    }
}
