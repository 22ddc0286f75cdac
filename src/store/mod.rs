//! Query Store. User-scoped CRUD over `QueryRecord`s.

pub mod in_memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::query_record::{QueryRecord, ResponseSlot};
use crate::error::CoreError;

pub use in_memory::InMemoryQueryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Newest,
    Oldest,
}

#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn create(&self, user_id: &str, question_text: String) -> Result<Uuid, CoreError>;

    async fn get_by_id(
        &self,
        query_id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueryRecord>, CoreError>;

    async fn list_by_user(
        &self,
        user_id: &str,
        page: usize,
        per_page: usize,
        order: SortOrder,
    ) -> Result<(Vec<QueryRecord>, usize), CoreError>;

    async fn update_fast(
        &self,
        query_id: Uuid,
        slot: ResponseSlot,
    ) -> Result<(), CoreError>;

    /// Fails if `fast` has not been populated yet: a record must reach
    /// `fast-ready` before it can reach `accurate-ready`.
    async fn update_accurate(
        &self,
        query_id: Uuid,
        slot: ResponseSlot,
    ) -> Result<(), CoreError>;

    async fn delete(&self, query_id: Uuid, user_id: &str) -> Result<bool, CoreError>;
}
