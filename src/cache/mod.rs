//! Context Cache. Key-value store of `RetrievalBundle`s keyed by query
//! id, with interchangeable out-of-process (preferred) and in-process
//! (fallback) backends.

pub mod composite;
pub mod in_process;
pub mod remote;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::RetrievalBundle;
use crate::error::CoreError;

pub use composite::CompositeCache;
pub use in_process::InProcessCache;
pub use remote::RemoteCache;

#[async_trait]
pub trait ContextCache: Send + Sync {
    async fn get(&self, query_id: Uuid) -> Result<Option<RetrievalBundle>, CoreError>;
    async fn put(&self, query_id: Uuid, bundle: RetrievalBundle) -> Result<(), CoreError>;
    async fn delete(&self, query_id: Uuid) -> Result<(), CoreError>;
}
