//! Data model shared across every component.
//!
//! All wire-facing types derive `Serialize`/`Deserialize` explicitly rather
//! than passing loosely-typed JSON bags between components.

pub mod act;
pub mod chunk;
pub mod embedding;
pub mod query_record;
pub mod relation;
pub mod source;

pub use act::{Act, ActStatus, ActSummary};
pub use chunk::Chunk;
pub use embedding::Embedding;
pub use query_record::{Question, QueryRecord, ResponseSlot};
pub use relation::{Relation, RelationKind};
pub use source::Source;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retrieval context produced by the fast pipeline and consumed (possibly
/// more than once before expiry) by the accurate pipeline. Owned exclusively
/// by the context cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalBundle {
    pub chunks: Vec<Chunk>,
    pub related_acts: Vec<Act>,
    pub rendered_context: String,
    pub cached_at: DateTime<Utc>,
}
