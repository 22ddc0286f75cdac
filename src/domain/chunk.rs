use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::act::ActSummary;

/// A single hit returned by `RetrievalIndex::semantic_search`, enriched with
/// a denormalized act summary. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub act_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub metadata: Option<JsonValue>,
    /// Cosine distance, range `0..2`; lower is closer.
    pub distance: f32,
    pub act: ActSummary,
}
