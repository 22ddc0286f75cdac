use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Dense vector representation of text, used for cosine similarity search.
///
/// The system must accept both 768- and 1024-dimensional embeddings and
/// reconcile them to the dimension the index expects by zero-padding the
/// tail when the embedding is shorter than the index's native dimension.
/// A deliberate accommodation, not an accident of the embedding model mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

/// Dimensions accepted from the gateway before reconciliation, besides the
/// index's own native dimension.
const ACCEPTED_SOURCE_DIMS: &[usize] = &[768];

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Reconciles this embedding to `native_dim`, the index's canonical
    /// dimension. Accepts the embedding unchanged if it already matches,
    /// zero-pads the tail if it is 768-dimensional and `native_dim` is
    /// larger, and rejects anything else (e.g. a 512-dimensional vector).
    pub fn reconcile_to(mut self, native_dim: usize) -> Result<Self, CoreError> {
        if self.0.len() == native_dim {
            return Ok(self);
        }
        if ACCEPTED_SOURCE_DIMS.contains(&self.0.len()) && self.0.len() < native_dim {
            self.0.resize(native_dim, 0.0);
            return Ok(self);
        }
        Err(CoreError::Validation(format!(
            "embedding dimension {} cannot be reconciled to index dimension {native_dim}",
            self.0.len()
        )))
    }
}
