use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed small set of lifecycle states for a legal act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActStatus {
    InForce,
    Repealed,
    Replaced,
}

/// Denormalized act summary attached to every `Chunk` returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActSummary {
    pub id: String,
    pub title: String,
    pub publisher: String,
    pub year: u16,
    pub position: u32,
    pub status: ActStatus,
}

/// A legal act. Read-only for the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Act {
    pub id: String,
    pub title: String,
    pub publisher: String,
    pub year: u16,
    pub position: u32,
    pub status: ActStatus,
    pub enacted_on: Option<NaiveDate>,
    pub effective_on: Option<NaiveDate>,
    /// Minimum graph distance (in edges) from the traversal's seed set at
    /// which this act was discovered. `0` for a seed itself.
    pub depth: u8,
}
