use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Source;
use crate::error::CoreError;

/// A trimmed, length-validated question. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question(String);

/// Minimum trimmed length, inclusive.
pub const MIN_QUESTION_LEN: usize = 10;
/// Maximum trimmed length, inclusive.
pub const MAX_QUESTION_LEN: usize = 1000;

impl Question {
    /// Trims `raw` and validates its length lands in `[MIN_QUESTION_LEN,
    /// MAX_QUESTION_LEN]`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len < MIN_QUESTION_LEN || len > MAX_QUESTION_LEN {
            return Err(CoreError::Validation(format!(
                "question length {len} outside [{MIN_QUESTION_LEN}, {MAX_QUESTION_LEN}]"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// One tier's populated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSlot {
    pub content: String,
    pub model_name: String,
    pub generation_ms: u64,
    /// Only ever set on the `fast` slot.
    pub sources: Option<Vec<Source>>,
}

/// The persistent unit owned by the query store.
///
/// Lifecycle: `initial` (both slots `None`) -> `fast-ready` (`fast` set) ->
/// `accurate-ready` (`accurate` also set). `accurate` may only be set once
/// `fast` is; `QueryStore::update_accurate` enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub question_text: String,
    pub created_at: DateTime<Utc>,
    pub fast: Option<ResponseSlot>,
    pub accurate: Option<ResponseSlot>,
}

impl QueryRecord {
    pub fn new(id: Uuid, user_id: String, question_text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            question_text,
            created_at,
            fast: None,
            accurate: None,
        }
    }
}
