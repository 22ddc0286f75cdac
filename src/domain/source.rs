use serde::{Deserialize, Serialize};

/// A citation extracted from the chunks that were placed in context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub act_title: String,
    pub article_label: String,
    pub external_link: String,
    pub chunk_id: String,
}
