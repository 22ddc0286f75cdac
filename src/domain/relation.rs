use serde::{Deserialize, Serialize};

/// Fixed set of edge labels in the act-relation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Modifies,
    Repeals,
    Implements,
    BasedOn,
    Amends,
}

/// A directed edge between two acts. Traversal over these is bidirectional
/// on request (§4.2): both this edge's `to_act` from `from_act` and, when
/// walking in reverse, `from_act` from `to_act` are followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from_act: String,
    pub to_act: String,
    pub kind: RelationKind,
}
