//! Bidirectional bounded-depth graph traversal over act-relation edges.
//! Explicit frontier queue and visited set, not recursion — the minimum
//! discovery depth per act is tracked as BFS naturally produces it, and
//! the visited set makes cycles and repeat visits a non-issue.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::relation::{Relation, RelationKind};

/// Returns the minimum depth at which each act (other than the seeds
/// themselves) was discovered, walking `depth` hops outward from `seeds`
/// along both `from_act -> to_act` and `to_act -> from_act` edges.
pub fn traverse(
    edges: &[Relation],
    seeds: &[String],
    depth: u8,
    kinds: Option<&[RelationKind]>,
) -> HashMap<String, u8> {
    let mut depths: HashMap<String, u8> = HashMap::new();
    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut frontier: VecDeque<(String, u8)> =
        seeds.iter().map(|s| (s.clone(), 0)).collect();

    while let Some((node, node_depth)) = frontier.pop_front() {
        if node_depth >= depth {
            continue;
        }
        for edge in edges {
            if let Some(kinds) = kinds {
                if !kinds.contains(&edge.kind) {
                    continue;
                }
            }
            let neighbor = if edge.from_act == node {
                &edge.to_act
            } else if edge.to_act == node {
                &edge.from_act
            } else {
                continue;
            };

            if visited.contains(neighbor) {
                continue;
            }
            visited.insert(neighbor.clone());
            let neighbor_depth = node_depth + 1;
            depths.insert(neighbor.clone(), neighbor_depth);
            frontier.push_back((neighbor.clone(), neighbor_depth));
        }
    }

    depths
}
