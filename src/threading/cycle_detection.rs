//! Cycle breaking for the reply forest
//!
//! Reply pointers are not validated against cycles by every write path, and
//! bulk data written before validation existed may contain them. A cycle would
//! leave its members unreachable from any root, so they would never render.
//!
//! ## Policy
//!
//! Every node has at most one parent, so each weakly connected component
//! contains at most one cycle. Of each cycle, the member that comes first in
//! `(sent_at, id)` order is demoted to a root: its parent link is cleared and
//! it is removed from the parent's child list. Each cycle costs exactly one
//! demotion and the earliest message of a pure cycle becomes its root.
//!
//! ```text
//! 1 -> 2 -> 3 -> 1   (each names the next as parent)
//!
//! earliest member is 1, demote it
//! result:  1 <- 3 <- 2        (1 is a root, 3 its child, 2 below 3)
//! ```
//!
//! ## Walk
//!
//! Nodes are walked up their parent links in visit order, colouring each node
//! the first time it is seen. A walk stops at a root, at a node finished by an
//! earlier walk, or at a node already on its own path, which closes a cycle.
//! Every node is put on a path once, so the pass is linear in the node count.

use std::collections::HashMap;

use super::forest::ThreadNode;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the path of the walk in progress, at this index.
    OnPath(usize),
    /// Its ancestor chain has been resolved.
    Finished,
}

/// Demote one member of every reference cycle. Returns the number of demotions.
///
/// `visit_order` must contain every key of `by_id`; the member of a cycle that
/// comes first in it is the one demoted.
pub fn break_reference_cycles(by_id: &mut HashMap<i64, ThreadNode>, visit_order: &[i64]) -> usize {
    let rank: HashMap<i64, usize> = visit_order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();
    let mut marks: HashMap<i64, Mark> = HashMap::with_capacity(visit_order.len());
    let mut demoted = 0;

    for &start in visit_order {
        if marks.contains_key(&start) {
            continue;
        }

        let mut path: Vec<i64> = Vec::new();
        let mut current = Some(start);

        while let Some(id) = current {
            match marks.get(&id) {
                Some(Mark::Finished) => break,
                Some(Mark::OnPath(index)) => {
                    let members = &path[*index..];
                    let earliest = members
                        .iter()
                        .copied()
                        .min_by_key(|member| rank.get(member).copied().unwrap_or(usize::MAX));
                    if let Some(earliest) = earliest {
                        demote_to_root(by_id, earliest);
                        demoted += 1;
                    }
                    break;
                }
                None => {
                    marks.insert(id, Mark::OnPath(path.len()));
                    path.push(id);
                    current = by_id.get(&id).and_then(|node| node.parent);
                }
            }
        }

        for id in path {
            marks.insert(id, Mark::Finished);
        }
    }

    demoted
}

fn demote_to_root(by_id: &mut HashMap<i64, ThreadNode>, id: i64) {
    let Some(parent_id) = by_id.get_mut(&id).and_then(|node| node.parent.take()) else {
        return;
    };

    log::warn!(
        "message {} is its own ancestor via parent {}, treating it as a root",
        id,
        parent_id
    );

    if let Some(parent) = by_id.get_mut(&parent_id) {
        parent.children.retain(|child| *child != id);
    }
}
