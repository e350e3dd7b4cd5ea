//! Incremental threading support
//!
//! When a message is sent from the compose box it is shown right away, before
//! the next poll reloads the thread. Rebuilding the whole forest for that one
//! message is wasteful and would hand the view a fresh set of nodes, so the new
//! message is patched into the existing forest instead.
//!
//! ## Guarantees
//!
//! - Only the new node, and either its parent's child list or the root list,
//!   change. Every other node is left untouched.
//! - The result matches what [`Forest::build`] would produce for the old
//!   messages plus the new one, as long as no loaded message already points at
//!   the new id. That holds for freshly created messages: nothing can reference
//!   an id before the store has assigned it.
//! - No cycle check is needed for the same reason. The write path rejects
//!   parents that do not exist yet, which rules out self references.
//!
//! The patched forest is temporary; the next full reload replaces it.

use std::collections::HashMap;

use super::forest::{Forest, SiblingKey, ThreadNode, sibling_key};
use crate::models::Message;

impl Forest {
    /// Thread one new message into the forest and return its node.
    ///
    /// Replies to a loaded message go under that message; roots and replies
    /// to anything outside the loaded set become roots. If the id is already
    /// present the forest is left as is.
    pub fn insert(&mut self, message: Message) -> &ThreadNode {
        let id = message.id;

        if self.by_id.contains_key(&id) {
            log::debug!("message {} is already threaded, keeping existing node", id);
        } else {
            let node = self.attach(message);
            self.by_id.insert(id, node);
        }

        &self.by_id[&id]
    }

    /// Link a new node into its parent's child list (or the root list) at
    /// its sorted position.
    fn attach(&mut self, message: Message) -> ThreadNode {
        let id = message.id;
        let key = sibling_key(&message);
        let parent = message
            .parent_ref
            .id()
            .and_then(|parent_id| self.by_id.get(&parent_id).map(|node| (parent_id, node.depth)));

        let mut node = ThreadNode::new(message);

        match parent {
            Some((parent_id, parent_depth)) => {
                let position = self
                    .by_id
                    .get(&parent_id)
                    .map(|parent_node| sorted_position(&self.by_id, &parent_node.children, key))
                    .unwrap_or_default();
                if let Some(parent_node) = self.by_id.get_mut(&parent_id) {
                    parent_node.children.insert(position, id);
                }
                node.parent = Some(parent_id);
                node.depth = parent_depth + 1;
            }
            None => {
                let position = sorted_position(&self.by_id, &self.roots, key);
                self.roots.insert(position, id);
            }
        }

        node
    }
}

/// Binary search for the slot that keeps `siblings` ordered by sibling key.
fn sorted_position(by_id: &HashMap<i64, ThreadNode>, siblings: &[i64], key: SiblingKey) -> usize {
    siblings.partition_point(|sibling| {
        by_id
            .get(sibling)
            .is_some_and(|node| node.sibling_key() < key)
    })
}
