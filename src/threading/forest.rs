//! Reply forest data structures and the bulk builder
//!
//! A [`Forest`] is the reply structure of one conversation thread: a set of
//! disjoint trees keyed by message id. Nodes refer to each other by id, the
//! same way the id table of a threading pass does, so patching one node never
//! requires touching the others.
//!
//! ## Build Steps
//!
//! 1. **Nodes**: one [`ThreadNode`] per message
//! 2. **Link**: attach each message to its parent when the parent is present;
//!    otherwise (root or dangling reference) it becomes a root
//! 3. **Break cycles**: demote one member of every reference cycle to root
//! 4. **Depth**: assign depth from the roots down
//!
//! Sibling order is `(sent_at, id)` ascending everywhere. Linking walks the
//! messages in that order, so every child list and the root list come out
//! sorted without a separate sort pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::cycle_detection::break_reference_cycles;
use super::error::ThreadingError;
use crate::models::Message;

/// Ordering key shared by siblings, roots and the recursive query's path.
pub type SiblingKey = (DateTime<Utc>, i64);

pub fn sibling_key(message: &Message) -> SiblingKey {
    (message.sent_at, message.id)
}

/// A message placed in the reply forest.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadNode {
    /// The message as loaded; `message.parent_ref` keeps the normalized pointer.
    pub message: Message,

    /// Id of the node this one hangs under, `None` for roots. Differs from
    /// `message.parent_ref` for dangling references and demoted cycle members.
    pub parent: Option<i64>,

    /// Child ids ordered by `(sent_at, id)`.
    pub children: Vec<i64>,

    /// 0 for roots, parent depth + 1 otherwise.
    pub depth: i32,
}

impl ThreadNode {
    pub(crate) fn new(message: Message) -> Self {
        ThreadNode {
            message,
            parent: None,
            children: Vec::new(),
            depth: 0,
        }
    }

    pub fn id(&self) -> i64 {
        self.message.id
    }

    pub fn sibling_key(&self) -> SiblingKey {
        sibling_key(&self.message)
    }
}

/// Ordered reply forest for one thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    pub(crate) roots: Vec<i64>,
    pub(crate) by_id: HashMap<i64, ThreadNode>,
}

impl Forest {
    /// Build a forest from the flat message list of one thread.
    ///
    /// Never fails: dangling references become roots and reference cycles are
    /// broken. Messages are not filtered by thread; see [`Forest::build_for_thread`].
    /// When two records share an id the later one wins.
    pub fn build(messages: Vec<Message>) -> Forest {
        let message_count = messages.len();
        let mut by_id: HashMap<i64, ThreadNode> = HashMap::with_capacity(message_count);

        for message in messages {
            let id = message.id;
            if by_id.insert(id, ThreadNode::new(message)).is_some() {
                log::warn!("duplicate message id {} in thread input, keeping the later record", id);
            }
        }

        let visit_order = ordered_ids(&by_id);

        link_parents(&mut by_id, &visit_order);

        let demoted = break_reference_cycles(&mut by_id, &visit_order);
        if demoted > 0 {
            log::warn!("broke {} reference cycle(s) while threading {} messages", demoted, by_id.len());
        }

        let roots: Vec<i64> = visit_order
            .iter()
            .copied()
            .filter(|id| by_id.get(id).is_some_and(|node| node.parent.is_none()))
            .collect();

        let mut forest = Forest { roots, by_id };
        forest.assign_depths();

        log::debug!(
            "built forest: {} messages, {} roots, {} cycle demotions",
            forest.len(),
            forest.roots.len(),
            demoted
        );

        forest
    }

    /// Like [`Forest::build`], but rejects messages from another thread
    /// instead of threading them together.
    pub fn build_for_thread(thread_id: i64, messages: Vec<Message>) -> Result<Forest, ThreadingError> {
        if let Some(stray) = messages.iter().find(|message| message.thread_id != thread_id) {
            return Err(ThreadingError::CrossThread {
                expected: thread_id,
                found: stray.thread_id,
                message_id: stray.id,
            });
        }

        Ok(Forest::build(messages))
    }

    /// Root ids in `(sent_at, id)` order.
    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    pub fn get(&self, id: i64) -> Option<&ThreadNode> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &ThreadNode> {
        self.by_id.values()
    }

    /// Ordered children of `id` (empty for unknown ids).
    pub fn children_of(&self, id: i64) -> &[i64] {
        self.by_id
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Set depths top-down with an explicit stack.
    fn assign_depths(&mut self) {
        let mut stack: Vec<(i64, i32)> = self.roots.iter().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            if let Some(node) = self.by_id.get_mut(&id) {
                node.depth = depth;
                stack.extend(node.children.iter().map(|child| (*child, depth + 1)));
            }
        }
    }
}

/// Message ids sorted by sibling key.
fn ordered_ids(by_id: &HashMap<i64, ThreadNode>) -> Vec<i64> {
    let mut keyed: Vec<SiblingKey> = by_id.values().map(ThreadNode::sibling_key).collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, id)| id).collect()
}

/// Attach every node whose parent is present. Walking in sibling order keeps
/// each child list sorted.
fn link_parents(by_id: &mut HashMap<i64, ThreadNode>, visit_order: &[i64]) {
    for &id in visit_order {
        let parent = by_id
            .get(&id)
            .and_then(|node| node.message.parent_ref.id())
            .filter(|parent_id| by_id.contains_key(parent_id));

        let Some(parent_id) = parent else {
            continue;
        };

        if let Some(node) = by_id.get_mut(&id) {
            node.parent = Some(parent_id);
        }
        if let Some(parent_node) = by_id.get_mut(&parent_id) {
            parent_node.children.push(id);
        }
    }
}
