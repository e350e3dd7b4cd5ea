//! Forest projections consumed by the rendering layer
//!
//! Two shapes are produced from the same pre-order walk:
//!
//! - [`SerializedNode`]: flat, each node followed immediately by its subtree,
//!   with `depth` for indentation and `childIds` for structure
//! - [`NestedNode`]: recursive nesting for consumers that render trees
//!
//! The nested form is built from the flat one, so both always agree on
//! identity, depth and order. Building, walking and dropping either form never
//! recurses, so thread depth is not limited by the call stack.
//!
//! Encoding is different: serde's derived `Serialize` descends one stack frame
//! group per nesting level. Flat output has constant depth and is always safe
//! to encode. Nested output is only handed to an encoder after
//! [`check_nested_depth`] has accepted it; deeper threads are served flat.

use std::collections::HashMap;

use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::ThreadingError;
use super::forest::{Forest, ThreadNode};
use crate::models::Message;

/// One message in pre-order position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: i64,
    pub depth: i32,
    pub message: Message,
    pub child_ids: Vec<i64>,
}

impl From<&ThreadNode> for SerializedNode {
    fn from(node: &ThreadNode) -> Self {
        SerializedNode {
            id: node.id(),
            depth: node.depth,
            message: node.message.clone(),
            child_ids: node.children.clone(),
        }
    }
}

/// Deepest node depth allowed in nested output, exclusive. Encoding a tree of
/// this height fits comfortably in a 2 MiB worker stack.
pub const MAX_NESTED_DEPTH: i32 = 256;

/// One message with its replies nested below it.
///
/// The derived `Serialize`, `Debug`, `Clone` and `PartialEq` recurse; keep
/// them to trees accepted by [`check_nested_depth`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NestedNode {
    pub message: Message,
    pub depth: i32,
    pub children: Vec<NestedNode>,
}

impl Drop for NestedNode {
    fn drop(&mut self) {
        // detach descendants so each node drops with no children left
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Pre-order iterator over a forest: roots in order, each followed by its
/// subtree. Uses an explicit stack.
pub struct PreOrder<'a> {
    forest: &'a Forest,
    stack: Vec<i64>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a ThreadNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.forest.get(id) {
                // reversed so the first child is popped next
                self.stack.extend(node.children.iter().rev());
                return Some(node);
            }
        }
        None
    }
}

impl Forest {
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            forest: self,
            stack: self.roots().iter().rev().copied().collect(),
        }
    }
}

/// Flat pre-order projection of a forest.
pub fn serialize(forest: &Forest) -> Vec<SerializedNode> {
    forest.pre_order().map(SerializedNode::from).collect()
}

/// Nested projection of a forest.
pub fn serialize_nested(forest: &Forest) -> Vec<NestedNode> {
    nest(serialize(forest))
}

/// Reject pre-ordered nodes too deep to encode as nested JSON.
pub fn check_nested_depth(flat: &[SerializedNode]) -> Result<(), ThreadingError> {
    match flat.iter().map(|node| node.depth).max() {
        Some(depth) if depth >= MAX_NESTED_DEPTH => Err(ThreadingError::TooDeepToNest {
            depth,
            limit: MAX_NESTED_DEPTH,
        }),
        _ => Ok(()),
    }
}

/// Turn a flat pre-order sequence into nested trees.
///
/// Works for any well-formed pre-order input, including the rows returned by
/// the recursive thread query. Nodes are assembled back to front: every child
/// follows its parent in pre-order, so by the time a parent is reached all of
/// its children are already built.
pub fn nest(flat: Vec<SerializedNode>) -> Vec<NestedNode> {
    let root_ids: Vec<i64> = flat
        .iter()
        .filter(|node| node.depth == 0)
        .map(|node| node.id)
        .collect();

    let mut built: HashMap<i64, NestedNode> = HashMap::with_capacity(flat.len());
    for node in flat.into_iter().rev() {
        let children = node
            .child_ids
            .iter()
            .filter_map(|child_id| built.remove(child_id))
            .collect();
        built.insert(
            node.id,
            NestedNode {
                message: node.message,
                depth: node.depth,
                children,
            },
        );
    }

    root_ids
        .into_iter()
        .filter_map(|id| built.remove(&id))
        .collect()
}
