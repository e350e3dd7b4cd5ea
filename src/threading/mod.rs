//! Message threading module
//!
//! Turns the flat message list of a conversation, where each message carries
//! at most a pointer to the message it replies to, into an ordered,
//! depth-annotated reply forest.
//!
//! ## Threading Strategy
//!
//! 1. **Normalize**: every raw reply pointer becomes a [`ParentRef`] exactly
//!    once, at ingestion
//! 2. **Build**: [`Forest::build`] links replies to parents, treats dangling
//!    references as roots and breaks reference cycles
//! 3. **Serialize**: [`serialize`] / [`serialize_nested`] project the forest
//!    for rendering
//! 4. **Patch**: [`Forest::insert`] threads one freshly sent message into an
//!    existing forest
//!
//! [`get_thread_forest`] computes the same flat projection inside Postgres with
//! a recursive CTE when a thread is loaded in bulk.
//!
//! Sibling order is `(sent_at, id)` ascending in every path. Malformed data
//! never fails a build; only infrastructure errors propagate.
//!
//! ## Module Structure
//!
//! - `parent_ref`: reply pointer normalization
//! - `forest`: forest data structures and the bulk builder
//! - `cycle_detection`: cycle breaking policy
//! - `serializer`: flat and nested projections
//! - `incremental`: single-message insert
//! - `recursive_query`: database-side equivalent of build + serialize

mod cycle_detection;
pub mod error;
pub mod forest;
mod incremental;
pub mod parent_ref;
pub mod recursive_query;
pub mod serializer;

// Re-export main types and functions
pub use error::ThreadingError;
pub use forest::{Forest, ThreadNode};
pub use parent_ref::ParentRef;
pub use recursive_query::get_thread_forest;
pub use serializer::{
    MAX_NESTED_DEPTH, NestedNode, SerializedNode, check_nested_depth, nest, serialize,
    serialize_nested,
};
