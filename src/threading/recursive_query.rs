//! Database-side thread reconstruction
//!
//! Loads a whole thread as a depth-annotated, pre-ordered forest with a single
//! recursive CTE instead of one query per level.
//!
//! ## Query Shape
//!
//! 1. **Anchor**: rows that [`Forest::build`](super::Forest::build) would make
//!    roots: parent `NULL` or `0`, a parent pointing at the row itself, or a
//!    parent that is not a message of the same thread (dangling)
//! 2. **Recursive step**: rows whose parent is an already selected row, with
//!    `depth + 1`
//! 3. **Paths**: every row carries `sort_path`, the `(sent_at µs, id)` pairs of
//!    its ancestors and itself, and `id_path`, the ids on the way down. Ordering
//!    by `sort_path` yields pre-order with siblings by `(sent_at, id)`, exactly
//!    like the in-memory serializer. `id_path` keeps a row from being joined
//!    into its own branch twice.
//!
//! The statement also counts the thread's rows. Rows only go unreached when the
//! stored references contain a cycle; in that case we fall back to the
//! in-memory builder, which knows how to break cycles, within the same
//! read-only snapshot.

use std::collections::HashMap;

use rocket_db_pools::sqlx::{self, FromRow, PgPool};

use super::forest::Forest;
use super::serializer::{SerializedNode, serialize};
use crate::models::{Message, MessageRow};
use crate::store::fetch_thread_messages;

const THREAD_FOREST_SQL: &str = r#"
WITH RECURSIVE thread_rows AS (
    SELECT id, thread_id, parent_id, sender, content, is_outbound, sent_at, created_at,
           (EXTRACT(EPOCH FROM sent_at) * 1000000)::BIGINT AS sent_micros
    FROM messages
    WHERE thread_id = $1
),
tree AS (
    SELECT r.id, r.thread_id, r.parent_id, r.sender, r.content, r.is_outbound,
           r.sent_at, r.created_at,
           NULL::BIGINT AS tree_parent,
           0 AS depth,
           ARRAY[r.sent_micros, r.id] AS sort_path,
           ARRAY[r.id] AS id_path
    FROM thread_rows r
    WHERE r.parent_id IS NULL
       OR r.parent_id = 0
       OR r.parent_id = r.id
       OR NOT EXISTS (SELECT 1 FROM thread_rows p WHERE p.id = r.parent_id)

    UNION ALL

    SELECT c.id, c.thread_id, c.parent_id, c.sender, c.content, c.is_outbound,
           c.sent_at, c.created_at,
           t.id,
           t.depth + 1,
           t.sort_path || ARRAY[c.sent_micros, c.id],
           t.id_path || c.id
    FROM thread_rows c
    JOIN tree t ON c.parent_id = t.id
    WHERE NOT c.id = ANY(t.id_path)
)
SELECT id, thread_id, parent_id, sender, content, is_outbound, sent_at, created_at,
       tree_parent,
       depth,
       (SELECT COUNT(*) FROM thread_rows) AS thread_size
FROM tree
ORDER BY sort_path
"#;

#[derive(Debug, FromRow)]
struct ForestRow {
    #[sqlx(flatten)]
    message: MessageRow,
    tree_parent: Option<i64>,
    depth: i32,
    thread_size: i64,
}

/// Load a thread's forest in pre-order, computed by the database.
///
/// Produces the same `(id, depth, child_ids)` sequence as
/// `serialize(&Forest::build(messages))` over the thread's stored rows.
/// Unknown threads yield an empty list.
pub async fn get_thread_forest(pool: &PgPool, thread_id: i64) -> Result<Vec<SerializedNode>, sqlx::Error> {
    let start_time = std::time::Instant::now();

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let rows: Vec<ForestRow> = sqlx::query_as(THREAD_FOREST_SQL)
        .bind(thread_id)
        .fetch_all(&mut *tx)
        .await?;

    // No anchor row at all still means a cycle if the thread has messages
    let thread_size = match rows.first() {
        Some(row) => row.thread_size,
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE thread_id = $1")
                .bind(thread_id)
                .fetch_one(&mut *tx)
                .await?
        }
    };
    let reached = rows.len() as i64;

    let nodes = if reached < thread_size {
        log::warn!(
            "thread {}: {} of {} messages unreachable from any root (reference cycle), rebuilding in memory",
            thread_id,
            thread_size - reached,
            thread_size
        );
        let messages = fetch_thread_messages(&mut *tx, thread_id).await?;
        serialize(&Forest::build(messages))
    } else {
        assemble_nodes(rows)
    };

    tx.commit().await?;

    log::debug!(
        "thread {} forest loaded: {} nodes in {:.2}ms (recursive CTE)",
        thread_id,
        nodes.len(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    Ok(nodes)
}

/// Turn pre-ordered rows into serialized nodes, filling in child lists.
/// Parents precede their children, so each child is appended to an already
/// emitted node and sibling order is preserved.
fn assemble_nodes(rows: Vec<ForestRow>) -> Vec<SerializedNode> {
    let mut nodes: Vec<SerializedNode> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(rows.len());

    for row in rows {
        let message = Message::from(row.message);
        let id = message.id;

        if let Some(parent_position) = row.tree_parent.and_then(|parent| positions.get(&parent)) {
            nodes[*parent_position].child_ids.push(id);
        }

        positions.insert(id, nodes.len());
        nodes.push(SerializedNode {
            id,
            depth: row.depth,
            message,
            child_ids: Vec::new(),
        });
    }

    nodes
}
