//! Postgres-backed message storage.
//!
//! This is the storage collaborator of the threading core: it hands out the
//! flat message list of a thread and appends new messages. Reply pointers are
//! normalized on the way in (request bodies deserialize into
//! [`ParentRef`](crate::threading::ParentRef)) and on the way out (legacy `0`
//! columns read back as roots), so callers never see a raw pointer.

use chrono::Utc;
use rocket_db_pools::sqlx::{self, PgPool, Postgres};
use thiserror::Error;

use crate::models::{Message, MessageRow, NewMessage, NewThread, Thread};
use crate::threading::{ParentRef, SerializedNode, get_thread_forest};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("thread {0} not found")]
    ThreadNotFound(i64),
    #[error("parent message {parent_id} does not exist in thread {thread_id}")]
    UnknownParent { thread_id: i64, parent_id: i64 },
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const MESSAGE_COLUMNS: &str =
    "id, thread_id, parent_id, sender, content, is_outbound, sent_at, created_at";

const THREAD_SELECT: &str = r#"
    SELECT t.id, t.platform, t.external_id, t.title, t.created_at, t.last_message_at,
           (SELECT COUNT(*) FROM messages m WHERE m.thread_id = t.id) AS message_count
    FROM threads t
"#;

/// Load every message of a thread, normalized, in storage order.
///
/// The order is only a convenience; threading sorts on its own.
pub async fn fetch_thread_messages<'e, E>(executor: E, thread_id: i64) -> Result<Vec<Message>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM messages WHERE thread_id = $1 ORDER BY sent_at ASC, id ASC",
        MESSAGE_COLUMNS
    );

    let rows = sqlx::query_as::<_, MessageRow>(&query)
        .bind(thread_id)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(Message::from).collect())
}

#[derive(Debug, Clone)]
pub struct MessageStore {
    pool: PgPool,
}

impl MessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Register a conversation ingested from an external platform.
    pub async fn create_thread(&self, new_thread: &NewThread) -> StoreResult<Thread> {
        let platform = new_thread.platform.trim();
        if platform.is_empty() {
            return Err(StoreError::Invalid("platform must not be empty".to_string()));
        }

        let thread_id: i64 = sqlx::query_scalar(
            "INSERT INTO threads (platform, external_id, title) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(platform)
        .bind(new_thread.external_id.as_deref())
        .bind(new_thread.title.as_deref())
        .fetch_one(&self.pool)
        .await?;

        log::info!("created thread {} for platform {}", thread_id, platform);

        self.get_thread(thread_id).await
    }

    pub async fn get_thread(&self, thread_id: i64) -> StoreResult<Thread> {
        let query = format!("{} WHERE t.id = $1", THREAD_SELECT);

        sqlx::query_as::<_, Thread>(&query)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::ThreadNotFound(thread_id))
    }

    /// Threads ordered by most recent activity.
    pub async fn list_threads(&self, limit: i64, offset: i64) -> StoreResult<Vec<Thread>> {
        let query = format!(
            "{} ORDER BY COALESCE(t.last_message_at, t.created_at) DESC, t.id DESC LIMIT $1 OFFSET $2",
            THREAD_SELECT
        );

        let threads = sqlx::query_as::<_, Thread>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(threads)
    }

    /// Flat message list of a thread (bulk read interface).
    pub async fn get_thread_messages(&self, thread_id: i64) -> StoreResult<Vec<Message>> {
        Ok(fetch_thread_messages(&self.pool, thread_id).await?)
    }

    /// Depth-annotated pre-order forest computed by the database.
    pub async fn get_thread_forest(&self, thread_id: i64) -> StoreResult<Vec<SerializedNode>> {
        Ok(get_thread_forest(&self.pool, thread_id).await?)
    }

    /// Append a message to a thread (write interface).
    ///
    /// A reply must name a message that already exists in the same thread.
    /// Since the parent has to exist before the new id is allocated, a stored
    /// message can never reference itself.
    pub async fn append_message(&self, thread_id: i64, new_message: &NewMessage) -> StoreResult<Message> {
        if new_message.sender.trim().is_empty() {
            return Err(StoreError::Invalid("sender must not be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let thread_exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM threads WHERE id = $1 FOR UPDATE")
                .bind(thread_id)
                .fetch_optional(&mut *tx)
                .await?;
        if thread_exists.is_none() {
            return Err(StoreError::ThreadNotFound(thread_id));
        }

        if let ParentRef::Reply(parent_id) = new_message.parent_ref {
            let parent_exists: Option<i64> =
                sqlx::query_scalar("SELECT id FROM messages WHERE id = $1 AND thread_id = $2")
                    .bind(parent_id)
                    .bind(thread_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if parent_exists.is_none() {
                return Err(StoreError::UnknownParent { thread_id, parent_id });
            }
        }

        let sent_at = new_message.sent_at.unwrap_or_else(Utc::now);
        let query = format!(
            "INSERT INTO messages (thread_id, parent_id, sender, content, is_outbound, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            MESSAGE_COLUMNS
        );

        let row = sqlx::query_as::<_, MessageRow>(&query)
            .bind(thread_id)
            .bind(new_message.parent_ref.id())
            .bind(&new_message.sender)
            .bind(&new_message.content)
            .bind(new_message.is_outbound)
            .bind(sent_at)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE threads SET last_message_at = GREATEST(COALESCE(last_message_at, $2), $2) WHERE id = $1",
        )
        .bind(thread_id)
        .bind(sent_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        log::debug!(
            "appended message {} to thread {} (parent {:?})",
            row.id,
            thread_id,
            new_message.parent_ref.id()
        );

        Ok(Message::from(row))
    }
}
