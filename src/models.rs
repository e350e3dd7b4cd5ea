use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::threading::ParentRef;

// ===== Response Envelope =====

/// `{ "data": ... }` wrapper used by every successful response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ===== Thread Models =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: i64,
    pub platform: String,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: i64,
}

/// Request body for registering a conversation ingested from a platform.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub platform: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

// ===== Message Models =====

/// A stored message with its reply pointer already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub thread_id: i64,
    #[serde(default)]
    pub parent_ref: ParentRef,
    pub sender: String,
    pub content: String,
    pub is_outbound: bool,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Raw `messages` row as stored; `parent_id` may still hold a legacy `0`.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub thread_id: i64,
    pub parent_id: Option<i64>,
    pub sender: String,
    pub content: String,
    pub is_outbound: bool,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            thread_id: row.thread_id,
            parent_ref: ParentRef::from(row.parent_id),
            sender: row.sender,
            content: row.content,
            is_outbound: row.is_outbound,
            sent_at: row.sent_at,
            created_at: row.created_at,
        }
    }
}

/// Request body for appending a message to a thread.
///
/// `parentRef` is accepted in any shape (number, numeric string, `0`, `null`,
/// missing) and normalized while deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub is_outbound: bool,
    /// Defaults to the time the message is stored.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_ref: ParentRef,
}
