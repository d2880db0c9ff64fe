//! Message log operations: append-only writes and the bounded recent
//! window replayed to joining connections.
//!
//! Blocking rusqlite calls — run them under tokio::task::spawn_blocking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// How many recent messages a joining connection receives.
pub const HISTORY_LIMIT: u32 = 50;

type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// The canonical persisted chat message, as broadcast to clients.
/// `id` is the client-supplied message id and is NOT unique: a misbehaving
/// client that reuses ids produces duplicate rows, distinguished only by
/// the log's own rowid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    /// Sender's stable user id
    pub sender: String,
    pub sender_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append a message to the log.
pub fn append_message(db: &DbPool, message: &ChatMessage) -> StoreResult<()> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;

    conn.execute(
        "INSERT INTO messages (message_id, text, sender_user_id, sender_name, sender_avatar_url, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.id,
            message.text,
            message.sender,
            message.sender_name,
            message.sender_avatar_url,
            message.timestamp.timestamp_millis(),
        ],
    )?;

    Ok(())
}

/// The most recent HISTORY_LIMIT messages, ascending by send time
/// (ties broken by insertion order).
pub fn recent_history(db: &DbPool) -> StoreResult<Vec<ChatMessage>> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;

    let mut stmt = conn.prepare(
        "SELECT message_id, text, sender_user_id, sender_name, sender_avatar_url, sent_at
         FROM messages
         ORDER BY sent_at DESC, id DESC
         LIMIT ?1",
    )?;

    let mut messages: Vec<ChatMessage> = stmt
        .query_map([HISTORY_LIMIT], |row| {
            let sent_at: i64 = row.get(5)?;
            Ok(ChatMessage {
                id: row.get(0)?,
                text: row.get(1)?,
                sender: row.get(2)?,
                sender_name: row.get(3)?,
                sender_avatar_url: row.get(4)?,
                timestamp: DateTime::from_timestamp_millis(sent_at).unwrap_or_default(),
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    // Query runs newest-first to bound the scan; clients want oldest-first
    messages.reverse();

    Ok(messages)
}
