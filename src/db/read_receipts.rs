use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::models::message::ReadReceipt;

/// Create-or-update keyed on (message_id, user_id): re-reading refreshes
/// the timestamp, it never duplicates the row.
pub async fn upsert(
    pool: &SqlitePool,
    message_id: &str,
    user_id: &str,
) -> Result<ReadReceipt, AppError> {
    let read_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();

    sqlx::query(
        "INSERT INTO read_receipts (message_id, user_id, read_at) VALUES (?, ?, ?) \
         ON CONFLICT(message_id, user_id) DO UPDATE SET read_at = excluded.read_at",
    )
    .bind(message_id)
    .bind(user_id)
    .bind(&read_at)
    .execute(pool)
    .await?;

    let row = sqlx::query(
        "SELECT message_id, user_id, read_at FROM read_receipts WHERE message_id = ? AND user_id = ?",
    )
    .bind(message_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(ReadReceipt {
        message_id: row.get("message_id"),
        user_id: row.get("user_id"),
        read_at: row.get("read_at"),
    })
}

/// All receipts for a chat in one query, for nesting under message history.
pub async fn list_for_chat(pool: &SqlitePool, chat_id: &str) -> Result<Vec<ReadReceipt>, AppError> {
    let rows = sqlx::query(
        "SELECT r.message_id, r.user_id, r.read_at \
         FROM read_receipts r JOIN messages m ON m.id = r.message_id \
         WHERE m.chat_id = ? ORDER BY r.message_id ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ReadReceipt {
            message_id: row.get("message_id"),
            user_id: row.get("user_id"),
            read_at: row.get("read_at"),
        })
        .collect())
}
