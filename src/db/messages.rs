use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::models::message::MessageRow;
use crate::snowflake;

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> MessageRow {
    MessageRow {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        sender_id: row.get("sender_id"),
        sender_username: row.get("sender_username"),
        sender_profile_icon: row.get("sender_profile_icon"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        edited_at: row.get("edited_at"),
    }
}

const SELECT_MESSAGES: &str = "SELECT m.id, m.chat_id, m.sender_id, \
     u.username AS sender_username, u.profile_icon AS sender_profile_icon, \
     m.text, m.created_at, m.edited_at \
     FROM messages m JOIN users u ON u.id = m.sender_id";

pub async fn get_message_row(pool: &SqlitePool, message_id: &str) -> Result<MessageRow, AppError> {
    let row = sqlx::query(&format!("{SELECT_MESSAGES} WHERE m.id = ?"))
        .bind(message_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_message".to_string()))?;

    Ok(row_to_message(row))
}

/// Full history in creation order. Snowflake IDs sort in creation order, so
/// ordering by id matches persistence order even within one timestamp.
pub async fn list_messages(pool: &SqlitePool, chat_id: &str) -> Result<Vec<MessageRow>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_MESSAGES} WHERE m.chat_id = ? ORDER BY m.id ASC"
    ))
    .bind(chat_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_message).collect())
}

pub async fn create_message(
    pool: &SqlitePool,
    chat_id: &str,
    sender_id: &str,
    text: &str,
) -> Result<MessageRow, AppError> {
    let id = snowflake::generate();

    sqlx::query("INSERT INTO messages (id, chat_id, sender_id, text) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(chat_id)
        .bind(sender_id)
        .bind(text)
        .execute(pool)
        .await?;

    get_message_row(pool, &id).await
}
