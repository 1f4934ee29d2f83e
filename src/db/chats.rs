use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::models::chat::{ChatMember, ChatRow};
use crate::snowflake;

fn row_to_chat(row: sqlx::sqlite::SqliteRow) -> ChatRow {
    ChatRow {
        id: row.get("id"),
        is_group: row.get("is_group"),
        group_name: row.get("group_name"),
        created_at: row.get("created_at"),
    }
}

const SELECT_CHATS: &str = "SELECT id, is_group, group_name, created_at FROM chats";

pub async fn get_chat_row(pool: &SqlitePool, chat_id: &str) -> Result<ChatRow, AppError> {
    let row = sqlx::query(&format!("{SELECT_CHATS} WHERE id = ?"))
        .bind(chat_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_chat".to_string()))?;

    Ok(row_to_chat(row))
}

/// Creates a chat with the given members. `is_group` is derived from the
/// distinct member count here and never recomputed afterwards, even if
/// members are added or leave later.
pub async fn create_chat(
    pool: &SqlitePool,
    user_ids: &[String],
    group_name: Option<&str>,
) -> Result<ChatRow, AppError> {
    let mut user_ids = user_ids.to_vec();
    user_ids.sort_unstable();
    user_ids.dedup();

    let id = snowflake::generate();
    let is_group = user_ids.len() >= 3;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO chats (id, is_group, group_name) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(is_group)
        .bind(group_name)
        .execute(&mut *tx)
        .await?;

    for user_id in &user_ids {
        sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id, user_id) VALUES (?, ?)")
            .bind(&id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    get_chat_row(pool, &id).await
}

pub async fn list_members(pool: &SqlitePool, chat_id: &str) -> Result<Vec<ChatMember>, AppError> {
    let rows = sqlx::query(
        "SELECT u.id, u.username, u.profile_icon, m.joined_at \
         FROM chat_members m JOIN users u ON u.id = m.user_id \
         WHERE m.chat_id = ? ORDER BY m.joined_at ASC, u.id ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ChatMember {
            id: row.get("id"),
            username: row.get("username"),
            profile_icon: row.get("profile_icon"),
            joined_at: row.get("joined_at"),
        })
        .collect())
}

pub async fn is_member(pool: &SqlitePool, chat_id: &str, user_id: &str) -> Result<bool, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_members WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Membership is the authorization boundary for everything chat-scoped:
/// history, sends, read receipts, and live room joins.
pub async fn require_membership(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    // 404 before 403 so non-members can't probe for chat existence either way
    get_chat_row(pool, chat_id).await?;
    if !is_member(pool, chat_id, user_id).await? {
        return Err(AppError::Forbidden(
            "you are not a member of this chat".to_string(),
        ));
    }
    Ok(())
}

/// Finds an existing non-group chat whose members are exactly these two
/// users. Duplicate direct chats are possible (creation does not dedup);
/// this returns the oldest one.
pub async fn find_direct_chat(
    pool: &SqlitePool,
    user_id: &str,
    recipient_id: &str,
) -> Result<Option<String>, AppError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT c.id FROM chats c \
         WHERE c.is_group = 0 \
           AND (SELECT COUNT(*) FROM chat_members m WHERE m.chat_id = c.id) = 2 \
           AND EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = ?) \
           AND EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = ?) \
         ORDER BY c.id ASC LIMIT 1",
    )
    .bind(user_id)
    .bind(recipient_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.0))
}

pub async fn add_members(
    pool: &SqlitePool,
    chat_id: &str,
    user_ids: &[String],
) -> Result<(), AppError> {
    for user_id in user_ids {
        sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Removes a member; deletes the chat entirely once the last member is
/// gone. Returns the number of remaining members.
pub async fn remove_member(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
) -> Result<i64, AppError> {
    sqlx::query("DELETE FROM chat_members WHERE chat_id = ? AND user_id = ?")
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_members WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_one(pool)
        .await?;

    if remaining == 0 {
        sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(pool)
            .await?;
    }

    Ok(remaining)
}

pub async fn update_group_name(
    pool: &SqlitePool,
    chat_id: &str,
    group_name: Option<&str>,
) -> Result<ChatRow, AppError> {
    sqlx::query("UPDATE chats SET group_name = ? WHERE id = ?")
        .bind(group_name)
        .bind(chat_id)
        .execute(pool)
        .await?;

    get_chat_row(pool, chat_id).await
}

pub async fn list_chats_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<ChatRow>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_CHATS} WHERE id IN (SELECT chat_id FROM chat_members WHERE user_id = ?) \
         ORDER BY id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_chat).collect())
}
