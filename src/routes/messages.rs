use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::message::CreateMessage;
use crate::realtime;
use crate::state::AppState;

/// History with each message's read receipts nested in, creation order.
pub async fn load_history(
    pool: &SqlitePool,
    chat_id: &str,
) -> Result<Vec<serde_json::Value>, AppError> {
    let messages = db::messages::list_messages(pool, chat_id).await?;
    let receipts = db::read_receipts::list_for_chat(pool, chat_id).await?;

    Ok(messages
        .iter()
        .map(|msg| {
            let msg_receipts: Vec<_> = receipts
                .iter()
                .filter(|r| r.message_id == msg.id)
                .collect();
            let mut value = serde_json::to_value(msg).unwrap_or_default();
            value["readReceipts"] = serde_json::json!(msg_receipts);
            value
        })
        .collect())
}

pub async fn list_messages(
    state: State<AppState>,
    Path(chat_id): Path<String>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    db::chats::require_membership(&state.db, &chat_id, &auth.user_id).await?;
    let messages = load_history(&state.db, &chat_id).await?;
    Ok(Json(serde_json::json!({ "messages": messages })))
}

/// Persist-then-broadcast send. The broadcast never runs if persistence
/// fails, and the response reports whether every live room member got it.
pub async fn create_message(
    state: State<AppState>,
    Path(chat_id): Path<String>,
    auth: AuthUser,
    Json(input): Json<CreateMessage>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let receipt = realtime::send_message(&state, &chat_id, &auth.user_id, &input.text).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": receipt.message,
            "outcome": receipt.outcome,
        })),
    ))
}

pub async fn upsert_read_receipt(
    state: State<AppState>,
    Path((chat_id, message_id)): Path<(String, String)>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    db::chats::require_membership(&state.db, &chat_id, &auth.user_id).await?;

    let message = db::messages::get_message_row(&state.db, &message_id).await?;
    if message.chat_id != chat_id {
        return Err(AppError::NotFound("unknown_message".to_string()));
    }

    let receipt = db::read_receipts::upsert(&state.db, &message_id, &auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(receipt))))
}
