use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::chat::{AddMembers, CheckExistingChat, CreateChat, UpdateChat};
use crate::state::AppState;

pub async fn create_chat(
    state: State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateChat>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    // Repeated IDs collapse to one membership; the two-user minimum and
    // the group derivation count distinct users only.
    let mut user_ids = input.user_ids;
    user_ids.sort_unstable();
    user_ids.dedup();

    if user_ids.len() < 2 {
        return Err(AppError::BadRequest(
            "at least two users are required to create a chat".to_string(),
        ));
    }
    for user_id in &user_ids {
        db::users::get_user(&state.db, user_id).await?;
    }
    if !user_ids.contains(&auth.user_id) {
        return Err(AppError::Forbidden(
            "you must be a member of the chat you create".to_string(),
        ));
    }

    let chat = db::chats::create_chat(&state.db, &user_ids, input.group_name.as_deref()).await?;
    let members = db::chats::list_members(&state.db, &chat.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": chat.id,
            "isGroup": chat.is_group,
            "groupName": chat.group_name,
            "createdAt": chat.created_at,
            "members": members,
        })),
    ))
}

pub async fn check_existing_chat(
    state: State<AppState>,
    auth: AuthUser,
    Json(input): Json<CheckExistingChat>,
) -> Result<Json<serde_json::Value>, AppError> {
    let recipient_id = input
        .recipient_id
        .ok_or_else(|| AppError::BadRequest("recipient ID is required".to_string()))?;

    if recipient_id == auth.user_id {
        return Err(AppError::BadRequest(
            "you cannot start a chat with yourself".to_string(),
        ));
    }

    let chat_id = db::chats::find_direct_chat(&state.db, &auth.user_id, &recipient_id).await?;
    Ok(Json(serde_json::json!({ "chatId": chat_id })))
}

pub async fn list_chats(
    state: State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let chats = db::chats::list_chats_for_user(&state.db, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "chats": chats })))
}

pub async fn get_chat(
    state: State<AppState>,
    Path(chat_id): Path<String>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    db::chats::require_membership(&state.db, &chat_id, &auth.user_id).await?;

    let chat = db::chats::get_chat_row(&state.db, &chat_id).await?;
    let members = db::chats::list_members(&state.db, &chat_id).await?;
    let messages = crate::routes::messages::load_history(&state.db, &chat_id).await?;

    Ok(Json(serde_json::json!({
        "id": chat.id,
        "isGroup": chat.is_group,
        "groupName": chat.group_name,
        "createdAt": chat.created_at,
        "members": members,
        "messages": messages,
    })))
}

pub async fn update_chat(
    state: State<AppState>,
    Path(chat_id): Path<String>,
    auth: AuthUser,
    Json(input): Json<UpdateChat>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::chats::require_membership(&state.db, &chat_id, &auth.user_id).await?;
    let chat =
        db::chats::update_group_name(&state.db, &chat_id, input.group_name.as_deref()).await?;
    Ok(Json(serde_json::to_value(chat).map_err(|e| {
        AppError::Internal(format!("serialization error: {e}"))
    })?))
}

pub async fn add_members(
    state: State<AppState>,
    Path(chat_id): Path<String>,
    auth: AuthUser,
    Json(input): Json<AddMembers>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::chats::require_membership(&state.db, &chat_id, &auth.user_id).await?;
    if input.user_ids.is_empty() {
        return Err(AppError::BadRequest("user IDs are required".to_string()));
    }
    for user_id in &input.user_ids {
        db::users::get_user(&state.db, user_id).await?;
    }

    // Note: is_group stays whatever it was at creation time, even if the
    // chat now has three or more members.
    db::chats::add_members(&state.db, &chat_id, &input.user_ids).await?;
    let members = db::chats::list_members(&state.db, &chat_id).await?;
    Ok(Json(serde_json::json!({ "members": members })))
}

/// The calling user leaves the chat; the chat itself is deleted once its
/// last member has left.
pub async fn leave_chat(
    state: State<AppState>,
    Path(chat_id): Path<String>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    db::chats::require_membership(&state.db, &chat_id, &auth.user_id).await?;
    let remaining = db::chats::remove_member(&state.db, &chat_id, &auth.user_id).await?;
    // any open socket stops receiving this chat's fan-out immediately
    state.dispatcher.evict_user(&chat_id, &auth.user_id);
    Ok(Json(serde_json::json!({
        "left": true,
        "chatDeleted": remaining == 0,
    })))
}
