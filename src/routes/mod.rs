pub mod chats;
mod health;
pub mod messages;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .route("/ws", get(crate::realtime::ws_upgrade))
        .nest("/api/chat", chat_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(chats::list_chats).post(chats::create_chat))
        .route("/check", post(chats::check_existing_chat))
        .route(
            "/{chat_id}",
            get(chats::get_chat)
                .put(chats::update_chat)
                .delete(chats::leave_chat),
        )
        .route("/{chat_id}/add-members", post(chats::add_members))
        .route(
            "/{chat_id}/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route(
            "/{chat_id}/messages/{message_id}/read-receipt",
            post(messages::upsert_read_receipt),
        )
}
