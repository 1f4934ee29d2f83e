pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod registry;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth;
use crate::models::message::{MessageRow, MAX_MESSAGE_LENGTH};
use crate::state::AppState;
use events::{ClientEvent, ReceiveMessage, SendOutcome, ServerEvent};
use heartbeat::{HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT, IDENTIFY_TIMEOUT};

/// A persisted-and-broadcast message plus how the broadcast went.
pub struct SendReceipt {
    pub message: MessageRow,
    pub outcome: SendOutcome,
}

/// The single send operation used by both the REST handler and the live
/// `sendMessage` event: validate, persist, and only then broadcast. A
/// persistence failure propagates as an error and nothing is broadcast, so
/// live peers never hold a message that isn't durable.
pub async fn send_message(
    state: &AppState,
    chat_id: &str,
    sender_id: &str,
    text: &str,
) -> Result<SendReceipt, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest(
            "message content is required".to_string(),
        ));
    }
    if text.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::BadRequest(format!(
            "message exceeds {MAX_MESSAGE_LENGTH} characters"
        )));
    }

    db::chats::require_membership(&state.db, chat_id, sender_id).await?;

    let message = db::messages::create_message(&state.db, chat_id, sender_id, text).await?;

    let event = ServerEvent::ReceiveMessage(ReceiveMessage::from(&message)).to_json();
    // The sender's own connection is not excluded; clients dedup by id.
    let dispatch = state.dispatcher.dispatch(chat_id, &event, None);

    let outcome = if dispatch.complete() {
        SendOutcome::Delivered
    } else {
        tracing::warn!(
            chat_id,
            failed = dispatch.failed,
            "broadcast missed closed connections"
        );
        SendOutcome::PersistedOnly
    };

    Ok(SendReceipt { message, outcome })
}

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Wait for IDENTIFY. The live channel requires the same bearer token
    // as the REST API; nothing else is processed before it checks out.
    let user_id;

    let identify_timeout = tokio::time::sleep(IDENTIFY_TIMEOUT);
    tokio::pin!(identify_timeout);

    loop {
        tokio::select! {
            _ = &mut identify_timeout => {
                let event = ServerEvent::Error {
                    code: "identify_timeout",
                    message: "no identify received".to_string(),
                };
                let _ = ws_sink.send(Message::Text(event.to_json().into())).await;
                return;
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientEvent::Identify { token }) =
                            serde_json::from_str::<ClientEvent>(&text)
                        {
                            match auth::resolve_auth_value(&state.db, &token).await {
                                Some(auth_user) => {
                                    user_id = auth_user.user_id;
                                    break;
                                }
                                None => {
                                    let event = ServerEvent::Error {
                                        code: "unauthorized",
                                        message: "invalid token".to_string(),
                                    };
                                    let _ = ws_sink
                                        .send(Message::Text(event.to_json().into()))
                                        .await;
                                    return;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    _ => {}
                }
            }
        }
    }

    let connection_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.dispatcher.register_connection(&connection_id, &user_id, tx);
    tracing::debug!(%connection_id, %user_id, "connection identified");

    let ready = ServerEvent::Ready {
        connection_id: connection_id.clone(),
        user_id: user_id.clone(),
    };
    if ws_sink
        .send(Message::Text(ready.to_json().into()))
        .await
        .is_err()
    {
        state.dispatcher.remove_connection(&connection_id);
        return;
    }

    let mut last_heartbeat = tokio::time::Instant::now();
    let mut heartbeat_interval = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            // Outgoing events fanned out to this connection
            Some(event) = rx.recv() => {
                if ws_sink.send(Message::Text(event.into())).await.is_err() {
                    break;
                }
            }
            // Liveness check
            _ = heartbeat_interval.tick() => {
                if last_heartbeat.elapsed() > HEARTBEAT_TIMEOUT {
                    tracing::debug!(%connection_id, "heartbeat timeout");
                    break;
                }
            }
            // Incoming events
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_heartbeat = tokio::time::Instant::now();
                        let event = match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => event,
                            Err(_) => {
                                let err = ServerEvent::Error {
                                    code: "invalid_request",
                                    message: "unrecognized event".to_string(),
                                };
                                if ws_sink.send(Message::Text(err.to_json().into())).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        let reply = handle_event(&state, &connection_id, &user_id, event).await;
                        if let Some(reply) = reply {
                            if ws_sink.send(Message::Text(reply.to_json().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    // Disconnect cleanup: drop room membership and the outbound channel.
    state.dispatcher.remove_connection(&connection_id);
    tracing::debug!(%connection_id, "connection closed");
}

/// Handles one post-identify client event, returning the direct reply to
/// the issuing connection (fan-out to peers happens inside send_message).
async fn handle_event(
    state: &AppState,
    connection_id: &str,
    user_id: &str,
    event: ClientEvent,
) -> Option<ServerEvent> {
    match event {
        ClientEvent::Identify { .. } => Some(ServerEvent::Error {
            code: "already_identified",
            message: "connection is already identified".to_string(),
        }),
        ClientEvent::Ping => Some(ServerEvent::Pong),
        ClientEvent::Join { chat_id } => {
            // Fail closed: only persisted chat members may join the room.
            match db::chats::require_membership(&state.db, &chat_id, user_id).await {
                Ok(()) => {
                    state.rooms.join(&chat_id, connection_id);
                    Some(ServerEvent::Joined { chat_id })
                }
                Err(e) => Some(error_event(e)),
            }
        }
        ClientEvent::SendMessage { chat_id, text } => {
            match send_message(state, &chat_id, user_id, &text).await {
                Ok(receipt) => Some(ServerEvent::MessageAck {
                    message_id: receipt.message.id,
                    outcome: receipt.outcome,
                }),
                Err(e) => Some(error_event(e)),
            }
        }
    }
}

fn error_event(e: AppError) -> ServerEvent {
    match e {
        AppError::BadRequest(message) => ServerEvent::Error {
            code: "invalid_request",
            message,
        },
        AppError::NotFound(message) => ServerEvent::Error {
            code: "not_found",
            message,
        },
        AppError::Forbidden(message) => ServerEvent::Error {
            code: "forbidden",
            message,
        },
        other => {
            tracing::error!("live channel error: {other:?}");
            ServerEvent::Error {
                code: "internal_error",
                message: "internal server error".to_string(),
            }
        }
    }
}
