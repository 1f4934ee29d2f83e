use serde::{Deserialize, Serialize};

use crate::models::message::{MessageRow, ReadReceipt};

/// Events a client may send over the duplex channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Identify {
        token: String,
    },
    Join {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        text: String,
    },
    Ping,
}

/// Events the server pushes to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Ready {
        #[serde(rename = "connectionId")]
        connection_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Joined {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    ReceiveMessage(ReceiveMessage),
    MessageAck {
        #[serde(rename = "messageId")]
        message_id: String,
        outcome: SendOutcome,
    },
    Pong,
    Error {
        code: &'static str,
        message: String,
    },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// The fan-out payload. Denormalized sender fields spare receiving clients
/// an extra user fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_profile_icon: Option<String>,
    pub text: String,
    pub created_at: String,
    pub read_receipts: Vec<ReadReceipt>,
}

impl From<&MessageRow> for ReceiveMessage {
    fn from(msg: &MessageRow) -> Self {
        Self {
            id: msg.id.clone(),
            chat_id: msg.chat_id.clone(),
            sender_id: msg.sender_id.clone(),
            sender_username: msg.sender_username.clone(),
            sender_profile_icon: msg.sender_profile_icon.clone(),
            text: msg.text.clone(),
            created_at: msg.created_at.clone(),
            // fresh messages have no receipts yet
            read_receipts: Vec::new(),
        }
    }
}

/// What became of a send: the message is durable either way; the variants
/// only describe live delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Every live room member received the broadcast.
    Delivered,
    /// Persisted, but at least one live channel was closed mid-broadcast.
    /// Those clients recover via history re-fetch.
    PersistedOnly,
}
