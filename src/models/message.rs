use serde::{Deserialize, Serialize};

/// Hard cap on message text, checked before any persistence attempt.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A message row joined with its sender, so receiving clients need no
/// additional user fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_profile_icon: Option<String>,
    pub text: String,
    pub created_at: String,
    pub edited_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: String,
    pub user_id: String,
    pub read_at: String,
}
