use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::registry::RoomRegistry;

/// Result of one fan-out pass over a chat's room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchOutcome {
    pub fn complete(&self) -> bool {
        self.failed == 0
    }
}

struct Connection {
    user_id: String,
    tx: mpsc::UnboundedSender<String>,
}

/// Fans events out to the connections registered in the room registry.
/// Each connection registers an unbounded channel whose receiving half is
/// drained by that connection's socket task, so dispatch never blocks on a
/// slow client. Connections carry the identified user so membership
/// changes can be pushed through to the rooms.
pub struct Dispatcher {
    connections: DashMap<String, Connection>,
    rooms: Arc<RoomRegistry>,
}

impl Dispatcher {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self {
            connections: DashMap::new(),
            rooms,
        }
    }

    pub fn register_connection(
        &self,
        connection_id: &str,
        user_id: &str,
        tx: mpsc::UnboundedSender<String>,
    ) {
        self.connections.insert(
            connection_id.to_string(),
            Connection {
                user_id: user_id.to_string(),
                tx,
            },
        );
    }

    /// Drops the connection's outbound channel and its room membership.
    pub fn remove_connection(&self, connection_id: &str) {
        self.connections.remove(connection_id);
        self.rooms.leave(connection_id);
    }

    /// Drops the user's connections from a chat's room, keeping the
    /// connections themselves registered. Called when a chat membership
    /// ends while a socket may still be open, so fan-out stops at the
    /// membership boundary instead of at the next disconnect.
    pub fn evict_user(&self, chat_id: &str, user_id: &str) {
        for connection_id in self.rooms.members_of(chat_id) {
            let owned = self
                .connections
                .get(&connection_id)
                .is_some_and(|conn| conn.user_id == user_id);
            if owned {
                self.rooms.leave(&connection_id);
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Emits the serialized event to every connection in the chat's room,
    /// optionally excluding one (the sender). A connection whose channel
    /// has closed counts as failed; those clients catch up via history
    /// re-fetch after they rejoin.
    pub fn dispatch(
        &self,
        chat_id: &str,
        event: &str,
        exclude_connection_id: Option<&str>,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome {
            delivered: 0,
            failed: 0,
        };

        for connection_id in self.rooms.members_of(chat_id) {
            if exclude_connection_id == Some(connection_id.as_str()) {
                continue;
            }
            match self.connections.get(&connection_id) {
                Some(conn) if conn.tx.send(event.to_string()).is_ok() => outcome.delivered += 1,
                _ => outcome.failed += 1,
            }
        }

        outcome
    }
}
