use dashmap::DashMap;
use std::collections::HashSet;

/// In-memory mapping of chat id to the set of live connection ids joined
/// to it. Purely transient presence tracking: entries are created on first
/// join, destroyed when their set empties, and lost entirely on restart
/// (clients rejoin on reconnect). Nothing here touches the database.
///
/// A connection belongs to at most one room at a time; joining a second
/// room evicts the first.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Idempotently adds the connection to the chat's room, creating the
    /// room if absent. Any previous room membership is dropped first.
    pub fn join(&self, chat_id: &str, connection_id: &str) {
        self.leave(connection_id);
        self.rooms
            .entry(chat_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Removes the connection from whichever room contains it, deleting
    /// rooms that become empty. O(active rooms) per call, since membership
    /// is not indexed by connection; fine at this system's scale.
    pub fn leave(&self, connection_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// Snapshot of the connections currently joined to the chat, empty if
    /// the chat has no room.
    pub fn members_of(&self, chat_id: &str) -> Vec<String> {
        self.rooms
            .get(chat_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one live connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_room() {
        let registry = RoomRegistry::new();
        registry.join("c1", "conn-a");
        assert_eq!(registry.members_of("c1"), vec!["conn-a".to_string()]);
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_join_is_idempotent() {
        let registry = RoomRegistry::new();
        registry.join("c1", "conn-a");
        registry.join("c1", "conn-a");
        assert_eq!(registry.members_of("c1").len(), 1);
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_rejoin_evicts_previous_room() {
        let registry = RoomRegistry::new();
        registry.join("c1", "conn-a");
        registry.join("c2", "conn-a");
        assert!(registry.members_of("c1").is_empty());
        assert_eq!(registry.members_of("c2"), vec!["conn-a".to_string()]);
        // the emptied room is gone, not just empty
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_leave_removes_everywhere_and_drops_empty_rooms() {
        let registry = RoomRegistry::new();
        registry.join("c1", "conn-a");
        registry.join("c1", "conn-b");
        registry.leave("conn-a");
        assert_eq!(registry.members_of("c1"), vec!["conn-b".to_string()]);

        registry.leave("conn-b");
        assert!(registry.members_of("c1").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_leave_unknown_connection_is_noop() {
        let registry = RoomRegistry::new();
        registry.join("c1", "conn-a");
        registry.leave("conn-z");
        assert_eq!(registry.members_of("c1").len(), 1);
    }

    #[test]
    fn test_members_of_unknown_chat_is_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.members_of("nope").is_empty());
    }

    #[test]
    fn test_rooms_are_disjoint() {
        let registry = RoomRegistry::new();
        registry.join("x", "conn-a");
        registry.join("x", "conn-b");
        registry.join("x", "conn-c");
        registry.join("y", "conn-d");

        let mut x = registry.members_of("x");
        x.sort();
        assert_eq!(x, vec!["conn-a", "conn-b", "conn-c"]);
        assert_eq!(registry.members_of("y"), vec!["conn-d".to_string()]);
    }

    #[test]
    fn test_mass_disconnect_leaves_no_entries() {
        let registry = RoomRegistry::new();
        let ids: Vec<String> = (0..50).map(|i| format!("conn-{i}")).collect();
        for id in &ids {
            registry.join("busy", id);
        }
        assert_eq!(registry.members_of("busy").len(), 50);

        // disconnect in an arbitrary interleaving
        for id in ids.iter().step_by(2).chain(ids.iter().skip(1).step_by(2)) {
            registry.leave(id);
        }
        assert!(registry.members_of("busy").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_join_leave() {
        use std::sync::Arc;

        let registry = Arc::new(RoomRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let conn = format!("conn-{t}-{i}");
                        registry.join("c1", &conn);
                        registry.leave(&conn);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
