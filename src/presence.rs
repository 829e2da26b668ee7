//! Presence registry.
//!
//! Clients historically announced liveness with three overlapping signals
//! (`join`, `join-room`, `user-online`). The registry collapses them: the
//! first announce on a connection registers it and earns one acknowledgement,
//! every later announce on the same connection only refreshes the lease.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize, Clone)]
pub struct PresenceSnapshot {
    pub user_id: String,
    pub role: Option<String>,
    pub connections: usize,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

struct PresenceEntry {
    role: Option<String>,
    connections: usize,
    connected_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

#[derive(Default)]
pub struct PresenceRegistry {
    entries: HashMap<String, PresenceEntry>,
    // connection id -> user id, for idempotent announces and disconnects
    connections: HashMap<Uuid, String>,
}

impl PresenceRegistry {
    /// Registers a connection's presence claim. Returns `true` only the first
    /// time this connection announces; duplicates refresh the lease.
    pub fn announce(
        &mut self,
        conn_id: Uuid,
        user_id: &str,
        role: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let first = !self.connections.contains_key(&conn_id);
        if first {
            self.connections.insert(conn_id, user_id.to_string());
        }
        let entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert(PresenceEntry {
                role: None,
                connections: 0,
                connected_at: now,
                last_seen: now,
            });
        if first {
            entry.connections += 1;
        }
        if role.is_some() {
            entry.role = role;
        }
        entry.last_seen = now;
        first
    }

    /// Refreshes the lease for a connection (driven by websocket pongs).
    pub fn heartbeat(&mut self, conn_id: Uuid, now: DateTime<Utc>) {
        if let Some(user_id) = self.connections.get(&conn_id) {
            if let Some(entry) = self.entries.get_mut(user_id) {
                entry.last_seen = now;
            }
        }
    }

    /// Drops a connection. Returns `true` if the user went fully offline.
    pub fn disconnect(&mut self, conn_id: Uuid) -> bool {
        let Some(user_id) = self.connections.remove(&conn_id) else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(&user_id) {
            entry.connections = entry.connections.saturating_sub(1);
            if entry.connections == 0 {
                self.entries.remove(&user_id);
                return true;
            }
        }
        false
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn snapshot(&self) -> Vec<PresenceSnapshot> {
        self.entries
            .iter()
            .map(|(user_id, e)| PresenceSnapshot {
                user_id: user_id.clone(),
                role: e.role.clone(),
                connections: e.connections,
                connected_at: e.connected_at,
                last_seen: e.last_seen,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_announces_register_once() {
        let mut reg = PresenceRegistry::default();
        let conn = Uuid::new_v4();
        let now = Utc::now();

        // join, join-room and user-online all funnel here
        assert!(reg.announce(conn, "u1", None, now));
        assert!(!reg.announce(conn, "u1", None, now));
        assert!(!reg.announce(conn, "u1", Some("mentee".to_string()), now));

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].connections, 1);
        assert_eq!(snap[0].role.as_deref(), Some("mentee"));
    }

    #[test]
    fn user_stays_online_until_last_connection_drops() {
        let mut reg = PresenceRegistry::default();
        let now = Utc::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        reg.announce(a, "u1", None, now);
        reg.announce(b, "u1", None, now);

        assert!(!reg.disconnect(a));
        assert!(reg.is_online("u1"));
        assert!(reg.disconnect(b));
        assert!(!reg.is_online("u1"));
    }

    #[test]
    fn heartbeat_refreshes_last_seen() {
        let mut reg = PresenceRegistry::default();
        let conn = Uuid::new_v4();
        let t0 = Utc::now();
        reg.announce(conn, "u1", None, t0);

        let t1 = t0 + chrono::Duration::seconds(30);
        reg.heartbeat(conn, t1);
        assert_eq!(reg.snapshot()[0].last_seen, t1);
    }

    #[test]
    fn disconnect_of_unknown_connection_is_a_no_op() {
        let mut reg = PresenceRegistry::default();
        assert!(!reg.disconnect(Uuid::new_v4()));
    }
}
