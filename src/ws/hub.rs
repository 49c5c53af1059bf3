//! Connection registry: the single source of truth for presence and fan-out.
//!
//! Maps user id → live connection senders. A key is present if and only if
//! its connection list is non-empty, so "is the user online" is exactly "is
//! the key present". One reader/writer lock covers the whole table; the
//! table itself is never exposed, and callers go through the four
//! operations below.

use std::collections::HashMap;

use axum::extract::ws::Message;
use parking_lot::RwLock;

use super::wire::ServerEvent;
use super::ConnectionSender;

/// Exclusion sentinel for [`Hub::broadcast`]: no user id is 0, so excluding
/// 0 sends to everyone.
pub const EXCLUDE_NONE: i64 = 0;

#[derive(Default)]
pub struct Hub {
    clients: RwLock<HashMap<i64, Vec<ConnectionSender>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection for a user. Returns true iff this was the user's
    /// first connection (the user just came online).
    pub fn register(&self, user_id: i64, tx: ConnectionSender) -> bool {
        let mut clients = self.clients.write();
        let connections = clients.entry(user_id).or_default();
        let is_first = connections.is_empty();
        connections.push(tx);
        is_first
    }

    /// Remove a connection for a user. Returns true iff this was the user's
    /// last connection (the user just went offline). Unregistering an
    /// unknown user or an already-removed connection is a no-op.
    pub fn unregister(&self, user_id: i64, tx: &ConnectionSender) -> bool {
        let mut clients = self.clients.write();
        let Some(connections) = clients.get_mut(&user_id) else {
            return false;
        };

        let before = connections.len();
        connections.retain(|sender| !sender.same_channel(tx));
        if connections.len() == before {
            return false;
        }

        let is_last = connections.is_empty();
        if is_last {
            clients.remove(&user_id);
        }
        is_last
    }

    /// Snapshot of a user's current connections (empty if offline).
    /// Returns an independent copy so callers never iterate the live table.
    pub fn connections_of(&self, user_id: i64) -> Vec<ConnectionSender> {
        self.clients
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Send an event to every connection of every user except
    /// `exclude_user_id` ([`EXCLUDE_NONE`] reaches everyone).
    ///
    /// Each send enqueues onto that connection's writer task, so one slow or
    /// broken socket never stalls delivery to the others. Failures are
    /// logged; the broken connection's own lifecycle handles cleanup.
    pub fn broadcast(&self, event: &ServerEvent, exclude_user_id: i64) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize broadcast event");
                return;
            }
        };
        let msg = Message::Text(json.into());

        let clients = self.clients.read();
        for (user_id, connections) in clients.iter() {
            if *user_id == exclude_user_id {
                continue;
            }
            for sender in connections {
                if sender.send(msg.clone()).is_err() {
                    tracing::debug!(
                        user_id = *user_id,
                        "Broadcast send failed; connection is closing"
                    );
                }
            }
        }
    }
}
