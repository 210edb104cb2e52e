//! Connection registry for the admin chat.
//!
//! A connection is a member from the moment it is admitted until its channel
//! closes. Every broadcast iterates over a snapshot of the members taken at
//! broadcast time, so a connection leaving mid-broadcast is harmless.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::chat::events::{ChatEvent, ChatMessage};
use crate::ws::broadcast::{broadcast_to_all, encode_event};
use crate::ws::ConnectionSender;

/// Registry key for one admitted connection.
pub type ConnectionId = Uuid;

#[derive(Debug)]
struct Member {
    identity: Identity,
    /// Local part of the identity, fixed at admission.
    sender_label: String,
    tx: ConnectionSender,
}

/// Shared chat relay. Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct ChatRelay {
    members: Arc<DashMap<ConnectionId, Member>>,
}

impl ChatRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an admitted connection and announce it to every member,
    /// the new one included.
    pub fn join(&self, identity: Identity, tx: ConnectionSender) -> ConnectionId {
        let id = Uuid::new_v4();
        let notice = ChatEvent::joined(&identity);
        let sender_label = identity.sender_label().to_string();

        tracing::info!(
            connection_id = %id,
            identity = %identity,
            "Admin connected to chat"
        );

        self.members.insert(
            id,
            Member {
                identity,
                sender_label,
                tx,
            },
        );

        self.broadcast(&notice);
        id
    }

    /// Handle one inbound text frame from a member.
    ///
    /// Frames that do not parse as a chat message are logged and dropped.
    /// Returns the number of deliveries made.
    pub fn relay_frame(&self, id: ConnectionId, frame: &str) -> usize {
        // Clone out of the map guard before broadcasting.
        let (identity, sender_label) = match self.members.get(&id) {
            Some(member) => (member.identity.clone(), member.sender_label.clone()),
            None => return 0,
        };

        let message = match ChatMessage::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    connection_id = %id,
                    identity = %identity,
                    error = %e,
                    "Dropping malformed chat frame"
                );
                return 0;
            }
        };

        tracing::debug!(identity = %identity, text = %message.text, "Chat message");

        self.broadcast(&ChatEvent::chat(sender_label, message.text))
    }

    /// Remove a connection and announce its departure to the remaining members.
    ///
    /// Only the call that actually removes the member broadcasts, so calling
    /// this twice, or for a connection that was never admitted, is a no-op.
    pub fn leave(&self, id: ConnectionId) -> bool {
        match self.members.remove(&id) {
            Some((_, member)) => {
                tracing::info!(
                    connection_id = %id,
                    identity = %member.identity,
                    "Admin disconnected from chat"
                );
                self.broadcast(&ChatEvent::left(&member.identity));
                true
            }
            None => false,
        }
    }

    /// Send an event to every member whose channel is still open.
    pub fn broadcast(&self, event: &ChatEvent) -> usize {
        let Some(msg) = encode_event(event) else {
            return 0;
        };
        let recipients: Vec<ConnectionSender> =
            self.members.iter().map(|entry| entry.tx.clone()).collect();
        broadcast_to_all(&recipients, &msg)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
