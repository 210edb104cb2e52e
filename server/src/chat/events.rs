//! JSON wire format for the admin chat.
//!
//! Inbound frames carry `{ "text": ... }`. Outbound frames are either a
//! system notice `{ "system": ... }` or a chat line `{ "sender": ..., "text": ... }`.

use serde::{Deserialize, Serialize};

use crate::auth::Identity;

/// A chat line sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    pub text: String,
}

impl ChatMessage {
    /// Parse an inbound text frame.
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

/// An event pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatEvent {
    /// Join/leave notifications and admission failures.
    System { system: String },
    /// A relayed chat line. `sender` is the local part of the sender's email.
    Chat { sender: String, text: String },
}

impl ChatEvent {
    pub fn system(notice: impl Into<String>) -> Self {
        Self::System {
            system: notice.into(),
        }
    }

    pub fn joined(identity: &Identity) -> Self {
        Self::system(format!("{} joined the chat.", identity))
    }

    pub fn left(identity: &Identity) -> Self {
        Self::system(format!("{} left the chat.", identity))
    }

    pub fn chat(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            sender: sender.into(),
            text: text.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
