use axum::extract::ws::Message;

use crate::chat::ChatEvent;
use super::ConnectionSender;

/// Encode a chat event as a JSON text frame.
pub fn encode_event(event: &ChatEvent) -> Option<Message> {
    match event.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode chat event");
            None
        }
    }
}

/// Deliver one frame to every recipient whose connection is still open.
/// Closed recipients are skipped. Returns the number of deliveries.
pub fn broadcast_to_all(recipients: &[ConnectionSender], msg: &Message) -> usize {
    recipients
        .iter()
        .filter(|sender| !sender.is_closed())
        .filter(|sender| sender.send(msg.clone()).is_ok())
        .count()
}

