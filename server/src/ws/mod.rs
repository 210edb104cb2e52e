pub mod actor;
pub mod broadcast;
pub mod handler;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// The relay clones this to push frames to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
