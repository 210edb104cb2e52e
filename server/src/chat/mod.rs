//! Admin chat: wire format and the connection registry that relays
//! join/leave notices and chat lines between admitted admins.

pub mod events;
pub mod relay;

pub use events::{ChatEvent, ChatMessage};
pub use relay::{ChatRelay, ConnectionId};
