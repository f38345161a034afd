pub mod commands;
pub mod events;
pub mod types;

pub use commands::NetworkCommand;
pub use events::{ConnectionState, NetworkEvent};
pub use types::{Message, MessagePage, OutgoingMessage, Room};
