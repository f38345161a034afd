use super::types::Message;

/// Events the live session task pushes up to the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    MessageReceived(Message),
    /// The room channel is live again. Fires on every (re)subscription.
    Connected,
    /// Fires on every transport loss, before the retry delay starts.
    Disconnected,
    /// Diagnostic detail for a failed attempt or broker ERROR frame.
    TransportError(String),
}

/// Lifecycle of the single live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}
