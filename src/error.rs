use thiserror::Error;

/// Live transport failures. Recovered by the reconnection policy; the view
/// only ever sees them as a connectivity signal.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Timed out after {0:?} waiting for the broker")]
    ConnectTimeout(std::time::Duration),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("No heart-beat from broker within {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    #[error("Connection closed by broker")]
    Closed,
}

/// History or room lookup failures, surfaced to the caller unchanged.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Room {0} not found")]
    RoomNotFound(String),
}

/// Malformed inbound data. Dropped and counted, never fatal.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed frame: {0}")]
    Frame(String),

    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Missing inputs that stop a room session from being created at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("No display name set")]
    MissingIdentity,

    #[error("No room id given")]
    MissingRoom,
}
