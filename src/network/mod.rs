pub mod client;
pub mod manager;
pub mod stomp;
pub mod transport;

pub use client::{LiveClient, LiveConfig};
pub use manager::ConnectionManager;
