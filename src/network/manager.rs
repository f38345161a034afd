use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::common::{ConnectionState, NetworkCommand, NetworkEvent};

use super::client::{LiveClient, LiveConfig};

const EVENT_BUFFER: usize = 100;

/// Owns the one live connection a chat view may hold.
pub struct ConnectionManager {
    config: LiveConfig,
    active: Option<LiveConnection>,
    parse_failures: Arc<AtomicU64>,
}

/// Handle to a running live session. Dropping it tears the session down.
struct LiveConnection {
    room_id: String,
    commands: mpsc::UnboundedSender<NetworkCommand>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConnectionManager {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            active: None,
            parse_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Tears down any existing connection, then starts one for `room_id`.
    ///
    /// The returned receiver yields the room's events; it closes when this
    /// connection is torn down. Must be called from within a Tokio runtime.
    pub fn connect(&mut self, room_id: &str) -> mpsc::Receiver<NetworkEvent> {
        self.disconnect();

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let client = LiveClient::new(
            self.config.clone(),
            room_id,
            event_tx,
            command_rx,
            state_tx,
            Arc::clone(&self.parse_failures),
        );
        let task = tokio::spawn(client.run());

        self.active = Some(LiveConnection {
            room_id: room_id.to_string(),
            commands: command_tx,
            state: state_rx,
            task,
        });
        event_rx
    }

    /// Fire-and-forget. Silently does nothing unless the channel is live.
    pub fn send(&self, room_id: &str, sender: &str, content: &str) {
        let Some(active) = &self.active else {
            log::debug!("send ignored: no live connection");
            return;
        };
        if *active.state.borrow() != ConnectionState::Connected {
            log::debug!("send ignored: connection is {:?}", *active.state.borrow());
            return;
        }
        let command = NetworkCommand::Send {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
        };
        if active.commands.send(command).is_err() {
            log::debug!("send ignored: live session already stopped");
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("Tearing down live connection for room {}", active.room_id);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map(|active| *active.state.borrow())
            .unwrap_or_default()
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.room_id.as_str())
    }

    /// Inbound payloads dropped as unparseable since this manager was created.
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::network::stomp::Heartbeat;

    fn unreachable_config() -> LiveConfig {
        LiveConfig {
            // Port 9 (discard) on loopback is closed in test environments.
            ws_url: "ws://127.0.0.1:9/websocket".to_string(),
            reconnect_delay: Duration::from_secs(60),
            heartbeat: Heartbeat::DISABLED,
            connect_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn send_without_connection_is_a_no_op() {
        let manager = ConnectionManager::new(unreachable_config());
        manager.send("abc123", "ana", "hello");
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.active_room(), None);
    }

    #[tokio::test]
    async fn connect_replaces_previous_room_and_closes_its_channel() {
        let mut manager = ConnectionManager::new(unreachable_config());
        let mut first = manager.connect("room-a");
        let _second = manager.connect("room-b");

        assert_eq!(manager.active_room(), Some("room-b"));
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while first.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "old room channel should close after teardown");
    }

    #[tokio::test]
    async fn failed_attempt_reports_error_without_disconnect_event() {
        let mut manager = ConnectionManager::new(unreachable_config());
        let mut events = manager.connect("room-a");

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("an event within the connect timeout");
        assert!(matches!(event, Some(NetworkEvent::TransportError(_))));
        assert_eq!(manager.state(), ConnectionState::Errored);

        manager.send("room-a", "ana", "dropped");
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
