use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

use crate::common::{ConnectionState, Message, NetworkCommand, NetworkEvent, OutgoingMessage};
use crate::error::{ParseError, TransportError};

use super::stomp::{self, Frame, HEARTBEAT, Heartbeat};
use super::transport::{WsStream, build_transport};

type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Settings for the live channel.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub ws_url: String,
    /// Fixed delay between a loss and the next attempt.
    pub reconnect_delay: Duration,
    /// What the client offers in its CONNECT `heart-beat` header.
    pub heartbeat: Heartbeat,
    /// Bound on dial plus STOMP handshake.
    pub connect_timeout: Duration,
}

/// Long-running task owning one room's live session, reconnecting until shut down.
pub struct LiveClient {
    config: LiveConfig,
    room_id: String,
    event_sender: mpsc::Sender<NetworkEvent>,
    command_receiver: mpsc::UnboundedReceiver<NetworkCommand>,
    state: watch::Sender<ConnectionState>,
    parse_failures: Arc<AtomicU64>,
}

impl LiveClient {
    pub fn new(
        config: LiveConfig,
        room_id: &str,
        event_sender: mpsc::Sender<NetworkEvent>,
        command_receiver: mpsc::UnboundedReceiver<NetworkCommand>,
        state: watch::Sender<ConnectionState>,
        parse_failures: Arc<AtomicU64>,
    ) -> Self {
        Self {
            config,
            room_id: room_id.to_string(),
            event_sender,
            command_receiver,
            state,
            parse_failures,
        }
    }

    /// Runs until the command channel or the event receiver is dropped.
    pub async fn run(mut self) {
        log::info!("Live session for room {} started", self.room_id);

        loop {
            self.state.send_replace(ConnectionState::Connecting);
            let mut was_connected = false;

            match self.session(&mut was_connected).await {
                Ok(()) => break,
                Err(err) => {
                    log::warn!(
                        "Live channel for room {} lost: {err}; retrying in {:?}",
                        self.room_id,
                        self.config.reconnect_delay
                    );
                    let lost_live_session = was_connected
                        && matches!(
                            err,
                            TransportError::Closed
                                | TransportError::HeartbeatTimeout(_)
                                | TransportError::WebSocket(_)
                        );
                    self.state.send_replace(if lost_live_session {
                        ConnectionState::Disconnected
                    } else {
                        ConnectionState::Errored
                    });
                    if was_connected && !self.emit(NetworkEvent::Disconnected).await {
                        break;
                    }
                    if !self.emit(NetworkEvent::TransportError(err.to_string())).await {
                        break;
                    }
                }
            }

            if !self.wait_before_retry().await {
                break;
            }
        }

        self.state.send_replace(ConnectionState::Disconnected);
        log::info!("Live session for room {} stopped", self.room_id);
    }

    /// One connect-subscribe-pump cycle. `Ok` means a requested shutdown.
    async fn session(&mut self, was_connected: &mut bool) -> Result<(), TransportError> {
        let ws = build_transport(&self.config.ws_url, self.config.connect_timeout).await?;
        let (mut sink, mut source) = ws.split();

        sink.send(WsMessage::Text(Frame::connect(self.config.heartbeat).encode()))
            .await?;
        let connected = tokio::time::timeout(self.config.connect_timeout, await_connected(&mut source))
            .await
            .map_err(|_| TransportError::ConnectTimeout(self.config.connect_timeout))??;

        let server_heartbeat = connected
            .get("heart-beat")
            .and_then(Heartbeat::parse)
            .unwrap_or(Heartbeat::DISABLED);
        let agreed = self.config.heartbeat.negotiate(server_heartbeat);
        log::debug!("Negotiated heart-beat {agreed:?}");

        let destination = format!("/topic/room/{}", self.room_id);
        let subscription_id = format!("sub-{}", Uuid::new_v4());
        sink.send(WsMessage::Text(
            Frame::subscribe(&subscription_id, &destination).encode(),
        ))
        .await?;

        *was_connected = true;
        self.state.send_replace(ConnectionState::Connected);
        log::info!("Subscribed to {destination}");
        if !self.emit(NetworkEvent::Connected).await {
            return Ok(());
        }

        let mut outgoing = agreed.send_every.map(|every| {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        // Grace factor of two before a silent broker counts as gone.
        let silence_window = agreed.expect_within.map(|window| window * 2);
        let mut silence = silence_window.map(|window| Box::pin(tokio::time::sleep(window)));

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => match command {
                    Some(command) => self.handle_command(command, &mut sink).await?,
                    None => {
                        let _ = sink.send(WsMessage::Text(Frame::disconnect().encode())).await;
                        let _ = sink.close().await;
                        return Ok(());
                    }
                },
                _ = self.event_sender.closed() => return Ok(()),
                _ = tick(&mut outgoing) => {
                    sink.send(WsMessage::Text(HEARTBEAT.to_string())).await?;
                }
                _ = expire(&mut silence) => {
                    return Err(TransportError::HeartbeatTimeout(silence_window.unwrap_or_default()));
                }
                incoming = source.next() => {
                    if let (Some(sleep), Some(window)) = (silence.as_mut(), silence_window) {
                        sleep.as_mut().reset(Instant::now() + window);
                    }
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            if !self.handle_text(&text).await? {
                                return Ok(());
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return Err(err.into()),
                    }
                }
            }
        }
    }

    async fn handle_command(
        &mut self,
        command: NetworkCommand,
        sink: &mut WsSink,
    ) -> Result<(), TransportError> {
        match command {
            NetworkCommand::Send {
                room_id,
                sender,
                content,
            } => {
                let body = OutgoingMessage {
                    sender: &sender,
                    content: &content,
                };
                match serde_json::to_string(&body) {
                    Ok(json) => {
                        let destination = format!("/app/sendMessage/{room_id}");
                        sink.send(WsMessage::Text(Frame::send(&destination, json).encode()))
                            .await?;
                    }
                    Err(err) => log::warn!("Failed to serialize message: {err}"),
                }
            }
        }
        Ok(())
    }

    /// Returns `false` once nobody is listening for events any more.
    async fn handle_text(&mut self, text: &str) -> Result<bool, TransportError> {
        let frames = match stomp::decode(text) {
            Ok(frames) => frames,
            Err(err) => {
                self.count_parse_failure(&err);
                return Ok(true);
            }
        };

        for frame in frames {
            match frame.command.as_str() {
                "MESSAGE" => match serde_json::from_str::<Message>(&frame.body) {
                    Ok(mut message) => {
                        if message.room_id.is_empty() {
                            message.room_id = self.room_id.clone();
                        }
                        if !self.emit(NetworkEvent::MessageReceived(message)).await {
                            return Ok(false);
                        }
                    }
                    Err(err) => self.count_parse_failure(&ParseError::from(err)),
                },
                "ERROR" => {
                    let reason = frame.get("message").unwrap_or(frame.body.as_str());
                    return Err(TransportError::Broker(reason.to_string()));
                }
                other => log::debug!("Ignoring {other} frame"),
            }
        }
        Ok(true)
    }

    fn count_parse_failure(&self, err: &ParseError) {
        let total = self.parse_failures.fetch_add(1, Ordering::Relaxed) + 1;
        log::warn!(
            "Dropped inbound payload on room {}: {err} ({total} so far)",
            self.room_id
        );
    }

    async fn emit(&self, event: NetworkEvent) -> bool {
        self.event_sender.send(event).await.is_ok()
    }

    /// Sleeps out the retry delay. Sends issued meanwhile are dropped.
    async fn wait_before_retry(&mut self) -> bool {
        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => return true,
                _ = self.event_sender.closed() => return false,
                command = self.command_receiver.recv() => match command {
                    Some(command) => log::debug!("Not connected, dropping {command:?}"),
                    None => return false,
                },
            }
        }
    }
}

async fn await_connected(source: &mut WsSource) -> Result<Frame, TransportError> {
    while let Some(incoming) = source.next().await {
        let text = match incoming? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return Err(TransportError::Closed),
            _ => continue,
        };
        let frames = stomp::decode(&text).map_err(|err| TransportError::Handshake(err.to_string()))?;
        for frame in frames {
            match frame.command.as_str() {
                "CONNECTED" => return Ok(frame),
                "ERROR" => {
                    let reason = frame.get("message").unwrap_or(frame.body.as_str());
                    return Err(TransportError::Broker(reason.to_string()));
                }
                other => log::debug!("Unexpected {other} frame before CONNECTED"),
            }
        }
    }
    Err(TransportError::Closed)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn expire(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
