#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::{SinkExt, StreamExt};
use rust_room_chat::common::{Message, Room};
use rust_room_chat::error::FetchError;
use rust_room_chat::history::{HistoryStore, PageResponse, RoomDirectory};
use rust_room_chat::network::stomp::{self, Frame};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub fn message(room_id: &str, n: u32) -> Message {
    Message {
        id: Some(format!("m{n}")),
        room_id: room_id.to_string(),
        sender: if n % 2 == 0 { "ana" } else { "bo" }.to_string(),
        content: format!("message {n}"),
        timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::minutes(i64::from(n)),
    }
}

pub fn numbers(messages: &[Message]) -> Vec<u32> {
    messages
        .iter()
        .map(|m| m.id.as_deref().unwrap()[1..].parse().unwrap())
        .collect()
}

/// History store over an in-memory, chronologically ordered message list.
#[derive(Default)]
pub struct MemoryHistoryStore {
    rooms: Mutex<HashMap<String, Vec<Message>>>,
    pub calls: AtomicUsize,
    pub fail_next: AtomicBool,
}

impl MemoryHistoryStore {
    pub fn with_room(room_id: &str, count: u32) -> Self {
        let store = Self::default();
        for n in 1..=count {
            store.persist(message(room_id, n));
        }
        store
    }

    pub fn persist(&self, message: Message) {
        self.rooms
            .lock()
            .unwrap()
            .entry(message.room_id.clone())
            .or_default()
            .push(message);
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn fetch_page(
        &self,
        room_id: &str,
        page_no: u32,
        page_size: u32,
    ) -> Result<PageResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 503,
                url: format!("memory://{room_id}/{page_no}"),
            });
        }

        let rooms = self.rooms.lock().unwrap();
        let all = rooms.get(room_id).cloned().unwrap_or_default();
        let total = all.len() as u32;
        let newest_first: Vec<_> = all.into_iter().rev().collect();
        let start = (page_no * page_size).min(total) as usize;
        let end = ((page_no + 1) * page_size).min(total) as usize;
        let total_pages = total.div_ceil(page_size);

        Ok(PageResponse {
            content: newest_first[start..end].to_vec(),
            number: Some(page_no),
            size: Some(page_size),
            last: Some(page_no + 1 >= total_pages),
            total_pages: Some(total_pages),
            total_elements: Some(u64::from(total)),
            page: None,
        })
    }
}

/// Room directory handing out sequential codes `r1`, `r2`, ...
#[derive(Default)]
pub struct MemoryRoomDirectory {
    rooms: Mutex<Vec<Room>>,
    pub lookups: AtomicUsize,
}

impl MemoryRoomDirectory {
    pub fn with_rooms(codes: &[&str]) -> Self {
        let directory = Self::default();
        directory.rooms.lock().unwrap().extend(codes.iter().map(|code| Room {
            id: code.to_string(),
            room_name: format!("room {code}"),
        }));
        directory
    }
}

#[async_trait]
impl RoomDirectory for MemoryRoomDirectory {
    async fn create_room(&self, room_name: &str) -> Result<Room, FetchError> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = Room {
            id: format!("r{}", rooms.len() + 1),
            room_name: room_name.to_string(),
        };
        rooms.push(room.clone());
        Ok(room)
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<Room>, FetchError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.iter().find(|room| room.id == room_id).cloned())
    }
}

struct Subscriber {
    destination: String,
    outbox: mpsc::UnboundedSender<String>,
}

/// Minimal STOMP-over-WebSocket broker for exercising the live client.
pub struct StubBroker {
    addr: SocketAddr,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    pub sent: mpsc::UnboundedReceiver<(String, String)>,
}

impl StubBroker {
    pub async fn start() -> Self {
        Self::start_with_heartbeat("0,0").await
    }

    /// `heartbeat` is what CONNECTED advertises; the stub never actually beats.
    pub async fn start_with_heartbeat(heartbeat: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let subscribers = Arc::new(Mutex::new(Vec::<Subscriber>::new()));
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();

        let shared = Arc::clone(&subscribers);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = Arc::clone(&shared);
                let sent_tx = sent_tx.clone();
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    serve(ws, heartbeat, shared, sent_tx).await;
                });
            }
        });

        Self {
            addr,
            subscribers,
            sent: sent_rx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/websocket/websocket", self.addr)
    }

    pub fn subscriber_count(&self, destination: &str) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|sub| !sub.outbox.is_closed());
        subscribers
            .iter()
            .filter(|sub| sub.destination == destination)
            .count()
    }

    pub async fn wait_for_subscribers(&self, destination: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.subscriber_count(destination) != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} subscribers on {destination}"));
    }

    /// Pushes raw text to every subscriber of `destination`.
    pub fn publish_raw(&self, destination: &str, text: &str) -> usize {
        let subscribers = self.subscribers.lock().unwrap();
        subscribers
            .iter()
            .filter(|sub| sub.destination == destination)
            .filter(|sub| sub.outbox.send(text.to_string()).is_ok())
            .count()
    }

    pub fn publish(&self, destination: &str, message: &Message) -> usize {
        let frame = Frame::new("MESSAGE")
            .header("destination", destination)
            .header("subscription", "sub-0")
            .header("message-id", message.id.clone().unwrap_or_default())
            .body(serde_json::to_string(message).unwrap());
        self.publish_raw(destination, &frame.encode())
    }

    /// Closes every open connection from the broker side.
    pub fn drop_connections(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    heartbeat: &'static str,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    sent: mpsc::UnboundedSender<(String, String)>,
) {
    let (mut sink, mut source) = ws.split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<String>();
    let mut outbox_tx = Some(outbox_tx);

    loop {
        tokio::select! {
            outgoing = outbox_rx.recv() => match outgoing {
                Some(text) => {
                    if sink.send(WsMessage::Text(text)).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            incoming = source.next() => {
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(_)) => continue,
                    _ => return,
                };
                let Ok(frames) = stomp::decode(&text) else {
                    continue;
                };
                for frame in frames {
                    match frame.command.as_str() {
                        "CONNECT" => {
                            let connected = Frame::new("CONNECTED")
                                .header("version", "1.2")
                                .header("heart-beat", heartbeat);
                            if sink.send(WsMessage::Text(connected.encode())).await.is_err() {
                                return;
                            }
                        }
                        "SUBSCRIBE" => {
                            if let Some(outbox) = outbox_tx.take() {
                                subscribers.lock().unwrap().push(Subscriber {
                                    destination: frame.get("destination").unwrap_or_default().to_string(),
                                    outbox,
                                });
                            }
                        }
                        "SEND" => {
                            let destination = frame.get("destination").unwrap_or_default().to_string();
                            let _ = sent.send((destination, frame.body.clone()));
                        }
                        "DISCONNECT" => return,
                        _ => {}
                    }
                }
            }
        }
    }
}
