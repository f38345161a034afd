use std::future::pending;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::common::{ConnectionState, NetworkEvent, Room};
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::history::{HistoryPaginator, RoomDirectory};
use crate::network::ConnectionManager;
use crate::sync::{HistoryOutcome, HistoryResponse, PageRequest, RoomSession, Viewport};

use super::input::{self, UserInput};
use super::render::{format_message, visible_window};

/// Completions of work the view spawned off its own loop.
#[derive(Debug)]
enum ViewTask {
    RoomResolved {
        requested: String,
        result: Result<Room, FetchError>,
    },
    History(HistoryResponse),
}

/// The room currently on screen. Owns its session exclusively.
struct ActiveRoom {
    room: Room,
    session: RoomSession,
    events: Option<mpsc::Receiver<NetworkEvent>>,
    viewport: Viewport,
}

/// Line-oriented chat view: prints the room and reads commands from input.
pub struct ChatView {
    identity: String,
    directory: Arc<dyn RoomDirectory>,
    paginator: HistoryPaginator,
    connections: ConnectionManager,
    follow_threshold: f64,
    visible_rows: f64,
    active: Option<ActiveRoom>,
    task_sender: mpsc::UnboundedSender<ViewTask>,
    task_receiver: mpsc::UnboundedReceiver<ViewTask>,
}

/// Where to go right after start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomTarget {
    Join(String),
    Create(String),
}

impl ChatView {
    pub fn new(
        config: &AppConfig,
        identity: String,
        directory: Arc<dyn RoomDirectory>,
        paginator: HistoryPaginator,
    ) -> Self {
        let (task_sender, task_receiver) = mpsc::unbounded_channel();
        Self {
            identity,
            directory,
            paginator,
            connections: ConnectionManager::new(config.live()),
            follow_threshold: config.follow_threshold,
            visible_rows: f64::from(config.visible_rows),
            active: None,
            task_sender,
            task_receiver,
        }
    }

    pub async fn run<R>(mut self, target: Option<RoomTarget>, input: R)
    where
        R: AsyncBufRead + Unpin,
    {
        match target {
            Some(RoomTarget::Join(code)) => self.resolve_room(code),
            Some(RoomTarget::Create(name)) => self.create_room(name),
            None => println!("Type /help for commands."),
        }

        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !self.handle_input(&line) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        log::warn!("Failed to read input: {err}");
                        break;
                    }
                },
                event = next_event(&mut self.active) => self.handle_network_event(event),
                Some(task) = self.task_receiver.recv() => self.handle_task(task),
            }
        }

        self.leave_room();
    }

    /// Returns `false` to stop the view.
    fn handle_input(&mut self, line: &str) -> bool {
        match input::parse(line) {
            UserInput::Say(text) => self.say(&text),
            UserInput::Create(name) => self.create_room(name),
            UserInput::Join(code) => self.resolve_room(code),
            UserInput::Older => {
                if let Some(active) = self.active.as_mut() {
                    active.viewport.scroll_to(0.0);
                }
                self.maybe_backfill();
            }
            UserInput::Up(rows) => self.scroll_by(-f64::from(rows)),
            UserInput::Down(rows) => self.scroll_by(f64::from(rows)),
            UserInput::Leave => {
                self.leave_room();
                println!("Left the room.");
            }
            UserInput::Quit => return false,
            UserInput::Help => println!("{}", input::HELP),
            UserInput::Unknown(raw) => println!("Unknown command `{raw}`; try /help"),
            UserInput::Empty => {}
        }
        true
    }

    fn say(&mut self, text: &str) {
        let Some(active) = &self.active else {
            println!("Join a room first.");
            return;
        };
        if !active.session.can_send() {
            println!("Not connected; message not sent.");
            return;
        }
        self.connections
            .send(active.session.room_id(), active.session.identity(), text);
    }

    fn create_room(&self, name: String) {
        let directory = Arc::clone(&self.directory);
        let sender = self.task_sender.clone();
        tokio::spawn(async move {
            let result = directory.create_room(&name).await;
            let _ = sender.send(ViewTask::RoomResolved {
                requested: name,
                result,
            });
        });
    }

    fn resolve_room(&self, code: String) {
        let directory = Arc::clone(&self.directory);
        let sender = self.task_sender.clone();
        tokio::spawn(async move {
            let result = match directory.find_room(&code).await {
                Ok(Some(room)) => Ok(room),
                Ok(None) => Err(FetchError::RoomNotFound(code.clone())),
                Err(err) => Err(err),
            };
            let _ = sender.send(ViewTask::RoomResolved {
                requested: code,
                result,
            });
        });
    }

    fn spawn_fetch(&self, request: PageRequest) {
        let paginator = self.paginator.clone();
        let sender = self.task_sender.clone();
        tokio::spawn(async move {
            let result = paginator
                .fetch_page(&request.room_id, request.page_index)
                .await;
            let _ = sender.send(ViewTask::History(request.complete(result)));
        });
    }

    fn handle_task(&mut self, task: ViewTask) {
        match task {
            ViewTask::RoomResolved { requested, result } => match result {
                Ok(room) => self.enter_room(room),
                Err(err) => println!("Could not open room `{requested}`: {err}"),
            },
            ViewTask::History(response) => self.handle_history(response),
        }
    }

    fn enter_room(&mut self, room: Room) {
        self.leave_room();

        let mut session = match RoomSession::open(&room.id, &self.identity, self.follow_threshold) {
            Ok(session) => session,
            Err(err) => {
                println!("Cannot enter room: {err}");
                return;
            }
        };
        if let Some(request) = session.initial_request() {
            self.spawn_fetch(request);
        }
        let events = self.connections.connect(&room.id);
        session.set_connection_state(self.connections.state());

        println!("== {} (code {}) ==", room.room_name, room.id);
        println!("Loading messages...");
        self.active = Some(ActiveRoom {
            room,
            session,
            events: Some(events),
            viewport: Viewport::new(self.visible_rows),
        });
    }

    /// Tears the connection down before the session goes away.
    fn leave_room(&mut self) {
        self.connections.disconnect();
        if let Some(mut active) = self.active.take() {
            active.session.close();
            log::info!("Left room {}", active.room.id);
        }
    }

    fn handle_history(&mut self, response: HistoryResponse) {
        let Some(active) = self.active.as_mut() else {
            log::debug!("Dropping history for room {}: no active room", response.room_id);
            return;
        };

        let before = active.viewport;
        match active.session.apply_history(response, &before) {
            HistoryOutcome::Seeded { messages } => {
                active.viewport.content_extent = active.session.messages().len() as f64;
                active.viewport.scroll_to_bottom();
                if messages == 0 {
                    println!("No messages yet. Start the conversation.");
                }
                print_window(active);
            }
            HistoryOutcome::Prepended { messages } => {
                active.viewport.content_extent = active.session.messages().len() as f64;
                if let Some(offset) = active.session.restore_anchor(&active.viewport) {
                    active.viewport.scroll_to(offset);
                }
                println!("-- {messages} older messages loaded --");
                if active.session.history_exhausted() {
                    println!("-- beginning of history --");
                }
            }
            HistoryOutcome::Failed => println!("Could not load messages; try /older again."),
            HistoryOutcome::Stale | HistoryOutcome::Ignored => {}
        }
    }

    fn handle_network_event(&mut self, event: Option<NetworkEvent>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(event) = event else {
            active.events = None;
            active.session.set_connection_state(ConnectionState::Disconnected);
            return;
        };

        match event {
            NetworkEvent::MessageReceived(message) => {
                let before = active.viewport;
                let line = format_message(&message, active.session.identity());
                let outcome = active.session.apply_live(message, &before);
                if !outcome.appended {
                    return;
                }
                active.viewport.content_extent = active.session.messages().len() as f64;
                if outcome.follow_tail {
                    active.viewport.scroll_to_bottom();
                    println!("{line}");
                } else if outcome.unseen_below {
                    println!("(new message below; /down to read)");
                }
            }
            NetworkEvent::Connected => {
                active.session.set_connection_state(ConnectionState::Connected);
                println!("* connected");
            }
            NetworkEvent::Disconnected => {
                active.session.set_connection_state(ConnectionState::Disconnected);
                println!("* disconnected, reconnecting...");
            }
            NetworkEvent::TransportError(reason) => {
                active.session.set_connection_state(self.connections.state());
                log::debug!("Transport error in room {}: {reason}", active.room.id);
            }
        }
    }

    fn scroll_by(&mut self, rows: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.viewport.scroll_to(active.viewport.offset + rows);
        print_window(active);
        self.maybe_backfill();
    }

    fn maybe_backfill(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.session.history_exhausted() {
            println!("-- beginning of history --");
            return;
        }
        if let Some(request) = active.session.request_older(&active.viewport) {
            println!("Loading history...");
            self.spawn_fetch(request);
        }
    }
}

fn print_window(active: &ActiveRoom) {
    for message in visible_window(active.session.messages(), &active.viewport) {
        println!("{}", format_message(message, active.session.identity()));
    }
}

async fn next_event(active: &mut Option<ActiveRoom>) -> Option<NetworkEvent> {
    match active.as_mut().and_then(|active| active.events.as_mut()) {
        Some(events) => events.recv().await,
        None => pending().await,
    }
}
