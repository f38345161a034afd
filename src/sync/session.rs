use uuid::Uuid;

use crate::common::{ConnectionState, Message, MessagePage};
use crate::error::{FetchError, PreconditionError};
use crate::history::HistoryCursor;

use super::reconciler::MessageReconciler;
use super::scroll::{ScrollCoordinator, ScrollState, Viewport};

/// A history page the view should go and fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub room_id: String,
    pub page_index: u32,
    /// The room visit that asked for it.
    pub visit: Uuid,
}

impl PageRequest {
    /// Tags a fetch result with this request's room and visit.
    pub fn complete(self, result: Result<MessagePage, FetchError>) -> HistoryResponse {
        HistoryResponse {
            room_id: self.room_id,
            page_index: self.page_index,
            visit: self.visit,
            result,
        }
    }
}

/// Completion of a history fetch, tagged with the visit it was issued for.
#[derive(Debug)]
pub struct HistoryResponse {
    pub room_id: String,
    pub page_index: u32,
    pub visit: Uuid,
    pub result: Result<MessagePage, FetchError>,
}

/// What applying a history response did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Seeded { messages: usize },
    Prepended { messages: usize },
    /// Belonged to another room or an earlier visit; nothing changed.
    Stale,
    /// Fetch failed; nothing changed.
    Failed,
    /// Not the page that was due; nothing changed.
    Ignored,
}

/// What applying a live message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOutcome {
    pub appended: bool,
    /// The view was near the bottom before the append and should follow it.
    pub follow_tail: bool,
    /// Appended out of sight below a loaded history.
    pub unseen_below: bool,
}

/// Synchronization state for one room visit. Created on entry, dropped on
/// exit or switch.
#[derive(Debug)]
pub struct RoomSession {
    room_id: String,
    visit: Uuid,
    identity: String,
    reconciler: MessageReconciler,
    cursor: HistoryCursor,
    connection_state: ConnectionState,
    scroll: ScrollCoordinator,
    initial_in_flight: bool,
}

impl RoomSession {
    /// Refuses to start without a room id or a display name.
    pub fn open(room_id: &str, identity: &str, follow_threshold: f64) -> Result<Self, PreconditionError> {
        let room_id = room_id.trim();
        let identity = identity.trim();
        if room_id.is_empty() {
            return Err(PreconditionError::MissingRoom);
        }
        if identity.is_empty() {
            return Err(PreconditionError::MissingIdentity);
        }
        Ok(Self {
            room_id: room_id.to_string(),
            visit: Uuid::new_v4(),
            identity: identity.to_string(),
            reconciler: MessageReconciler::new(),
            cursor: HistoryCursor::default(),
            connection_state: ConnectionState::Disconnected,
            scroll: ScrollCoordinator::new(follow_threshold),
            initial_in_flight: false,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Distinguishes this visit from earlier visits to the same room.
    pub fn visit(&self) -> Uuid {
        self.visit
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn messages(&self) -> &[Message] {
        self.reconciler.messages()
    }

    pub fn oldest_page_fetched(&self) -> i64 {
        self.cursor.oldest_page_fetched()
    }

    pub fn history_exhausted(&self) -> bool {
        self.cursor.is_exhausted()
    }

    pub fn initial_load_complete(&self) -> bool {
        self.cursor.oldest_page_fetched() >= 0
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.scroll.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
    }

    /// Send affordances are gated on the live channel being up.
    pub fn can_send(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// Page 0. `None` once loaded or while already in flight.
    pub fn initial_request(&mut self) -> Option<PageRequest> {
        if self.initial_load_complete() || self.initial_in_flight {
            return None;
        }
        self.initial_in_flight = true;
        Some(self.request(0))
    }

    /// Next older page if the top sentinel is visible and a fetch is allowed.
    /// Before the first page has landed this retries the initial load instead.
    pub fn request_older(&mut self, viewport: &Viewport) -> Option<PageRequest> {
        if !self.initial_load_complete() {
            return self.initial_request();
        }
        let page_index = self.cursor.next_page()?;
        if !self.scroll.try_begin_fetch(viewport, self.cursor.is_exhausted()) {
            return None;
        }
        Some(self.request(page_index))
    }

    /// Applies a fetch completion. `viewport` is the view before any change.
    pub fn apply_history(&mut self, response: HistoryResponse, viewport: &Viewport) -> HistoryOutcome {
        if response.room_id != self.room_id {
            log::info!(
                "Discarding page {} for room {} (active room is {})",
                response.page_index,
                response.room_id,
                self.room_id
            );
            return HistoryOutcome::Stale;
        }
        if response.visit != self.visit {
            log::info!(
                "Discarding page {} for room {} from an earlier visit",
                response.page_index,
                self.room_id
            );
            return HistoryOutcome::Stale;
        }

        let page = match response.result {
            Ok(page) => page,
            Err(err) => {
                log::warn!(
                    "History page {} for room {} failed: {err}",
                    response.page_index,
                    self.room_id
                );
                if response.page_index == 0 && !self.initial_load_complete() {
                    self.initial_in_flight = false;
                } else {
                    self.scroll.fetch_failed();
                }
                return HistoryOutcome::Failed;
            }
        };

        if page.room_id != self.room_id {
            return HistoryOutcome::Stale;
        }
        if !self.cursor.record(&page) {
            log::debug!("Ignoring unexpected page {} for room {}", page.page_index, self.room_id);
            return HistoryOutcome::Ignored;
        }

        if page.page_index == 0 {
            self.initial_in_flight = false;
            let messages = self.reconciler.seed(page.messages);
            self.scroll.arm();
            HistoryOutcome::Seeded { messages }
        } else {
            self.scroll.fetch_completed(viewport);
            let messages = self.reconciler.prepend(page.messages);
            HistoryOutcome::Prepended { messages }
        }
    }

    /// New offset once the view has grown by the prepended content.
    pub fn restore_anchor(&mut self, after_prepend: &Viewport) -> Option<f64> {
        self.scroll.restore_anchor(after_prepend)
    }

    /// Appends a live delivery. `viewport` is the view before the append.
    pub fn apply_live(&mut self, message: Message, viewport: &Viewport) -> LiveOutcome {
        if !message.room_id.is_empty() && message.room_id != self.room_id {
            log::warn!(
                "Dropping live message for room {} in room {}",
                message.room_id,
                self.room_id
            );
            return LiveOutcome {
                appended: false,
                follow_tail: false,
                unseen_below: false,
            };
        }
        let follow_tail = self.scroll.should_follow_tail(viewport);
        let appended = self.reconciler.append(message);
        LiveOutcome {
            appended,
            follow_tail: appended && follow_tail,
            // Before page 0 lands the seed scrolls to the bottom anyway.
            unseen_below: appended && !follow_tail && self.initial_load_complete(),
        }
    }

    /// Leaving the room: scroll machine back to idle, no further backfill.
    pub fn close(&mut self) {
        self.scroll.reset();
        self.connection_state = ConnectionState::Disconnected;
    }

    fn request(&self, page_index: u32) -> PageRequest {
        PageRequest {
            room_id: self.room_id.clone(),
            page_index,
            visit: self.visit,
        }
    }
}
