use std::collections::HashSet;

use crate::common::Message;

/// One ordered, de-duplicated view over history pages and live deliveries.
///
/// History only ever touches the head and live delivery only the tail, so
/// `prepend` and `append` commute. Nothing here re-sorts: every batch must
/// already be chronological.
#[derive(Debug, Clone, Default)]
pub struct MessageReconciler {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the newest page. Live messages that arrived before it and
    /// are not part of it stay at the tail.
    pub fn seed(&mut self, batch: Vec<Message>) -> usize {
        let early_arrivals = std::mem::take(&mut self.messages);
        self.ids.clear();

        for message in batch {
            self.push_unique(message);
        }
        let seeded = self.messages.len();
        for message in early_arrivals {
            self.push_unique(message);
        }
        seeded
    }

    /// Inserts an older batch at the head. Entries whose id is already held
    /// are skipped. Returns how many were inserted.
    pub fn prepend(&mut self, batch: Vec<Message>) -> usize {
        let mut fresh = Vec::with_capacity(batch.len());
        for message in batch {
            if let Some(id) = message.identity() {
                if !self.ids.insert(id.to_string()) {
                    continue;
                }
            }
            fresh.push(message);
        }

        if let (Some(newest), Some(head)) = (fresh.last(), self.messages.first()) {
            if newest.timestamp > head.timestamp {
                log::warn!(
                    "Prepended batch ends at {} after current head {}; order not repaired",
                    newest.timestamp,
                    head.timestamp
                );
            }
        }

        let inserted = fresh.len();
        self.messages.splice(0..0, fresh);
        inserted
    }

    /// Adds a live message at the tail. `false` if its id is already held.
    pub fn append(&mut self, message: Message) -> bool {
        if let Some(tail) = self.messages.last() {
            if message.timestamp < tail.timestamp {
                log::debug!(
                    "Live message at {} is older than tail {}",
                    message.timestamp,
                    tail.timestamp
                );
            }
        }
        self.push_unique(message)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    // Messages without an id are never de-duplicated.
    fn push_unique(&mut self, message: Message) -> bool {
        if let Some(id) = message.identity() {
            if !self.ids.insert(id.to_string()) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }
}
