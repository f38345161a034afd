use std::sync::Arc;

use crate::common::MessagePage;
use crate::error::FetchError;

use super::store::HistoryStore;

/// The backend rejects page sizes outside this range.
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Fetches history pages and hands them out in chronological order.
#[derive(Clone)]
pub struct HistoryPaginator {
    store: Arc<dyn HistoryStore>,
    page_size: u32,
}

impl HistoryPaginator {
    pub fn new(store: Arc<dyn HistoryStore>, page_size: u32) -> Self {
        Self {
            store,
            page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Errors propagate as-is; nothing is retried here.
    pub async fn fetch_page(&self, room_id: &str, page_index: u32) -> Result<MessagePage, FetchError> {
        let response = self
            .store
            .fetch_page(room_id, page_index, self.page_size)
            .await?;
        let is_last_page = response.is_last(page_index);
        let mut messages = response.content;
        // Store pages are newest-first; everything downstream expects oldest-first.
        messages.reverse();

        log::debug!(
            "Fetched page {page_index} of room {room_id}: {} messages, last={is_last_page}",
            messages.len()
        );
        Ok(MessagePage {
            room_id: room_id.to_string(),
            page_index,
            messages,
            is_last_page,
        })
    }
}

/// Which page comes next for one room, and whether history has run out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    oldest_page_fetched: Option<u32>,
    exhausted: bool,
}

impl HistoryCursor {
    /// `None` once a last page has been recorded.
    pub fn next_page(&self) -> Option<u32> {
        if self.exhausted {
            return None;
        }
        Some(self.oldest_page_fetched.map_or(0, |page| page + 1))
    }

    /// Accepts only the page that was due next; anything else is left unrecorded.
    pub fn record(&mut self, page: &MessagePage) -> bool {
        if self.next_page() != Some(page.page_index) {
            return false;
        }
        self.oldest_page_fetched = Some(page.page_index);
        self.exhausted = page.is_last_page;
        true
    }

    /// `-1` before any page has been recorded.
    pub fn oldest_page_fetched(&self) -> i64 {
        self.oldest_page_fetched.map_or(-1, i64::from)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_index: u32, is_last_page: bool) -> MessagePage {
        MessagePage {
            room_id: "abc123".to_string(),
            page_index,
            messages: Vec::new(),
            is_last_page,
        }
    }

    #[test]
    fn cursor_walks_pages_until_last() {
        let mut cursor = HistoryCursor::default();
        assert_eq!(cursor.oldest_page_fetched(), -1);
        assert_eq!(cursor.next_page(), Some(0));

        assert!(cursor.record(&page(0, false)));
        assert_eq!(cursor.next_page(), Some(1));

        assert!(cursor.record(&page(1, true)));
        assert_eq!(cursor.oldest_page_fetched(), 1);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next_page(), None);
    }

    #[test]
    fn cursor_ignores_unexpected_pages() {
        let mut cursor = HistoryCursor::default();
        assert!(!cursor.record(&page(1, false)));
        assert!(cursor.record(&page(0, false)));
        assert!(!cursor.record(&page(0, false)));
        assert_eq!(cursor.oldest_page_fetched(), 0);
    }
}
