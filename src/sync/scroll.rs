/// Viewport geometry in content units (pixels, rows, whatever the view uses).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Distance scrolled from the top of the content.
    pub offset: f64,
    pub content_extent: f64,
    pub visible_extent: f64,
}

impl Viewport {
    pub fn new(visible_extent: f64) -> Self {
        Self {
            offset: 0.0,
            content_extent: 0.0,
            visible_extent,
        }
    }

    /// The top sentinel is on screen.
    pub fn at_top(&self) -> bool {
        self.offset <= 0.0
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_extent - self.offset - self.visible_extent).max(0.0)
    }

    pub fn max_offset(&self) -> f64 {
        (self.content_extent - self.visible_extent).max(0.0)
    }

    pub fn scroll_to(&mut self, offset: f64) {
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    Idle,
    FetchingHistory,
    RestoringAnchor,
}

/// Decides when to backfill and keeps the reader's anchor still across prepends.
#[derive(Debug, Clone)]
pub struct ScrollCoordinator {
    state: ScrollState,
    armed: bool,
    anchor_extent: f64,
    follow_threshold: f64,
}

impl ScrollCoordinator {
    pub fn new(follow_threshold: f64) -> Self {
        Self {
            state: ScrollState::Idle,
            armed: false,
            anchor_extent: 0.0,
            follow_threshold,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Called once the initial page is in; backfill stays off until then.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// `Idle -> FetchingHistory` when the sentinel shows and a fetch is allowed.
    pub fn try_begin_fetch(&mut self, viewport: &Viewport, history_exhausted: bool) -> bool {
        if !self.armed
            || history_exhausted
            || self.state != ScrollState::Idle
            || !viewport.at_top()
        {
            return false;
        }
        self.state = ScrollState::FetchingHistory;
        true
    }

    /// Records the extent before the older page is inserted.
    pub fn fetch_completed(&mut self, before_prepend: &Viewport) {
        if self.state != ScrollState::FetchingHistory {
            return;
        }
        self.anchor_extent = before_prepend.content_extent;
        self.state = ScrollState::RestoringAnchor;
    }

    /// A failed fetch leaves nothing to restore.
    pub fn fetch_failed(&mut self) {
        if self.state == ScrollState::FetchingHistory {
            self.state = ScrollState::Idle;
        }
    }

    /// Offset that keeps the same content under the reader once the view
    /// reflects the prepend. `None` outside `RestoringAnchor`.
    pub fn restore_anchor(&mut self, after_prepend: &Viewport) -> Option<f64> {
        if self.state != ScrollState::RestoringAnchor {
            return None;
        }
        self.state = ScrollState::Idle;
        let delta = after_prepend.content_extent - self.anchor_extent;
        Some(after_prepend.offset + delta)
    }

    /// Whether a tail append should pull the view down with it, judged on
    /// the viewport as it was before the append.
    pub fn should_follow_tail(&self, before_append: &Viewport) -> bool {
        self.armed && before_append.distance_from_bottom() < self.follow_threshold
    }

    /// Room changed.
    pub fn reset(&mut self) {
        self.state = ScrollState::Idle;
        self.armed = false;
        self.anchor_extent = 0.0;
    }
}
