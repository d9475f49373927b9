/// Distance from the bottom, in pixels, that still counts as "at the bottom".
pub const AUTO_FOLLOW_THRESHOLD_PX: f32 = 50.0;

/// Decides whether a log update should move the viewport to the bottom.
///
/// Only growth in the number of visible messages scrolls, and only while the
/// viewport was following the tail before the update.
pub fn should_auto_scroll(
    previous_visible: usize,
    current_visible: usize,
    near_bottom: bool,
) -> bool {
    near_bottom && current_visible > previous_visible
}

/// Follow-the-tail state for one message viewport, independent from message content.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollManager {
    follow_bottom: bool,
    pending_scroll_to_bottom: bool,
    last_visible_count: usize,
    content_changed_since_report: bool,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            follow_bottom: true,
            pending_scroll_to_bottom: false,
            last_visible_count: 0,
            content_changed_since_report: false,
        }
    }

    pub fn is_following_bottom(&self) -> bool {
        self.follow_bottom
    }

    /// Forces follow mode back on, e.g. after the user submits a message.
    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
        self.follow_bottom = true;
    }

    /// Starts tracking a freshly displayed conversation.
    pub fn reset(&mut self, visible_count: usize) {
        self.follow_bottom = true;
        self.pending_scroll_to_bottom = true;
        self.last_visible_count = visible_count;
        self.content_changed_since_report = false;
    }

    /// Records a viewport position reported by the presentation layer.
    pub fn update_follow_state(&mut self, distance_from_bottom: f32) {
        let near_bottom = distance_from_bottom <= AUTO_FOLLOW_THRESHOLD_PX;

        // Growth below a following viewport moves the bottom away without any user action.
        if self.pending_scroll_to_bottom
            || (self.content_changed_since_report && self.follow_bottom)
        {
            self.follow_bottom = true;
        } else {
            self.follow_bottom = near_bottom;
        }

        self.content_changed_since_report = false;
    }

    /// Records the visible log after a mutation of the displayed conversation.
    ///
    /// `content_grew` covers a streaming message getting longer without a new row.
    pub fn observe_messages(&mut self, visible_count: usize, content_grew: bool) {
        let previous = std::mem::replace(&mut self.last_visible_count, visible_count);

        if should_auto_scroll(previous, visible_count, self.follow_bottom)
            || (content_grew && self.follow_bottom)
        {
            self.pending_scroll_to_bottom = true;
        }

        if content_grew || visible_count != previous {
            self.content_changed_since_report = true;
        }
    }

    /// Returns whether the viewport should jump to the bottom now, clearing the request.
    pub fn apply_pending_scroll(&mut self) -> bool {
        let should_scroll = self.pending_scroll_to_bottom;
        self.pending_scroll_to_bottom = false;
        should_scroll
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_rule_scrolls_only_on_growth_at_bottom() {
        assert!(should_auto_scroll(3, 4, true));
        assert!(!should_auto_scroll(3, 4, false));
        assert!(!should_auto_scroll(4, 4, true));
    }

    #[test]
    fn new_message_at_bottom_scrolls() {
        let mut scroll = ScrollManager::new();
        scroll.reset(1);
        scroll.apply_pending_scroll();
        scroll.update_follow_state(0.0);

        scroll.observe_messages(2, false);
        assert!(scroll.apply_pending_scroll());
    }

    #[test]
    fn scrolled_up_viewport_is_left_alone() {
        let mut scroll = ScrollManager::new();
        scroll.reset(1);
        scroll.apply_pending_scroll();
        scroll.update_follow_state(400.0);
        assert!(!scroll.is_following_bottom());

        for count in 2..10 {
            scroll.observe_messages(count, true);
            assert!(!scroll.apply_pending_scroll());
        }
    }

    #[test]
    fn submit_forces_follow_again() {
        let mut scroll = ScrollManager::new();
        scroll.reset(1);
        scroll.apply_pending_scroll();
        scroll.update_follow_state(400.0);

        scroll.request_scroll_to_bottom();
        assert!(scroll.is_following_bottom());
        scroll.observe_messages(2, false);
        assert!(scroll.apply_pending_scroll());
    }

    #[test]
    fn growth_below_viewport_does_not_pause_follow() {
        let mut scroll = ScrollManager::new();
        scroll.reset(1);
        scroll.apply_pending_scroll();
        scroll.update_follow_state(0.0);

        scroll.observe_messages(2, true);
        assert!(scroll.apply_pending_scroll());
        // The viewport reports its position before catching up with the new tail.
        scroll.update_follow_state(300.0);
        assert!(scroll.is_following_bottom());

        // A later report without intervening growth is a user scroll.
        scroll.update_follow_state(300.0);
        assert!(!scroll.is_following_bottom());
    }

    #[test]
    fn returning_to_bottom_resumes_follow() {
        let mut scroll = ScrollManager::new();
        scroll.reset(1);
        scroll.apply_pending_scroll();
        scroll.update_follow_state(200.0);
        assert!(!scroll.is_following_bottom());

        scroll.update_follow_state(AUTO_FOLLOW_THRESHOLD_PX);
        assert!(scroll.is_following_bottom());
    }
}
