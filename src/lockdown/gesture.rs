/// Touches must begin this close to the left edge to count as a back-swipe
pub const EDGE_ZONE_PX: f64 = 20.0;
/// Rightward travel after which an edge touch is treated as a back-swipe
pub const SWIPE_THRESHOLD_PX: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct TouchOrigin {
    x: f64,
    y: f64,
}

/// Tracks one touch sequence and recognises the browser back-swipe gesture
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwipeTracker {
    origin: Option<TouchOrigin>,
}

impl SwipeTracker {
    pub fn touch_start(&mut self, x: f64, y: f64) {
        self.origin = if x <= EDGE_ZONE_PX {
            Some(TouchOrigin { x, y })
        } else {
            None
        };
    }

    /// Returns true when this move belongs to a back-swipe and must be suppressed
    pub fn touch_move(&self, x: f64, y: f64) -> bool {
        let Some(origin) = self.origin else {
            return false;
        };
        let dx = x - origin.x;
        let dy = y - origin.y;
        dx > SWIPE_THRESHOLD_PX && dx.abs() > dy.abs()
    }

    pub fn touch_end(&mut self) {
        self.origin = None;
    }
}

/// Trackpad horizontal scroll towards "back" while already at the left scroll
/// boundary triggers history navigation in some browsers.
pub fn is_back_scroll(delta_x: f64, delta_y: f64, scroll_left: f64) -> bool {
    scroll_left <= 0.0 && delta_x < 0.0 && delta_x.abs() > delta_y.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_swipe_to_the_right_is_detected() {
        let mut t = SwipeTracker::default();
        t.touch_start(5.0, 100.0);
        assert!(!t.touch_move(40.0, 100.0));
        assert!(t.touch_move(60.0, 110.0));
    }

    #[test]
    fn touches_away_from_the_edge_are_ignored() {
        let mut t = SwipeTracker::default();
        t.touch_start(21.0, 100.0);
        assert!(!t.touch_move(200.0, 100.0));
    }

    #[test]
    fn mostly_vertical_moves_are_scrolls() {
        let mut t = SwipeTracker::default();
        t.touch_start(0.0, 0.0);
        assert!(!t.touch_move(60.0, 80.0));
    }

    #[test]
    fn touch_end_resets_tracking() {
        let mut t = SwipeTracker::default();
        t.touch_start(0.0, 0.0);
        t.touch_end();
        assert!(!t.touch_move(100.0, 0.0));
    }

    #[test]
    fn wheel_back_scroll_only_at_left_boundary() {
        assert!(is_back_scroll(-30.0, 2.0, 0.0));
        assert!(!is_back_scroll(-30.0, 2.0, 120.0));
        assert!(!is_back_scroll(30.0, 2.0, 0.0));
        assert!(!is_back_scroll(-3.0, 40.0, 0.0));
    }
}
