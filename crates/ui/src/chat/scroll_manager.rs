use gpui::ScrollHandle;

/// Slack allowed below the bottom edge on desktop viewports.
pub const DESKTOP_HIT_BOTTOM_TOLERANCE: f32 = 10.0;
/// Mobile viewports must reach the exact bottom edge.
pub const MOBILE_HIT_BOTTOM_TOLERANCE: f32 = 0.0;

/// Geometry of the scrollable message container, in the DOM's terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub scroll_top: f32,
    pub client_height: f32,
    pub scroll_height: f32,
}

impl ScrollSample {
    pub fn new(scroll_top: f32, client_height: f32, scroll_height: f32) -> Self {
        Self {
            scroll_top,
            client_height,
            scroll_height,
        }
    }

    fn is_well_formed(&self) -> bool {
        [self.scroll_top, self.client_height, self.scroll_height]
            .iter()
            .all(|value| value.is_finite() && *value >= 0.0)
    }
}

/// Whether `sample` sits at the bottom of its content.
///
/// Missing or malformed geometry never counts as bottom.
pub fn is_hit_bottom(sample: Option<ScrollSample>, is_mobile: bool) -> bool {
    let Some(sample) = sample.filter(ScrollSample::is_well_formed) else {
        return false;
    };

    let tolerance = if is_mobile {
        MOBILE_HIT_BOTTOM_TOLERANCE
    } else {
        DESKTOP_HIT_BOTTOM_TOLERANCE
    };
    let bottom_height = sample.scroll_top + sample.client_height;
    bottom_height >= sample.scroll_height - tolerance
}

/// A scroll sample tagged with the viewport class it was taken under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollProbe {
    pub sample: Option<ScrollSample>,
    pub is_mobile: bool,
}

/// Hit-bottom and auto-scroll flags derived from the latest sampled probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollCoordinator {
    hit_bottom: bool,
    auto_scroll: bool,
}

impl ScrollCoordinator {
    pub fn new() -> Self {
        Self {
            hit_bottom: true,
            auto_scroll: true,
        }
    }

    pub fn hit_bottom(&self) -> bool {
        self.hit_bottom
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    /// Recomputes both flags from one probe and returns the new hit-bottom value.
    pub fn apply(&mut self, probe: ScrollProbe) -> bool {
        let hit_bottom = is_hit_bottom(probe.sample, probe.is_mobile);
        self.hit_bottom = hit_bottom;
        self.auto_scroll = hit_bottom;
        hit_bottom
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
    }
}

impl Default for ScrollCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the message container's scroll handle and the follow-the-tail flag.
pub struct ScrollManager {
    scroll_handle: ScrollHandle,
    coordinator: ScrollCoordinator,
    pending_scroll_to_bottom: bool,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: ScrollHandle::new(),
            coordinator: ScrollCoordinator::new(),
            pending_scroll_to_bottom: true,
        }
    }

    pub fn handle(&self) -> &ScrollHandle {
        &self.scroll_handle
    }

    pub fn hit_bottom(&self) -> bool {
        self.coordinator.hit_bottom()
    }

    pub fn apply_probe(&mut self, probe: ScrollProbe) -> bool {
        self.coordinator.apply(probe)
    }

    /// Reads the container geometry; `None` until the container has been laid out.
    pub fn sample(&self) -> Option<ScrollSample> {
        let client_height = f32::from(self.scroll_handle.bounds().size.height);
        if client_height <= 0.0 {
            return None;
        }

        // GPUI scrolls down with negative Y offsets.
        let scroll_top = -f32::from(self.scroll_handle.offset().y);
        let max_offset = f32::from(self.scroll_handle.max_offset().height).max(0.0);
        Some(ScrollSample::new(
            scroll_top.max(0.0),
            client_height,
            client_height + max_offset,
        ))
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.coordinator.set_auto_scroll(enabled);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
        self.scroll_handle.scroll_to_bottom();
    }

    /// Pins to the newest content when following; returns whether a scroll was issued.
    pub fn follow_new_content(&mut self) -> bool {
        if self.coordinator.auto_scroll() {
            self.pending_scroll_to_bottom = true;
        }
        self.apply_pending_scroll()
    }

    pub fn apply_pending_scroll(&mut self) -> bool {
        let should_scroll = self.pending_scroll_to_bottom;
        if should_scroll {
            self.scroll_handle.scroll_to_bottom();
        }

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

    fn desktop(scroll_top: f32) -> ScrollProbe {
        ScrollProbe {
            sample: Some(ScrollSample::new(scroll_top, 500.0, 1000.0)),
            is_mobile: false,
        }
    }

    fn mobile(scroll_top: f32) -> ScrollProbe {
        ScrollProbe {
            sample: Some(ScrollSample::new(scroll_top, 500.0, 1000.0)),
            is_mobile: true,
        }
    }

    #[test]
    fn desktop_allows_ten_pixels_of_slack() {
        assert!(!is_hit_bottom(desktop(489.0).sample, false));
        assert!(is_hit_bottom(desktop(490.0).sample, false));
        assert!(is_hit_bottom(desktop(500.0).sample, false));
    }

    #[test]
    fn mobile_requires_exact_bottom() {
        assert!(!is_hit_bottom(mobile(499.0).sample, true));
        assert!(is_hit_bottom(mobile(500.0).sample, true));
    }

    #[test]
    fn boundary_is_inclusive_for_arbitrary_geometry() {
        for (client_height, scroll_height) in [(120.0, 400.0), (300.0, 300.0), (64.0, 8192.0)] {
            for is_mobile in [false, true] {
                let tolerance = if is_mobile { 0.0 } else { 10.0 };
                let at_edge = scroll_height - tolerance - client_height;
                let sample = |top: f32| Some(ScrollSample::new(top.max(0.0), client_height, scroll_height));

                assert!(is_hit_bottom(sample(at_edge), is_mobile));
                if at_edge >= 1.0 {
                    assert!(!is_hit_bottom(sample(at_edge - 1.0), is_mobile));
                }
            }
        }
    }

    #[test]
    fn malformed_geometry_fails_closed() {
        assert!(!is_hit_bottom(None, false));
        assert!(!is_hit_bottom(Some(ScrollSample::new(f32::NAN, 500.0, 1000.0)), false));
        assert!(!is_hit_bottom(
            Some(ScrollSample::new(500.0, f32::INFINITY, 1000.0)),
            true
        ));
        assert!(!is_hit_bottom(Some(ScrollSample::new(-1.0, 500.0, 100.0)), false));
    }

    #[test]
    fn coordinator_starts_pinned_and_tracks_latest_probe() {
        let mut coordinator = ScrollCoordinator::new();
        assert!(coordinator.hit_bottom());
        assert!(coordinator.auto_scroll());

        assert!(!coordinator.apply(desktop(100.0)));
        assert!(!coordinator.hit_bottom());
        assert!(!coordinator.auto_scroll());

        assert!(coordinator.apply(desktop(495.0)));
        assert!(coordinator.hit_bottom());
        assert!(coordinator.auto_scroll());
    }

    #[test]
    fn coordinator_drops_auto_scroll_for_absent_geometry() {
        let mut coordinator = ScrollCoordinator::new();
        coordinator.apply(ScrollProbe {
            sample: None,
            is_mobile: false,
        });
        assert!(!coordinator.hit_bottom());
        assert!(!coordinator.auto_scroll());
    }
}
