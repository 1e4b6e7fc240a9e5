use std::time::{Duration, Instant};

/// Leading + trailing debounce over a last-value cell.
///
/// The first call of a burst is delivered immediately. Later calls inside the
/// window only replace the buffered value and push the deadline out; once the
/// deadline passes with a buffered value, `poll` delivers it exactly once.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    wait: Duration,
    deadline: Option<Instant>,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
            pending: None,
        }
    }

    /// Records a call; returns the value when it fires on the leading edge.
    pub fn call(&mut self, value: T, now: Instant) -> Option<T> {
        let in_burst = self.deadline.is_some_and(|deadline| now < deadline);
        self.deadline = Some(now + self.wait);

        if in_burst {
            self.pending = Some(value);
            return None;
        }

        // A burst whose trailing poll never ran is superseded by this newer value.
        self.pending = None;
        Some(value)
    }

    /// Delivers the buffered value once the burst has settled.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        self.deadline = None;
        self.pending.take()
    }

    /// When the trailing edge is due, if a burst is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(100);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn first_call_fires_on_leading_edge() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WAIT);

        assert_eq!(debouncer.call(1, start), Some(1));
        assert_eq!(debouncer.poll(start + WAIT), None);
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn burst_collapses_to_latest_value_on_trailing_edge() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WAIT);

        assert_eq!(debouncer.call(1, start), Some(1));
        assert_eq!(debouncer.call(2, start + ms(30)), None);
        assert_eq!(debouncer.call(3, start + ms(60)), None);

        // The window restarts on every call.
        assert_eq!(debouncer.poll(start + ms(120)), None);
        assert_eq!(debouncer.poll(start + ms(160)), Some(3));
        assert_eq!(debouncer.poll(start + ms(500)), None);
    }

    #[test]
    fn settled_burst_starts_a_new_leading_edge() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WAIT);

        debouncer.call(1, start);
        debouncer.call(2, start + ms(10));
        assert_eq!(debouncer.poll(start + ms(110)), Some(2));

        assert_eq!(debouncer.call(3, start + ms(300)), Some(3));
    }

    #[test]
    fn late_call_supersedes_unpolled_trailing_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WAIT);

        debouncer.call(1, start);
        debouncer.call(2, start + ms(10));

        assert_eq!(debouncer.call(3, start + ms(400)), Some(3));
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn cancel_discards_pending_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WAIT);

        debouncer.call(1, start);
        debouncer.call(2, start + ms(10));
        debouncer.cancel();

        assert_eq!(debouncer.poll(start + ms(500)), None);
        assert_eq!(debouncer.deadline(), None);
    }
}
