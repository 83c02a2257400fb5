use std::time::{Duration, Instant};

/// Lets at most one event through per window.
#[derive(Clone, Debug)]
pub struct ErrorThrottle {
    window: Duration,
    last: Option<Instant>,
}

impl ErrorThrottle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// `true` when an event at `now` may surface; records it as the latest.
    pub fn allow(&mut self, now: Instant) -> bool {
        let open = match self.last {
            Some(last) => now.saturating_duration_since(last) > self.window,
            None => true,
        };
        if open {
            self.last = Some(now);
        }
        open
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_one_event_per_window() {
        let mut throttle = ErrorThrottle::new(Duration::from_millis(4000));
        let t0 = Instant::now();
        assert!(throttle.allow(t0));
        assert!(!throttle.allow(t0 + Duration::from_millis(1500)));
        assert!(!throttle.allow(t0 + Duration::from_millis(4000)));
        assert!(throttle.allow(t0 + Duration::from_millis(4001)));
        assert!(!throttle.allow(t0 + Duration::from_millis(5000)));
    }
}
