use std::time::{Duration, Instant};

/// A repeating timer driven by the caller's clock
#[derive(Clone, Debug)]
pub(crate) struct Timer {
    duration: Duration,
    last: Instant,
}

impl Timer {
    pub(crate) fn new(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            last: now,
        }
    }

    pub(crate) fn ringing(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.duration
    }

    pub(crate) fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    pub(crate) fn duration(&self) -> Duration {
        self.duration
    }
}
