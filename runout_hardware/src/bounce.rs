use std::time::{Duration, Instant};

/// Drops edges that arrive within `bounce` of the last accepted one.
#[derive(Debug, Clone)]
pub struct BounceFilter {
    bounce: Duration,
    last: Option<Instant>,
}

impl BounceFilter {
    pub fn new(bounce: Duration) -> Self {
        Self { bounce, last: None }
    }

    /// True if an edge at `now` should be delivered.
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last
            && now.saturating_duration_since(last) < self.bounce
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}
