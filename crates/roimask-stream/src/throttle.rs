use std::time::Duration;

/// Admits at most one send per interval; anything earlier is dropped rather
/// than queued.
#[derive(Debug, Clone)]
pub struct SendThrottle {
    interval: Duration,
    last_sent: Option<Duration>,
}

impl SendThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// The first frame after a reset is always admitted.
    pub fn is_ready(&self, now: Duration) -> bool {
        self.last_sent
            .map_or(true, |last| now.saturating_sub(last) >= self.interval)
    }

    pub fn mark_sent(&mut self, now: Duration) {
        self.last_sent = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
