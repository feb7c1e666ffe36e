use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between two data requests to the handheld.
pub const REQUEST_COOLDOWN: Duration = Duration::from_secs(2);

/// Cooldown gate for outbound data requests.
///
/// `ready` and `record` are separate so the caller can apply other guards
/// in between and only consume the slot when a request is actually sent.
#[derive(Debug, Clone)]
pub struct RequestThrottle {
    cooldown: Duration,
    last_request: Option<Instant>,
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(REQUEST_COOLDOWN)
    }
}

impl RequestThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_request: None,
        }
    }

    /// True if no request was recorded yet or the cooldown has fully elapsed.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_request {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }
}
