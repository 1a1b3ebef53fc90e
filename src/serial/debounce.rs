use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-token debounce: an identical token seen again inside the window is
/// rejected. Bouncy panel buttons fire the same line several times per
/// press.
pub struct DebounceFilter {
    window: Duration,
    last_seen: HashMap<String, Instant>,
}

impl DebounceFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    pub fn accept(&mut self, token: &str, now: Instant) -> bool {
        if let Some(last) = self.last_seen.get(token) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_seen.insert(token.to_string(), now);
        true
    }

    pub fn reset(&mut self) {
        self.last_seen.clear();
    }
}
