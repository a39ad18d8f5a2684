//! Per-instrument publish-rate limiting.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Window {
    started: Instant,
    admitted: u32,
}

/// Fixed one-second-window rate gate, stateful per key.
///
/// Each logical output stream (tick prices, order books) owns its own
/// instance, so throttling one stream never affects the other. A limit of
/// zero disables the gate entirely.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    windows: Mutex<FxHashMap<String, Window>>,
}

impl RateLimiter {
    /// Create a limiter admitting at most `limit` events per key per second.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Mutex::new(FxHashMap::default()),
        }
    }

    /// Whether the event for `key` should be dropped.
    ///
    /// Admits up to the configured limit within the current one-second
    /// window and throttles the rest; the window resets one second after it
    /// opened.
    pub fn should_throttle(&self, key: &str) -> bool {
        self.should_throttle_at(key, Instant::now())
    }

    fn should_throttle_at(&self, key: &str, now: Instant) -> bool {
        if self.limit == 0 {
            return false;
        }

        let mut windows = self.windows.lock();
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            admitted: 0,
        });

        if now.duration_since(window.started) >= WINDOW {
            window.started = now;
            window.admitted = 0;
        }

        if window.admitted < self.limit {
            window.admitted += 1;
            false
        } else {
            true
        }
    }
}
