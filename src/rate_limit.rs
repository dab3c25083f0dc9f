use std::time::{Duration, Instant};

use dashmap::DashMap;

const MAX_FAILURES: u32 = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);
/// Closed windows are swept once the map grows past this many emails.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    failures: u32,
    opened: Instant,
}

impl FailureWindow {
    fn is_open(&self, now: Instant, length: Duration) -> bool {
        now.duration_since(self.opened) <= length
    }
}

/// Counts wrong passwords per email and locks the email out for the rest
/// of the window once the limit is reached.
pub struct LoginRateLimiter {
    windows: DashMap<String, FailureWindow>,
    max_failures: u32,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MAX_FAILURES, WINDOW)
    }

    pub fn with_limits(max_failures: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// `Err(seconds)` until the lockout lifts. Checking is free; only
    /// `record_failure` counts.
    pub fn check(&self, email: &str) -> Result<(), u64> {
        let now = Instant::now();
        let Some(entry) = self.windows.get(&key(email)) else {
            return Ok(());
        };

        if !entry.is_open(now, self.window) || entry.failures < self.max_failures {
            return Ok(());
        }

        let remaining = self.window.saturating_sub(now.duration_since(entry.opened));
        Err(remaining.as_secs().max(1))
    }

    pub fn record_failure(&self, email: &str) {
        if self.windows.len() > SWEEP_THRESHOLD {
            self.cleanup();
        }

        let now = Instant::now();
        self.windows
            .entry(key(email))
            .and_modify(|w| {
                if w.is_open(now, self.window) {
                    w.failures += 1;
                } else {
                    *w = FailureWindow {
                        failures: 1,
                        opened: now,
                    };
                }
            })
            .or_insert(FailureWindow {
                failures: 1,
                opened: now,
            });
    }

    /// Forget an email after a successful login.
    pub fn reset(&self, email: &str) {
        self.windows.remove(&key(email));
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows.retain(|_, w| w.is_open(now, self.window));
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}
