//! Per-source sliding 1-second window, transliterated from the lazily
//! cleaned dictionary-of-deques in the system this bus is modeled on, but
//! as a bounded ring buffer per source rather than an unbounded dictionary.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimitState {
    timestamps: VecDeque<Instant>,
    limit: u32,
    window: Duration,
}

impl RateLimitState {
    /// A one-second sliding window, matching the bus's per-source emission
    /// budget (`events_per_second`).
    pub fn new(limit: u32) -> Self {
        RateLimitState::with_window(limit, DEFAULT_WINDOW)
    }

    /// A sliding window of arbitrary length, for collaborators with a
    /// different natural unit (e.g. the agent runtime's per-minute chatter
    /// limit) that still want the same lazily-pruned-deque admission logic.
    pub fn with_window(limit: u32, window: Duration) -> Self {
        RateLimitState {
            timestamps: VecDeque::new(),
            limit,
            window,
        }
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Lazily prunes anything older than the window, then accepts iff the
    /// remaining count is still under the limit. Returns whether the call
    /// is admitted.
    pub fn check_and_record(&mut self, now: Instant) -> bool {
        let cutoff = now.checked_sub(self.window).unwrap_or(now);
        while matches!(self.timestamps.front(), Some(t) if *t < cutoff) {
            self.timestamps.pop_front();
        }
        if self.timestamps.len() as u32 >= self.limit {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }
}
