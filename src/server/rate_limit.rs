//! Fixed-window request limiter keyed by caller identity

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Requests allowed per caller per window
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Window length in seconds
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Number of tracked callers above which expired windows are dropped
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// A rejected request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    /// Time until the caller's window resets
    pub retry_after: Duration,
}

/// Limits each caller to `limit` requests per `window`
///
/// The first request from a caller opens a window; further requests in that
/// window are counted and rejected once `limit` have been accepted. A request
/// after the window ends opens a new one.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clock: Arc::new(SystemClock),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records a request from `caller`
    ///
    /// # Returns
    /// * `Ok(())` - The request is within the caller's budget
    /// * `Err(RateLimited)` - The caller has used up the current window
    pub fn check(&self, caller: &str) -> Result<(), RateLimited> {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > PRUNE_THRESHOLD {
            let before = windows.len();
            windows.retain(|_, w| now <= w.reset_at);
            debug!(pruned = before - windows.len(), "pruned expired rate limit windows");
        }

        match windows.get_mut(caller) {
            Some(w) if now <= w.reset_at => {
                if w.count >= self.limit {
                    return Err(RateLimited {
                        retry_after: w.reset_at - now,
                    });
                }
                w.count += 1;
            }
            _ => {
                windows.insert(
                    caller.to_string(),
                    Window {
                        count: 1,
                        reset_at: now
                            .checked_add_signed(self.window)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC),
                    },
                );
            }
        }

        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT, Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}
