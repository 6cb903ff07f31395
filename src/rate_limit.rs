//! Fixed-window request quotas keyed by caller identifier.
//!
//! Each identifier gets `quota` requests per window. The first request in a
//! window starts it; once the window elapses the count resets on the next
//! request. State is in-memory only and does not survive restarts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{AppError, Result};
use crate::models::RateLimitConfig;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Keyed fixed-window rate limiter.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    quota: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            quota,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.quota, Duration::from_secs(config.window_secs))
    }

    /// Consume one unit of quota for `id`, failing with the remaining
    /// window time when the quota is exhausted.
    pub fn check_and_consume(&self, id: &str) -> Result<()> {
        self.check_at(id, Instant::now())
    }

    fn check_at(&self, id: &str, now: Instant) -> Result<()> {
        let mut windows = self.windows.lock().expect("limiter lock poisoned");
        let entry = windows.entry(id.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.quota {
            let elapsed = now.duration_since(entry.started_at);
            let retry_after_secs = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(AppError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }
}
