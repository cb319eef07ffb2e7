use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use crate::clock::Clock;

// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Admit,
    // seconds until the oldest admission leaves the window
    Reject { retry_after: f64 },
}

// Point-in-time view used by /stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub active_clients: usize,
    pub recent_requests: usize,
}

// Sliding-log rate limiter keyed by client identifier.
// Each client keeps the timestamps of its admitted requests inside the
// trailing window, oldest first. Every read-modify-write on one client runs
// under that client's map shard lock, so a check and a concurrent sweep never
// lose each other's update.
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<f64>>, // client -> admitted timestamps
    limit: usize,                            // max admissions per window
    window: f64,                             // window length in seconds
    clock: Arc<dyn Clock>,
}

// drop timestamps that are no longer inside the window
fn prune(timestamps: &mut VecDeque<f64>, now: f64, window: f64) {
    while let Some(&oldest) = timestamps.front() {
        if now - oldest < window {
            break;
        }
        timestamps.pop_front();
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            limit: limit as usize,
            window: window_secs as f64,
            clock,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window_secs(&self) -> f64 {
        self.window
    }

    pub fn check(&self, client_id: &str) -> Decision {
        let now = self.clock.now();

        let mut entry = self.windows.entry(client_id.to_string()).or_default();
        let timestamps = entry.value_mut();

        prune(timestamps, now, self.window);

        // at most `limit` admissions in any trailing window
        if timestamps.len() >= self.limit {
            let oldest = timestamps.front().copied().unwrap_or(now);
            let retry_after = (self.window - (now - oldest)).max(0.0);
            return Decision::Reject { retry_after };
        }

        timestamps.push_back(now);
        Decision::Admit
    }

    // Prune every client and forget the ones with nothing left in the window.
    // Returns how many clients were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            prune(timestamps, now, self.window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    // Read-only: counts only timestamps still inside the window
    pub fn snapshot(&self) -> RateLimitSnapshot {
        let now = self.clock.now();
        let mut active_clients = 0;
        let mut recent_requests = 0;
        for entry in self.windows.iter() {
            let live = entry
                .value()
                .iter()
                .filter(|&&t| now - t < self.window)
                .count();
            if live > 0 {
                active_clients += 1;
                recent_requests += live;
            }
        }
        RateLimitSnapshot {
            active_clients,
            recent_requests,
        }
    }

    // Number of client entries physically held, including ones awaiting a sweep
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}
