use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// Time source for every age/expiry computation, in seconds since the unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

// Wall clock anchored once at startup, then advanced by a monotonic Instant
// so "now" never goes backwards when the system clock is adjusted
pub struct SystemClock {
    epoch_at_start: f64,
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_at_start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            epoch_at_start,
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch_at_start + self.started.elapsed().as_secs_f64()
    }
}

// Hand-driven clock for tests
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = secs;
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) += secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a > 1_600_000_000.0);
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(10.0);
        assert_eq!(clock.now(), 10.0);
        clock.advance(2.5);
        assert_eq!(clock.now(), 12.5);
        clock.set(100.0);
        assert_eq!(clock.now(), 100.0);
    }
}
