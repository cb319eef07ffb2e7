use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use crate::cache::ResponseCache;
use crate::metrics::{ACTIVE_CLIENTS, CACHE_SIZE};
use crate::rate_limit::RateLimiter;

// Background sweeps over the rate limiter and the response cache.
// Each duty runs on its own interval until `shutdown` is called. A sweep is a
// single synchronous pass, so cancellation only ever lands between passes.
pub struct Janitor {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Janitor {
    pub fn spawn(
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        rate_sweep_every: Duration,
        cache_sweep_every: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let rate_task = tokio::spawn(sweep_loop(
            "rate_log",
            rate_sweep_every,
            shutdown_rx.clone(),
            move || {
                let removed = rate_limiter.sweep();
                ACTIVE_CLIENTS.set(rate_limiter.tracked_clients() as f64);
                removed
            },
        ));
        let cache_task = tokio::spawn(sweep_loop(
            "cache",
            cache_sweep_every,
            shutdown_rx,
            move || {
                let removed = cache.sweep();
                CACHE_SIZE.set(cache.len() as f64);
                removed
            },
        ));

        Self {
            shutdown_tx,
            handles: vec![rate_task, cache_task],
        }
    }

    // Signal both loops and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!(error = %e, "janitor task ended abnormally"),
            }
        }
        tracing::info!("janitor stopped");
    }
}

async fn sweep_loop<F>(
    name: &'static str,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
    sweep: F,
) where
    F: Fn() -> usize + Send + 'static,
{
    // first sweep one full period after start
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(duty = name, interval_secs = every.as_secs(), "janitor started");

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // a dropped sender also means stop
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match catch_unwind(AssertUnwindSafe(&sweep)) {
                    Ok(removed) => tracing::debug!(duty = name, removed, "sweep finished"),
                    Err(_) => tracing::error!(duty = name, "sweep panicked, continuing"),
                }
            }
        }
    }

    tracing::debug!(duty = name, "janitor loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn sweeps_expired_state_on_its_interval() {
        let clock = Arc::new(ManualClock::new(0.0));
        let limiter = Arc::new(RateLimiter::new(5, 60, clock.clone()));
        let cache = Arc::new(ResponseCache::new(300, clock.clone()));

        limiter.check("A");
        cache.store(CacheKey::from_url("https://a"), json!(1));
        CACHE_SIZE.set(cache.len() as f64);

        let janitor = Janitor::spawn(
            limiter.clone(),
            cache.clone(),
            Duration::from_secs(120),
            Duration::from_secs(60),
        );

        clock.set(301.0);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());
        // the gauge follows the sweep, not just the request path
        assert_eq!(CACHE_SIZE.get(), 0.0);
        // rate sweep has not ticked yet
        assert_eq!(limiter.tracked_clients(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        janitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_loops_without_further_sweeps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(false);
        let counter = calls.clone();
        let task = tokio::spawn(sweep_loop("test", Duration::from_secs(1), rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        }));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tx.send(true).unwrap();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_sweep_does_not_kill_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(false);
        let counter = calls.clone();
        let task = tokio::spawn(sweep_loop("flaky", Duration::from_secs(1), rx, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("boom");
            }
            0
        }));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
