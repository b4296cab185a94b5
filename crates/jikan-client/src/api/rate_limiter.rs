//! Rate limiter enforcing the Jikan API limits.
//!
//! Uses two fixed windows (per-second burst and per-minute sustained);
//! both must have capacity before a request is admitted.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// A fixed admission window.
#[derive(Debug)]
struct RateWindow {
    count: u32,
    limit: u32,
    duration: Duration,
    reset_at: Instant,
}

impl RateWindow {
    fn new(limit: u32, duration: Duration) -> Self {
        Self {
            count: 0,
            limit,
            duration,
            reset_at: Instant::now() + duration,
        }
    }

    /// Start a fresh window if this one has lapsed.
    fn refresh(&mut self, now: Instant) {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + self.duration;
        }
    }
}

/// Rate limiter with dual constraints (per-second and per-minute).
///
/// Limits must be nonzero: a zero limit can never admit a request and
/// `acquire` would wait forever.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<[RateWindow; 2]>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_per_second: u32, max_per_minute: u32) -> Self {
        Self {
            windows: Mutex::new([
                RateWindow::new(max_per_second, Duration::from_secs(1)),
                RateWindow::new(max_per_minute, Duration::from_secs(60)),
            ]),
        }
    }

    /// Wait until a request can be made, respecting both limits.
    ///
    /// Counters for every window are incremented as a side effect of a
    /// successful admission. The check-then-increment sequence holds the
    /// lock without suspending, so concurrent callers can never push a
    /// window past its limit; waiting happens outside the lock and the
    /// check is re-run from the top afterwards.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let now = Instant::now();

                let mut wait: Option<Duration> = None;
                for window in windows.iter_mut() {
                    window.refresh(now);
                    if window.count >= window.limit {
                        // Wait on the most constraining window
                        let until_reset = window.reset_at - now;
                        wait = Some(wait.map_or(until_reset, |w| w.max(until_reset)));
                    }
                }

                if wait.is_none() {
                    for window in windows.iter_mut() {
                        window.count += 1;
                    }
                }
                wait
            };

            match wait {
                None => return,
                Some(delay) => {
                    debug!(
                        wait_ms = delay.as_millis() as u64,
                        "Rate limit window full, waiting"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_admitted_without_waiting() {
        let limiter = RateLimiter::new(3, 60);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_request_waits_for_second_window() {
        let limiter = RateLimiter::new(3, 60);
        let start = Instant::now();

        for _ in 0..4 {
            limiter.acquire().await;
        }

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_window_caps_sustained_rate() {
        let limiter = RateLimiter::new(100, 5);
        let start = Instant::now();

        for _ in 0..6 {
            limiter.acquire().await;
        }

        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_lapse() {
        let limiter = RateLimiter::new(3, 60);

        for _ in 0..3 {
            limiter.acquire().await;
        }

        tokio::time::advance(Duration::from_millis(1100)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_rolling_window_exceeds_limit() {
        let limiter = Arc::new(RateLimiter::new(3, 60));
        let admissions = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            let admissions = Arc::clone(&admissions);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                admissions.lock().await.push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = admissions.lock().await.clone();
        times.sort();
        assert_eq!(times.len(), 10);

        // Any admission and the third one after it must be more than a
        // window apart, otherwise 4 landed inside one second.
        for pair in times.windows(4) {
            assert!(pair[3] - pair[0] >= Duration::from_secs(1));
        }
    }
}
