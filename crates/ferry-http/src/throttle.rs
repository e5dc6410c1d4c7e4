//! Pacing of outbound calls
//!
//! Whoever builds a [`RequestGateway`](crate::RequestGateway) owns its
//! throttle; gateways that should share one budget share one `Arc`.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Grants permission to start an outbound call
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Wait until a call may start, then claim the slot
    async fn acquire(&self);
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// At most `concurrency` calls start per `interval`.
///
/// Windows are fixed: the first call after a full window sleeps until the
/// window ends and opens the next one. The window state sits behind an async
/// mutex that is held across that sleep, so later callers queue behind the
/// paused one instead of slipping past it.
#[derive(Debug)]
pub struct WindowThrottle {
    concurrency: u32,
    interval: Duration,
    window: Mutex<Window>,
}

impl WindowThrottle {
    pub fn new(concurrency: u32, interval: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            interval,
            window: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for WindowThrottle {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

#[async_trait]
impl Throttle for WindowThrottle {
    async fn acquire(&self) {
        let mut window = self.window.lock().await;

        let now = Instant::now();
        if now.duration_since(window.started) >= self.interval {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.concurrency {
            let resume = window.started + self.interval;
            debug!(wait = ?resume.saturating_duration_since(now), "throttle window full");
            tokio::time::sleep_until(resume).await;
            window.started = Instant::now();
            window.count = 0;
        }

        window.count += 1;
    }
}

/// GCRA limiter with the same quota, smoothing calls across the interval
/// instead of admitting them in bursts per window
pub struct GovernorThrottle {
    limiter: DefaultDirectRateLimiter,
}

impl GovernorThrottle {
    pub fn new(concurrency: u32, interval: Duration) -> Self {
        let burst = NonZeroU32::new(concurrency).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(interval / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl std::fmt::Debug for GovernorThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernorThrottle").finish_non_exhaustive()
    }
}

#[async_trait]
impl Throttle for GovernorThrottle {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
