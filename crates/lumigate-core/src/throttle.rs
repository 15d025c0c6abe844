// ── Minimum-interval throttle ──
//
// Each throttle remembers when it last let a call through. A caller that
// arrives early sleeps on the runtime timer while holding the throttle's
// async mutex, so concurrent callers queue in arrival order (tokio's mutex
// is fair) and each dispatch is at least `min_interval` after the previous.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

#[derive(Debug)]
pub struct Throttle {
    name: &'static str,
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(name: &'static str, min_interval: Duration) -> Self {
        Self {
            name,
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a dispatch is allowed, then claim the slot.
    ///
    /// Returns the instant the slot was claimed.
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready = previous + self.min_interval;
            if ready > Instant::now() {
                trace!(throttle = self.name, wait_ms = (ready - Instant::now()).as_millis(), "throttling");
                sleep_until(ready).await;
            }
        }
        let now = Instant::now();
        *last = Some(now);
        now
    }
}
