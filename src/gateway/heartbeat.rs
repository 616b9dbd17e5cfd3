//! Heartbeat scheduling.
//!
//! The first beat fires after a random delay in `[0, interval)`, every later
//! beat exactly one interval after the previous deadline.

use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
pub struct HeartbeatTimer {
    interval: Duration,
    next: Instant,
}

impl HeartbeatTimer {
    /// Arms the timer with a jittered first beat.
    pub fn start(interval: Duration) -> Self {
        Self::with_first_delay(interval, first_delay(interval))
    }

    pub fn with_first_delay(interval: Duration, first: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + first,
        }
    }

    /// Waits for the next beat. Cancel safe: the deadline only advances once
    /// the wait has completed.
    pub async fn tick(&mut self) {
        sleep_until(self.next).await;

        let now = Instant::now();
        self.next += self.interval;
        if self.next <= now {
            // The loop stalled for more than a whole interval; don't burst.
            self.next = now + self.interval;
        }
    }
}

/// Uniform random delay in `[0, interval)`.
pub fn first_delay(interval: Duration) -> Duration {
    let millis = interval.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..millis))
}
