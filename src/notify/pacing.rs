//! Send pacing.
//!
//! SendGrid throttles bursts, so recipient fan-out is serialized with a
//! minimum gap between sends instead of firing requests concurrently. The
//! pacer is a seam so the rate contract is testable and swappable.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Gate that a sender must pass before each outbound request.
#[async_trait]
pub trait SendPacer: Send + Sync {
    /// Wait until the next send is allowed.
    async fn acquire(&self);
}

/// Enforces a fixed minimum interval between consecutive sends.
///
/// Equivalent to a capacity-one token bucket refilling every `min_gap`.
/// Holding the internal lock across the sleep is intentional: it serializes
/// concurrent senders through the same gap.
pub struct FixedDelayPacer {
    min_gap: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl FixedDelayPacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_send: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SendPacer for FixedDelayPacer {
    async fn acquire(&self) {
        let mut last = self.last_send.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_gap {
                sleep(self.min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn consecutive_acquires_are_spaced_by_the_gap() {
        let pacer = FixedDelayPacer::new(Duration::from_millis(600));
        let start = Instant::now();

        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let pacer = FixedDelayPacer::new(Duration::from_millis(600));
        let start = Instant::now();
        pacer.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_gap_never_waits() {
        let pacer = FixedDelayPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            pacer.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
