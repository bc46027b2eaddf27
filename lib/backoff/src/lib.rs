//! Doubling back-off strategy for retrying failed deliveries.

use std::time::Duration;

/// An exponential back-off: the first delay equals `base`, and every
/// subsequent delay doubles, saturating at `max_delay` when one is set.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    current: Duration,
    max_delay: Option<Duration>,
}

impl ExponentialBackoff {
    pub const fn new(base: Duration) -> Self {
        ExponentialBackoff {
            base,
            current: base,
            max_delay: None,
        }
    }

    pub const fn from_secs(base: u64) -> Self {
        Self::new(Duration::from_secs(base))
    }

    pub const fn from_millis(base: u64) -> Self {
        Self::new(Duration::from_millis(base))
    }

    /// Apply a maximum delay. No delay will be longer than this `Duration`.
    pub const fn max_delay(mut self, limit: Duration) -> Self {
        self.max_delay = Some(limit);
        self
    }

    /// The next `Duration` to wait for.
    pub fn next(&mut self) -> Duration {
        let mut delay = self.current;
        if let Some(limit) = self.max_delay {
            if delay > limit {
                delay = limit;
            }
        }

        self.current = self.current.saturating_mul(2);

        delay
    }

    pub async fn wait(&mut self) {
        let delay = self.next();
        tokio::time::sleep(delay).await
    }

    pub fn reset(&mut self) {
        self.current = self.base
    }
}
