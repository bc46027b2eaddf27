use std::time::Duration;

use tokio::time::Instant;

/// How long an open breaker rejects before letting a probe through.
const BREAK_DURATION: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker wrapping the retry policy.
///
/// A failure here is the final outcome of a delivery after all retries are
/// exhausted, not an individual attempt. After `threshold` consecutive
/// failures the breaker opens and rejects without network I/O; once the break
/// duration elapses a single probe is admitted, closing the breaker on
/// success and rearming the timer on failure.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    state: CircuitState,
    threshold: u32,
    consecutive_failures: u32,
    opened_at: Instant,
    break_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self::with_break_duration(threshold, BREAK_DURATION)
    }

    pub fn with_break_duration(threshold: u32, break_duration: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            threshold,
            consecutive_failures: 0,
            opened_at: Instant::now(),
            break_duration,
        }
    }

    /// Whether a delivery may proceed. Every grant in `HalfOpen` is a probe
    /// whose outcome must be recorded before another call is admitted.
    pub fn allow(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.opened_at.elapsed() >= self.break_duration {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            // A probe is already in flight.
            CircuitState::HalfOpen => false,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self) {
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Instant::now();
            }
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Instant::now();
                }
            }
            // Outcome of a call admitted before the breaker opened; the
            // open-duration timer stays as it is.
            CircuitState::Open => {}
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> CircuitState {
        self.state
    }
}
