use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::breaker::CircuitBreaker;
use crate::queue::EventQueue;
use crate::service::LokiService;
use crate::stream::group_events;

/// Upper bound on the final drain during shutdown; past this, shutdown
/// proceeds and queued events are lost.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FlushOutcome {
    /// The queue was empty.
    Idle,
    Sent(usize),
    /// Delivery failed or the breaker is open; the batch went back to the
    /// tail of the queue.
    Requeued(usize),
}

/// Drains the queue in bounded batches and hands them to the delivery layer.
pub(crate) struct Flusher {
    queue: Arc<EventQueue>,
    service: LokiService,
    breaker: Mutex<CircuitBreaker>,
    /// Single permit: at most one flush cycle, timer- or shutdown-triggered,
    /// touches the queue-and-send critical section at a time.
    gate: Semaphore,
    batch_size: usize,
    interval: Duration,
    static_labels: HashMap<String, String>,
}

impl Flusher {
    pub fn new(
        queue: Arc<EventQueue>,
        service: LokiService,
        breaker: CircuitBreaker,
        batch_size: usize,
        interval: Duration,
        static_labels: HashMap<String, String>,
    ) -> Self {
        Self {
            queue,
            service,
            breaker: Mutex::new(breaker),
            gate: Semaphore::new(1),
            batch_size,
            interval,
            static_labels,
        }
    }

    /// Periodic loop: flush on every tick until cancelled, then make one
    /// bounded final drain attempt.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
            }
        }

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.drain())
            .await
            .is_err()
        {
            warn!(
                message = "final flush timed out, queued events were dropped",
                remaining = self.queue.len()
            );
        }
    }

    /// Flush in bounded batches while progress is being made. Stops on the
    /// first failed cycle rather than spinning against a dead backend.
    pub async fn drain(&self) {
        loop {
            match self.flush_once().await {
                FlushOutcome::Sent(_) => {
                    if self.queue.is_empty() {
                        break;
                    }
                }
                FlushOutcome::Idle | FlushOutcome::Requeued(_) => break,
            }
        }
    }

    /// One flush cycle: pop up to `batch_size` events, group them into
    /// streams and push. Anything beyond the batch cap stays queued for the
    /// next tick; a failed push requeues the whole batch at the tail.
    pub async fn flush_once(&self) -> FlushOutcome {
        let Ok(_permit) = self.gate.acquire().await else {
            // The semaphore is never closed.
            return FlushOutcome::Idle;
        };

        let events = self.queue.pop_batch(self.batch_size);
        if events.is_empty() {
            return FlushOutcome::Idle;
        }
        let count = events.len();

        let request = group_events(&events, &self.static_labels);
        if request.streams.is_empty() {
            return FlushOutcome::Idle;
        }

        if !self.breaker.lock().allow() {
            debug!(
                message = "circuit breaker is open, requeueing batch",
                count
            );
            self.queue.requeue(events);
            return FlushOutcome::Requeued(count);
        }

        match self.service.push(&request).await {
            Ok(()) => {
                self.breaker.lock().record_success();
                trace!(message = "pushed batch", count);
                FlushOutcome::Sent(count)
            }
            Err(err) => {
                self.breaker.lock().record_failure();
                warn!(message = "failed to push batch, requeueing", %err, count);
                self.queue.requeue(events);
                FlushOutcome::Requeued(count)
            }
        }
    }
}
