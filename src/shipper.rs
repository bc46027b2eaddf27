use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::config::Config;
use crate::event::{ErrorInfo, Level, LogEvent, Properties};
use crate::flusher::Flusher;
use crate::queue::EventQueue;
use crate::redact::Redactor;
use crate::service::LokiService;

/// Optional context accompanying one log call.
#[derive(Debug, Default)]
pub struct LogRecord {
    pub properties: Option<Properties>,
    pub error: Option<ErrorInfo>,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
}

/// The shipping client handed to producers.
///
/// Construction spawns the background flush loop, so a `LogShipper` must be
/// created inside a tokio runtime. Ingestion calls redact and enqueue on the
/// caller's thread and never touch the network; no fault in the shipper ever
/// propagates to a producer.
pub struct LogShipper {
    enabled: bool,
    hostname: String,
    service: String,
    endpoint: String,
    redactor: Redactor,
    queue: Arc<EventQueue>,
    flusher: Option<Arc<Flusher>>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogShipper {
    pub fn new(config: Config) -> crate::Result<Self> {
        config.validate()?;

        let hostname = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        let endpoint = config.push_url();
        let queue = Arc::new(EventQueue::default());
        let shutdown = CancellationToken::new();

        let (flusher, handle) = if config.enabled {
            let service = LokiService::new(&config)?;
            let breaker = CircuitBreaker::new(config.circuit_breaker_threshold);
            let flusher = Arc::new(Flusher::new(
                Arc::clone(&queue),
                service,
                breaker,
                config.batch_size,
                config.flush_interval(),
                config.labels.clone(),
            ));

            let handle = tokio::spawn(Arc::clone(&flusher).run(shutdown.clone()));
            (Some(flusher), Some(handle))
        } else {
            debug!(message = "log shipping is disabled, events will be dropped");
            (None, None)
        };

        Ok(Self {
            enabled: config.enabled,
            hostname,
            service: config.service,
            endpoint,
            redactor: Redactor::default(),
            queue,
            flusher,
            shutdown,
            handle: Mutex::new(handle),
        })
    }

    /// Fire-and-forget ingestion: redact, stamp and enqueue. Never blocks on
    /// I/O, never fails.
    pub fn log(&self, level: Level, message: &str, record: LogRecord) {
        if !self.enabled {
            return;
        }

        let properties = record
            .properties
            .map(|properties| self.redactor.redact_properties(properties))
            .unwrap_or_default();
        let error_info = record.error.map(|error| self.redactor.redact_error(error));

        self.queue.push(LogEvent {
            timestamp: Utc::now(),
            level,
            message: self.redactor.redact(message),
            correlation_id: record.correlation_id,
            user_id: record.user_id,
            properties,
            error_info,
            hostname: self.hostname.clone(),
            service: self.service.clone(),
        });
    }

    pub fn log_debug(&self, message: &str, properties: Option<Properties>) {
        self.log(
            Level::Debug,
            message,
            LogRecord {
                properties,
                ..Default::default()
            },
        );
    }

    pub fn log_information(&self, message: &str, properties: Option<Properties>) {
        self.log(
            Level::Information,
            message,
            LogRecord {
                properties,
                ..Default::default()
            },
        );
    }

    pub fn log_warning(&self, message: &str, properties: Option<Properties>) {
        self.log(
            Level::Warning,
            message,
            LogRecord {
                properties,
                ..Default::default()
            },
        );
    }

    pub fn log_error(
        &self,
        message: &str,
        properties: Option<Properties>,
        error: Option<ErrorInfo>,
    ) {
        self.log(
            Level::Error,
            message,
            LogRecord {
                properties,
                error,
                ..Default::default()
            },
        );
    }

    pub fn log_critical(
        &self,
        message: &str,
        properties: Option<Properties>,
        error: Option<ErrorInfo>,
    ) {
        self.log(
            Level::Critical,
            message,
            LogRecord {
                properties,
                error,
                ..Default::default()
            },
        );
    }

    /// Explicit drain-and-send of everything queued right now.
    pub async fn flush(&self) {
        if let Some(flusher) = &self.flusher {
            flusher.drain().await;
        }
    }

    /// Current queue depth. The queue is unbounded; hosts that care about
    /// sustained outages can watch this.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The background loop is already running from construction; this only
    /// announces readiness to the host.
    pub fn start(&self) {
        if self.enabled {
            info!(message = "log shipper started", endpoint = %self.endpoint);
        }
    }

    /// Cancel the periodic loop and wait for its bounded final flush.
    /// Idempotent; events still queued after the bound are dropped.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.await.is_err() {
                warn!(message = "flush task panicked during shutdown");
            }

            info!(
                message = "log shipper stopped",
                remaining = self.queue.len()
            );
        }
    }
}
