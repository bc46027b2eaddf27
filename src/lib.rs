//! In-process asynchronous log-shipping client for Grafana Loki.
//!
//! Producers hand structured [`LogEvent`]s to a [`LogShipper`] through
//! fire-and-forget calls that never block on network I/O and never fail.
//! Sensitive values are redacted before an event is stored. A single
//! background task drains the queue in bounded batches on a fixed interval,
//! groups events into Loki streams by label set, and pushes them with
//! sequential exponential-backoff retries wrapped by a circuit breaker.
//! Failed batches are requeued at the tail for a later cycle; shutdown makes
//! one bounded final drain attempt.

mod breaker;
pub mod config;
pub mod event;
mod flusher;
mod queue;
mod redact;
mod service;
mod shipper;
mod stream;

pub use config::Config;
pub use event::{ErrorInfo, Level, LogEvent, Properties, PropertyValue};
pub use redact::REDACTION_MARKER;
pub use service::DeliveryError;
pub use shipper::{LogRecord, LogShipper};

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T> = std::result::Result<T, Error>;
