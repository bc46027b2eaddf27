use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the shipping client, passed at construction time.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// When false the client accepts and drops events without ever touching
    /// the network.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Backend host, with or without a scheme. `http` is assumed when the
    /// scheme is absent.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Value of the `service` label attached to every stream.
    #[serde(default = "default_service")]
    pub service: String,

    /// Maximum number of events sent in a single push.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Additional retries after a failed push, executed sequentially.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Per-attempt HTTP request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Consecutive failed pushes before the circuit breaker opens.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Static labels attached to every stream.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

const fn default_true() -> bool {
    true
}

const fn default_port() -> u16 {
    3100
}

fn default_service() -> String {
    "unknown".to_string()
}

const fn default_batch_size() -> usize {
    50
}

const fn default_flush_interval_ms() -> u64 {
    5000
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    5000
}

const fn default_circuit_breaker_threshold() -> u32 {
    5
}

impl Config {
    /// A config with defaults for everything but the backend host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            enabled: true,
            host: host.into(),
            port: default_port(),
            service: default_service(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            retry_attempts: default_retry_attempts(),
            timeout_ms: default_timeout_ms(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            labels: HashMap::new(),
        }
    }

    pub fn push_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            format!("{}:{}/loki/api/v1/push", host, self.port)
        } else {
            format!("http://{}:{}/loki/api/v1/push", host, self.port)
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err("`host` must not be empty".into());
        }

        if self.batch_size == 0 {
            return Err("`batch_size` must be greater than zero".into());
        }

        if self.circuit_breaker_threshold == 0 {
            return Err("`circuit_breaker_threshold` must be greater than zero".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let config =
            serde_json::from_value::<Config>(json!({ "host": "loki.example.com" })).unwrap();

        assert!(config.enabled);
        assert_eq!(config.port, 3100);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.circuit_breaker_threshold, 5);
        assert!(config.labels.is_empty());
    }

    #[test]
    fn push_url_assumes_http() {
        let config = Config::new("loki.example.com");
        assert_eq!(
            config.push_url(),
            "http://loki.example.com:3100/loki/api/v1/push"
        );
    }

    #[test]
    fn push_url_keeps_scheme() {
        let mut config = Config::new("https://loki.example.com/");
        config.port = 443;
        assert_eq!(
            config.push_url(),
            "https://loki.example.com:443/loki/api/v1/push"
        );
    }

    #[test]
    fn rejects_empty_host() {
        let config = Config::new("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config = Config::new("loki.example.com");
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let value = json!({ "host": "loki.example.com", "flush_interval": 1000 });
        assert!(serde_json::from_value::<Config>(value).is_err());
    }
}
