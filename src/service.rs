use std::time::Duration;

use backoff::ExponentialBackoff;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::stream::PushRequest;

/// Wait `2^attempt` seconds before the `attempt`-th retry.
const BACKOFF_BASE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("server responded with an error: {status}")]
    Server { status: StatusCode },

    #[error("failed to make HTTP request: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },
}

/// HTTP push layer for the backend's ingestion endpoint.
///
/// Transport errors and non-2xx responses are treated uniformly as retryable;
/// attempts run sequentially with exponential backoff and the final error is
/// surfaced to the flusher once attempts are exhausted.
#[derive(Clone, Debug)]
pub(crate) struct LokiService {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    backoff_base: Duration,
}

impl LokiService {
    pub fn new(config: &Config) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.push_url(),
            retry_attempts: config.retry_attempts,
            backoff_base: BACKOFF_BASE,
        })
    }

    #[cfg(test)]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    async fn push_once(&self, request: &PushRequest) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Server { status })
        }
    }

    pub async fn push(&self, request: &PushRequest) -> Result<(), DeliveryError> {
        let mut backoff = ExponentialBackoff::new(self.backoff_base);
        let mut attempt = 0u32;

        loop {
            match self.push_once(request).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt >= self.retry_attempts {
                        return Err(err);
                    }

                    attempt += 1;
                    warn!(
                        message = "failed to push to loki, will retry",
                        %err,
                        attempt,
                        max_attempts = self.retry_attempts
                    );

                    backoff.wait().await;
                }
            }
        }
    }
}
