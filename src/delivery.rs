//! Batch delivery
//!
//! The webhook channel POSTs each batch as a bare JSON array and
//! retries transient failures with exponential backoff. Two statuses
//! are terminal and never retried: 401 means our API key was rejected,
//! 503 means the server side has no key configured at all. Everything
//! else (connect errors, timeouts, 5xx, other non-2xx) is retried up
//! to the configured attempt ceiling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::error::{Result, SyncError};
use crate::source::Row;

/// Per-batch acknowledgement from the ingestion endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Rows the endpoint accepted (the whole batch on any 2xx)
    pub accepted: usize,
    /// Rows reported as newly inserted
    pub inserted: u64,
    /// Rows reported as updated in place
    pub updated: u64,
}

/// Delivery channel for row batches
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Deliver one batch, retrying internally; an `Err` is final
    async fn send(&self, batch: &[Row]) -> Result<DeliveryReport>;

    /// Cheap reachability probe, no payload
    async fn check(&self) -> Result<()>;
}

/// HTTP webhook delivery with retry and exponential backoff
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
    api_key: String,
    retry_attempts: u32,
    backoff_base: Duration,
}

impl WebhookDelivery {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/webhook", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            retry_attempts: config.retry_attempts.max(1),
            backoff_base: config.backoff_base,
        })
    }

    /// Backoff before the attempt after `attempt` failed: base * 2^attempt
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Interpret a 2xx body
    ///
    /// A non-JSON body is accepted with a warning and counts nothing as
    /// inserted or updated; the batch itself is still acknowledged.
    fn parse_report(body: &str, batch_len: usize) -> DeliveryReport {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => DeliveryReport {
                accepted: batch_len,
                inserted: value.get("inserted").and_then(|v| v.as_u64()).unwrap_or(0),
                updated: value.get("updated").and_then(|v| v.as_u64()).unwrap_or(0),
            },
            Err(_) => {
                warn!(
                    body = %truncate(body, 200),
                    "expected JSON response from ingestion endpoint"
                );
                DeliveryReport {
                    accepted: batch_len,
                    inserted: 0,
                    updated: 0,
                }
            }
        }
    }
}

#[async_trait]
impl Delivery for WebhookDelivery {
    async fn send(&self, batch: &[Row]) -> Result<DeliveryReport> {
        let mut last_error = String::new();

        for attempt in 1..=self.retry_attempts {
            if attempt > 1 {
                let wait = self.backoff(attempt - 1);
                info!(wait_secs = wait.as_secs_f64(), "retrying batch");
                tokio::time::sleep(wait).await;
            }

            let response = self
                .client
                .post(&self.url)
                .header("X-Api-Key", &self.api_key)
                .json(batch)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::UNAUTHORIZED {
                        error!("authentication failed: API key rejected by ingestion endpoint");
                        return Err(SyncError::AuthRejected);
                    }
                    if status == StatusCode::SERVICE_UNAVAILABLE {
                        error!("ingestion endpoint has no API key configured");
                        return Err(SyncError::CredentialNotConfigured);
                    }
                    if status.is_success() {
                        let body = match resp.text().await {
                            Ok(body) => body,
                            Err(e) => {
                                last_error = format!("failed to read response body: {e}");
                                warn!(
                                    attempt,
                                    max_attempts = self.retry_attempts,
                                    error = %last_error,
                                    "delivery attempt failed"
                                );
                                continue;
                            }
                        };
                        return Ok(Self::parse_report(&body, batch.len()));
                    }

                    let body = resp.text().await.unwrap_or_default();
                    last_error = format!("HTTP {status}: {}", truncate(&body, 200));
                    warn!(
                        attempt,
                        max_attempts = self.retry_attempts,
                        error = %last_error,
                        "delivery attempt failed"
                    );
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        format!("request timed out: {e}")
                    } else if e.is_connect() {
                        format!("connection failed (is the ingestion endpoint up?): {e}")
                    } else {
                        format!("request failed: {e}")
                    };
                    warn!(
                        attempt,
                        max_attempts = self.retry_attempts,
                        error = %last_error,
                        "delivery attempt failed"
                    );
                }
            }
        }

        Err(SyncError::DeliveryExhausted {
            attempts: self.retry_attempts,
            last_error,
        })
    }

    async fn check(&self) -> Result<()> {
        // Any HTTP response at all (405 included) proves reachability.
        match self.client.head(&self.url).send().await {
            Ok(resp) => {
                info!(status = %resp.status(), url = %self.url, "ingestion endpoint reachable");
                Ok(())
            }
            Err(e) => Err(SyncError::transient(format!(
                "ingestion endpoint unreachable at {}: {e}",
                self.url
            ))),
        }
    }
}

/// Dry-run channel: logs what would be sent and acknowledges everything
pub struct NoopDelivery;

#[async_trait]
impl Delivery for NoopDelivery {
    async fn send(&self, batch: &[Row]) -> Result<DeliveryReport> {
        info!(rows = batch.len(), "[dry run] would send batch");
        Ok(DeliveryReport {
            accepted: batch.len(),
            inserted: 0,
            updated: 0,
        })
    }

    async fn check(&self) -> Result<()> {
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
