//! HTTP-backed outcome store
//!
//! Persists validation outcomes to a results service and reads them back for
//! metric windows and reports. Writes are retried with exponential backoff on
//! transient failures; client errors are not retried.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use super::OutcomeStore;
use crate::config::StoreConfig;
use crate::contracts::ValidationOutcome;
use crate::error::{StoreError, StoreResult};

const RESULTS_PATH: &str = "/api/v1/validation-results";

/// Configuration for the HTTP outcome store
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the results service
    pub base_url: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    pub backoff_multiplier: f64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 5000,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl HttpStoreConfig {
    /// Derive from the engine's store section; `None` when no URL is configured
    pub fn from_store_config(config: &StoreConfig) -> Option<Self> {
        config.results_url.as_ref().map(|url| Self {
            base_url: url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
            max_retries: config.max_retries,
            ..Default::default()
        })
    }
}

/// Outcome store speaking JSON over HTTP
pub struct HttpOutcomeStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpOutcomeStore {
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn results_url(&self) -> String {
        format!("{}{}", self.config.base_url, RESULTS_PATH)
    }

    async fn send_outcome(&self, url: &str, outcome: &ValidationOutcome) -> StoreResult<()> {
        let response = self
            .client
            .post(url)
            .json(outcome)
            .header("X-Outcome-Id", outcome.id.to_string())
            .header("X-Entity-Type", outcome.entity_type.as_str())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::CONFLICT {
            Err(StoreError::Conflict(format!("outcome {} already stored", outcome.id)))
        } else if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Serialization(format!("Rejected ({}): {}", status, body)))
        } else {
            Err(StoreError::Http(format!("Server error: {}", status)))
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(err.to_string())
    } else if err.is_connect() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Http(err.to_string())
    }
}

#[async_trait]
impl OutcomeStore for HttpOutcomeStore {
    async fn save_outcome(&self, outcome: &ValidationOutcome) -> StoreResult<()> {
        let url = self.results_url();
        let mut last_error = None;
        let mut backoff_ms = self.config.initial_backoff_ms;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    attempt = attempt,
                    backoff_ms = backoff_ms,
                    outcome_id = %outcome.id,
                    "Retrying outcome persistence"
                );
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms as f64 * self.config.backoff_multiplier) as u64;
                backoff_ms = backoff_ms.min(self.config.max_backoff_ms);
            }

            match self.send_outcome(&url, outcome).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        error = %e,
                        outcome_id = %outcome.id,
                        "Failed to persist validation outcome"
                    );
                    let permanent = !e.is_transient();
                    last_error = Some(e);
                    if permanent {
                        break;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| StoreError::Http("Unknown error during outcome persistence".to_string())))
    }

    async fn outcomes_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ValidationOutcome>> {
        let response = self
            .client
            .get(self.results_url())
            .query(&[
                ("from", from.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("to", to.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Http(format!("Range query failed: {}", status)));
        }

        let outcomes: Vec<ValidationOutcome> = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(format!("Failed to parse response: {}", e)))?;

        // The service may round range bounds; re-apply them locally
        Ok(outcomes
            .into_iter()
            .filter(|o| o.validated_at >= from && o.validated_at < to)
            .collect())
    }
}
