//! Batched lookup client for the DataJud search API.
//!
//! One `POST {base}/api_publica_{court}/_search` per court per batch, body
//! `{"query":{"terms":{"numeroProcesso":[...]}},"size":N}`. Retry is
//! whole-batch: an HTTP 429 pauses for the configured cooldown and retries
//! without consuming an attempt; any other failure retries with linearly
//! increasing backoff until the attempt cap, after which the batch degrades
//! and the orchestrator re-checks those processes next window.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use tramita_core::Supplement;

use crate::config::SyncConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("rate limited")]
    RateLimited,
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search for court {court} failed after {attempts} attempts")]
    RetriesExhausted { court: String, attempts: u32 },
}

/// A movement exactly as the API returns it, before id derivation and
/// timestamp normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMovement {
    #[serde(rename = "codigo")]
    pub code: Option<i64>,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "dataHora")]
    pub raw_timestamp: Option<String>,
    #[serde(rename = "complementosTabelados", default)]
    pub supplements: Vec<Supplement>,
}

/// The `_source` document of one search hit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseRecord {
    #[serde(rename = "numeroProcesso")]
    pub case_number: Option<String>,
    #[serde(rename = "movimentos", default)]
    pub movements: Vec<RawMovement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: HitsEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub total: HitsTotal,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HitsTotal {
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hit {
    #[serde(rename = "_source", default)]
    pub source: CaseRecord,
}

/// One search attempt against a court endpoint. The seam between the retry
/// loop and the network; tests script it.
#[allow(async_fn_in_trait)]
pub trait SearchTransport: Send + Sync {
    async fn search(&self, court: &str, body: &Value) -> Result<SearchResponse, ApiError>;
}

impl<T: SearchTransport + ?Sized> SearchTransport for std::sync::Arc<T> {
    async fn search(&self, court: &str, body: &Value) -> Result<SearchResponse, ApiError> {
        (**self).search(court, body).await
    }
}

/// reqwest-backed [`SearchTransport`] with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

impl SearchTransport for HttpTransport {
    async fn search(&self, court: &str, body: &Value) -> Result<SearchResponse, ApiError> {
        let url = format!(
            "{}/api_publica_{}/_search",
            self.base_url,
            court.to_lowercase()
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("ApiKey {}", self.api_key))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// Batched case lookup with retry, backoff, and rate-limit pacing.
pub struct DatajudClient<T> {
    transport: T,
    max_retries: u32,
    backoff_step: std::time::Duration,
    rate_limit_pause: std::time::Duration,
}

impl<T: SearchTransport> DatajudClient<T> {
    pub fn new(transport: T, config: &SyncConfig) -> Self {
        Self {
            transport,
            max_retries: config.max_retries,
            backoff_step: config.backoff_step,
            rate_limit_pause: config.rate_limit_pause,
        }
    }

    /// Look up a batch of case numbers in one court.
    ///
    /// Returns only the cases present in the response, keyed by case
    /// number; absence is not an error. Hits without a case number are
    /// dropped.
    pub async fn lookup(
        &self,
        court: &str,
        case_numbers: &[String],
    ) -> Result<HashMap<String, CaseRecord>, ApiError> {
        let body = json!({
            "query": { "terms": { "numeroProcesso": case_numbers } },
            "size": case_numbers.len(),
        });

        let mut attempts = 0;
        loop {
            match self.transport.search(court, &body).await {
                Ok(response) => {
                    let total = response.hits.total.value;
                    let mut found = HashMap::new();
                    for hit in response.hits.hits {
                        if let Some(number) = hit.source.case_number.clone() {
                            found.insert(number, hit.source);
                        }
                    }
                    debug!(
                        court,
                        total,
                        found = found.len(),
                        queried = case_numbers.len(),
                        "search batch returned"
                    );
                    return Ok(found);
                }
                Err(ApiError::RateLimited) => {
                    // Cooldown, then retry; a 429 never consumes an attempt.
                    warn!(
                        court,
                        pause_secs = self.rate_limit_pause.as_secs(),
                        "rate limited, cooling down"
                    );
                    tokio::time::sleep(self.rate_limit_pause).await;
                }
                Err(error) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        warn!(court, attempts, %error, "search batch failed, giving up");
                        return Err(ApiError::RetriesExhausted {
                            court: court.to_string(),
                            attempts,
                        });
                    }
                    warn!(court, attempt = attempts, %error, "search attempt failed, backing off");
                    tokio::time::sleep(self.backoff_step * attempts).await;
                }
            }
        }
    }
}
