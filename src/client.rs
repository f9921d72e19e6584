use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::types::raw::RawAssetResponse;
use crate::validate::validate_response;

/// Delay before the first retry; doubles on each subsequent attempt.
const RETRY_DELAY_BASE: Duration = Duration::from_secs(1);
/// Upper bound on any single backoff delay.
const RETRY_DELAY_CAP: Duration = Duration::from_secs(30);
/// Additional attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One attempt against a score source, without retrying.
///
/// Implemented by the HTTP endpoint and by the in-memory fixture set; the
/// retry and batch layers sit on top of this seam.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    /// Fetch and decode the payload for one asset symbol.
    async fn fetch_raw(&self, symbol: &str) -> Result<Value, FetchError>;
}

#[async_trait]
impl<T: ScoreSource + ?Sized> ScoreSource for Arc<T> {
    async fn fetch_raw(&self, symbol: &str) -> Result<Value, FetchError> {
        (**self).fetch_raw(symbol).await
    }
}

/// HTTP source: `GET <base>/heatmap?asset=<SYMBOL>`.
///
/// There is no batch endpoint; callers fan out per-asset requests
/// themselves.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ScoreSource for HttpSource {
    async fn fetch_raw(&self, symbol: &str) -> Result<Value, FetchError> {
        let url = format!("{}/heatmap", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("asset", symbol)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Validation(format!("body is not valid JSON: {}", e)))
    }
}

/// Retrying acquisition client over any source.
///
/// Transport, HTTP-status and validation failures are retried
/// identically; there is no special-casing of status classes. Retries
/// are scoped per call, with no backoff state shared across assets.
pub struct ScoreClient<S> {
    source: S,
    max_retries: u32,
}

impl<S: ScoreSource> ScoreClient<S> {
    pub fn new(source: S) -> Self {
        Self::with_retries(source, DEFAULT_MAX_RETRIES)
    }

    pub fn with_retries(source: S, max_retries: u32) -> Self {
        Self {
            source,
            max_retries,
        }
    }

    /// One logical acquisition: fetch, validate, retry on any failure
    /// with exponential backoff (1s, 2s, 4s, …, capped at 30s). After
    /// exhausting retries the last error is surfaced; intermediate
    /// errors are not reported individually.
    pub async fn get_asset(&self, symbol: &str) -> Result<RawAssetResponse, FetchError> {
        let mut delay = RETRY_DELAY_BASE;
        let mut attempt = 0u32;
        loop {
            match self.attempt(symbol).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(symbol, %err, attempt, "fetch failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RETRY_DELAY_CAP);
                }
                Err(err) => {
                    warn!(symbol, %err, attempts = attempt + 1, "fetch failed, giving up");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, symbol: &str) -> Result<RawAssetResponse, FetchError> {
        let payload = self.source.fetch_raw(symbol).await?;
        validate_response(&payload)
    }

    /// Fetch every symbol concurrently and keep the per-symbol outcome.
    /// This is the settle step; batch callers filter it down to
    /// successes, which keeps the dropping of failures an explicit
    /// operation.
    pub async fn fetch_all_settled(
        &self,
        symbols: &[String],
    ) -> Vec<(String, Result<RawAssetResponse, FetchError>)> {
        let calls = symbols.iter().map(|symbol| async move {
            let outcome = self.get_asset(symbol).await;
            (symbol.clone(), outcome)
        });
        join_all(calls).await
    }

    /// Fan out one `get_asset` per symbol, unbounded, and wait for all of
    /// them to settle. Only successful responses are returned; failed
    /// symbols are dropped. An all-failed batch is an empty vec, not an
    /// error, and callers must treat that as a distinct, successful state.
    pub async fn get_many_assets(&self, symbols: &[String]) -> Vec<RawAssetResponse> {
        self.fetch_all_settled(symbols)
            .await
            .into_iter()
            .filter_map(|(symbol, outcome)| match outcome {
                Ok(response) => Some(response),
                Err(err) => {
                    warn!(%symbol, %err, "dropping asset from batch");
                    None
                }
            })
            .collect()
    }
}
