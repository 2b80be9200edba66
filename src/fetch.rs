//! Rate-limited provider client.
//!
//! Issues paginated requests against the food-composition API, pacing
//! every request to a fixed inter-request interval derived from the
//! hourly quota, and classifies failures so the orchestrator can decide
//! between retry, skip, and halt.
//!
//! Retry strategy:
//! - HTTP 429 with a retry hint within the ceiling → sleep, retry the
//!   same request (no attempt consumed — the quota is the constraint).
//! - HTTP 429 past the ceiling → [`FetchError::Throttled`]; the run
//!   halts with its checkpoint intact instead of sleeping unobservably.
//! - HTTP 401/403 → [`FetchError::Auth`] immediately; retrying a bad
//!   credential only burns quota.
//! - Anything else (5xx, network, decode) → bounded flat-delay retries,
//!   then [`FetchError::Transient`].

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::models::{FoodPage, SourceFood};

/// Wait applied when a throttling response carries no retry hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider asked for a wait longer than the configured ceiling.
    /// Recoverable by resuming later; the checkpoint is preserved.
    #[error("throttled: provider asked for {retry_after_secs}s, over the configured ceiling")]
    Throttled { retry_after_secs: u64 },

    /// Request kept failing past the retry bound. Page-level: log, skip,
    /// continue.
    #[error("request failed after retries: {0}")]
    Transient(String),

    /// Credential rejected. Not a throughput problem — no retry.
    #[error("authentication rejected (HTTP {0}) — check FDC_API_KEY")]
    Auth(u16),
}

pub struct FetchClient {
    client: reqwest::Client,
    config: ApiConfig,
    api_key: String,
    delay: Duration,
}

impl FetchClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let api_key = config.api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
            delay: pacing_delay(config.requests_per_hour),
        })
    }

    /// Fetch one page of a partition. Pages are 1-based and must be
    /// requested in ascending order — provider pagination is not stable
    /// under out-of-order offset access.
    pub async fn fetch_page(&self, data_type: &str, page: u32) -> Result<FoodPage, FetchError> {
        let url = format!("{}/v1/foods/search", self.config.base_url);
        self.request_json(
            &url,
            &[
                ("dataType", data_type.to_string()),
                ("pageNumber", page.to_string()),
                ("pageSize", self.config.page_size.to_string()),
                ("sortBy", "fdcId".to_string()),
                ("api_key", self.api_key.clone()),
            ],
        )
        .await
    }

    /// Cheap discovery read: a one-item page, used only for the
    /// `totalHits` hint when sizing a fresh run.
    pub async fn count_partition(&self, data_type: &str) -> Result<u64, FetchError> {
        let url = format!("{}/v1/foods/search", self.config.base_url);
        let page: FoodPage = self
            .request_json(
                &url,
                &[
                    ("dataType", data_type.to_string()),
                    ("pageNumber", "1".to_string()),
                    ("pageSize", "1".to_string()),
                    ("api_key", self.api_key.clone()),
                ],
            )
            .await?;
        Ok(page.total_hits)
    }

    /// Fetch one full record by its external id (the expensive per-item
    /// endpoint; used by `fdsync probe`, never by the page loop).
    pub async fn fetch_food(&self, fdc_id: i64) -> Result<SourceFood, FetchError> {
        let url = format!("{}/v1/food/{}", self.config.base_url, fdc_id);
        self.request_json(&url, &[("api_key", self.api_key.clone())])
            .await
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            // Steady pacing before every request, retries included.
            tokio::time::sleep(self.delay).await;

            let result = self.client.get(url).query(query).send().await;

            let failure = match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.json::<T>().await {
                            Ok(value) => return Ok(value),
                            Err(e) => format!("invalid response body: {}", e),
                        }
                    } else if status.as_u16() == 429 {
                        let wait = retry_after_secs(response.headers())
                            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                        if wait > self.config.throttle_ceiling_secs {
                            return Err(FetchError::Throttled {
                                retry_after_secs: wait,
                            });
                        }
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    } else if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(FetchError::Auth(status.as_u16()));
                    } else {
                        format!("HTTP {} from {}", status, url)
                    }
                }
                Err(e) => e.to_string(),
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                return Err(FetchError::Transient(failure));
            }
            tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
        }
    }
}

/// Fixed inter-request interval for an hourly quota, rounded up so a
/// full hour of requests never exceeds it.
pub fn pacing_delay(requests_per_hour: u32) -> Duration {
    Duration::from_millis(3_600_000_u64.div_ceil(requests_per_hour.max(1) as u64))
}

/// Parse the provider's `Retry-After` seconds hint, when present.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
