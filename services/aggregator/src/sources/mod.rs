//! Upstream price-source boundary
//!
//! Each source implements [`PriceSource`] and yields raw asset records in
//! its own shape, already normalized to [`AssetRecord`]. The registry fans
//! fetches out concurrently and tolerates per-source failure: a failed
//! source degrades to an empty contribution, it never aborts the cycle.
//!
//! Retry policy: server-side errors (status ≥ 500) retry on a fixed backoff
//! ladder, then propagate. Transport errors and client-side statuses
//! propagate immediately.

pub mod dexscreener;
pub mod jupiter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use types::asset::AssetRecord;

use crate::metrics::ServiceMetrics;
use crate::rate_limit::RateLimiter;

pub use dexscreener::DexScreenerSource;
pub use jupiter::JupiterSource;

/// Fixed backoff ladder applied to upstream 5xx responses.
pub(crate) const RETRY_DELAYS: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
];

/// Errors that can occur while fetching from one upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {status}")]
    Http { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Map a transport-level error into the source taxonomy.
fn classify(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else if let Some(status) = err.status() {
        SourceError::Http {
            status: status.as_u16(),
        }
    } else {
        SourceError::Network(err.to_string())
    }
}

/// One upstream price source.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable key identifying the source, also its rate-limit bucket.
    fn key(&self) -> &str;

    /// Fetch the source's current records.
    async fn fetch(&self) -> Result<Vec<AssetRecord>, SourceError>;
}

/// Rate-limited GET returning a decoded JSON body.
///
/// Waits out the limiter when over quota, re-checking admission after each
/// wait since concurrent acquirers can race.
pub(crate) async fn get_json_with_retry<T: DeserializeOwned>(
    client: &Client,
    limiter: &RateLimiter,
    key: &str,
    url: &str,
) -> Result<T, SourceError> {
    let mut attempt = 0;
    loop {
        while !limiter.try_acquire(key) {
            let wait = limiter.wait_time(key);
            debug!(
                source = key,
                wait_ms = wait.as_millis() as u64,
                "Rate limited — waiting for window"
            );
            sleep(wait.max(Duration::from_millis(25))).await;
        }

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(err) => return Err(classify(err)),
        };

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|err| SourceError::Decode(err.to_string()));
        }

        if status.is_server_error() && attempt < RETRY_DELAYS.len() {
            let delay = RETRY_DELAYS[attempt];
            warn!(
                source = key,
                status = status.as_u16(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Upstream server error — retrying"
            );
            sleep(delay).await;
            attempt += 1;
            continue;
        }

        return Err(SourceError::Http {
            status: status.as_u16(),
        });
    }
}

/// The fixed set of registered sources for one service instance.
///
/// Registration order is the reconciler's tie-break order, so it must stay
/// deterministic across cycles.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn PriceSource>>,
    metrics: Arc<ServiceMetrics>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { sources, metrics }
    }

    /// Fetch every source concurrently, flattening results in registration
    /// order. A failed source contributes nothing.
    pub async fn fetch_all(&self) -> Vec<AssetRecord> {
        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                match source.fetch().await {
                    Ok(records) => {
                        debug!(
                            source = source.key(),
                            records = records.len(),
                            "Source fetch succeeded"
                        );
                        Ok(records)
                    }
                    Err(err) => {
                        warn!(
                            source = source.key(),
                            error = %err,
                            "Source fetch failed — degrading to empty contribution"
                        );
                        Err(())
                    }
                }
            }
        });

        let mut records = Vec::new();
        for result in join_all(fetches).await {
            match result {
                Ok(batch) => records.extend(batch),
                Err(()) => self.metrics.record_fetch_failure(),
            }
        }
        records
    }

    /// Number of registered sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}
