//! Token data service
//!
//! Thin orchestrator over cache + sources + query engine: the read path
//! every consumer (HTTP handlers, WebSocket sessions) goes through. A cache
//! miss triggers a refresh-on-read, so consumers never see a stale snapshot
//! as an error; "no data yet" is an empty result set.

use std::sync::Arc;

use tracing::debug;

use types::asset::{AssetRecord, Snapshot};
use types::query::{FilterOptions, Page, PaginationOptions, SortOptions};

use crate::cache::{CacheRead, RefreshOutcome, SnapshotCache};
use crate::metrics::ServiceMetrics;
use crate::query;
use crate::sources::SourceRegistry;

/// Outcome of a single-record lookup.
///
/// An address miss is distinct from an empty cache.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenLookup {
    Found(AssetRecord),
    NotFound,
    NoSnapshot,
}

/// Shared entry point for querying and refreshing token data.
pub struct TokenService {
    cache: Arc<SnapshotCache>,
    sources: Arc<SourceRegistry>,
    metrics: Arc<ServiceMetrics>,
}

impl TokenService {
    pub fn new(
        cache: Arc<SnapshotCache>,
        sources: Arc<SourceRegistry>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            cache,
            sources,
            metrics,
        }
    }

    /// The current snapshot, refreshing on a cache miss.
    ///
    /// None means the refresh itself produced nothing (no snapshot ever, or
    /// every source failed while the old snapshot had already expired).
    pub async fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        match self.cache.read().await {
            CacheRead::Fresh(snapshot) => Some(snapshot),
            miss => {
                debug!(reason = ?miss, "Cache miss — refreshing on read");
                self.cache.refresh(&self.sources).await;
                match self.cache.read().await {
                    CacheRead::Fresh(snapshot) => Some(snapshot),
                    _ => None,
                }
            }
        }
    }

    /// Query the dataset with the caller's filter/sort/pagination state.
    pub async fn get_tokens(
        &self,
        filters: &FilterOptions,
        sort: &SortOptions,
        pagination: &PaginationOptions,
    ) -> Page<AssetRecord> {
        self.metrics.record_query();
        match self.current_snapshot().await {
            Some(snapshot) => query::run(&snapshot, filters, sort, pagination),
            None => Page::empty(),
        }
    }

    /// Look up one record by address, case-insensitively.
    pub async fn get_token(&self, address: &str) -> TokenLookup {
        match self.current_snapshot().await {
            None => TokenLookup::NoSnapshot,
            Some(snapshot) => match snapshot.get(address) {
                Some(record) => TokenLookup::Found(record.clone()),
                None => TokenLookup::NotFound,
            },
        }
    }

    /// Run one refresh cycle now.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.cache.refresh(&self.sources).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{PriceSource, SourceError};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticSource {
        records: Vec<AssetRecord>,
    }

    #[async_trait]
    impl PriceSource for StaticSource {
        fn key(&self) -> &str {
            "static"
        }

        async fn fetch(&self) -> Result<Vec<AssetRecord>, SourceError> {
            if self.records.is_empty() {
                Err(SourceError::Network("unreachable".to_string()))
            } else {
                Ok(self.records.clone())
            }
        }
    }

    fn record(address: &str, price: f64) -> AssetRecord {
        AssetRecord {
            address: address.to_string(),
            symbol: "TKN".to_string(),
            name: "Token".to_string(),
            price_usd: price,
            price_native: 0.01,
            volume_24h: 100.0,
            price_change_24h: 1.0,
            market_cap: 1000.0,
            liquidity: 500.0,
            source_id: "static".to_string(),
            venue_address: "pool".to_string(),
            chain_id: "solana".to_string(),
            observed_at: 1_700_000_000_000,
        }
    }

    fn service_with(records: Vec<AssetRecord>) -> TokenService {
        let metrics = Arc::new(ServiceMetrics::new());
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(SnapshotCache::new(
            store,
            Duration::from_secs(30),
            Arc::clone(&metrics),
        ));
        let sources = Arc::new(SourceRegistry::new(
            vec![Arc::new(StaticSource { records })],
            Arc::clone(&metrics),
        ));
        TokenService::new(cache, sources, metrics)
    }

    #[tokio::test]
    async fn test_cache_miss_triggers_refresh_on_read() {
        let service = service_with(vec![record("addr", 1.5)]);
        let page = service
            .get_tokens(
                &FilterOptions::default(),
                &SortOptions::default(),
                &PaginationOptions::default(),
            )
            .await;
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].price_usd, 1.5);
    }

    #[tokio::test]
    async fn test_no_data_renders_as_empty_page() {
        let service = service_with(Vec::new());
        let page = service
            .get_tokens(
                &FilterOptions::default(),
                &SortOptions::default(),
                &PaginationOptions::default(),
            )
            .await;
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_lookup_outcomes_are_distinct() {
        let empty = service_with(Vec::new());
        assert_eq!(empty.get_token("addr").await, TokenLookup::NoSnapshot);

        let populated = service_with(vec![record("Addr", 2.0)]);
        assert!(matches!(
            populated.get_token("ADDR").await,
            TokenLookup::Found(record) if record.price_usd == 2.0
        ));
        assert_eq!(populated.get_token("ghost").await, TokenLookup::NotFound);
    }

    #[tokio::test]
    async fn test_manual_refresh_reports_outcome() {
        let service = service_with(vec![record("addr", 1.0)]);
        assert_eq!(
            service.refresh().await,
            RefreshOutcome::Changed { records: 1 }
        );
        assert_eq!(
            service.refresh().await,
            RefreshOutcome::Unchanged { records: 1 }
        );
    }
}
