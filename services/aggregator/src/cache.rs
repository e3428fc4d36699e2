//! Change-aware snapshot cache
//!
//! Holds the single canonical dataset snapshot behind a TTL, decides whether
//! a refresh produced a meaningful change, and publishes change events
//! through the store's pub/sub channel when it did.
//!
//! State machine: EMPTY → FRESH → STALE → FRESH …
//! - EMPTY: nothing ever stored; reads signal a miss.
//! - FRESH: snapshot present, TTL not elapsed; reads return it directly.
//! - STALE: TTL elapsed; reads signal a miss and the caller triggers a
//!   refresh.
//!
//! Snapshots are published copy-on-write: readers clone an `Arc` and always
//! observe a complete, self-consistent dataset. Two overlapping refreshes
//! are tolerated: a refresh is idempotent and replacement is
//! last-writer-wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use types::asset::{now_millis, AssetRecord, Snapshot};

use crate::metrics::ServiceMetrics;
use crate::reconcile::reconcile;
use crate::sources::SourceRegistry;
use crate::store::Store;

/// Store key holding the serialized snapshot.
pub const SNAPSHOT_KEY: &str = "tokens:all";

/// Pub/sub channel carrying change events.
pub const UPDATES_CHANNEL: &str = "token-updates";

/// Absolute USD price difference that counts as a change.
const PRICE_THRESHOLD: f64 = 0.001;

/// Relative difference for volume, market cap, and liquidity.
const RELATIVE_THRESHOLD: f64 = 0.01;

/// Absolute difference for the 24h price-change percentage.
const PRICE_CHANGE_THRESHOLD: f64 = 0.01;

/// Messages carried on the [`UPDATES_CHANNEL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UpdateMessage {
    /// A refresh produced a meaningfully different snapshot.
    FullUpdate { data: Snapshot, timestamp: i64 },
    /// One record's USD price was point-updated.
    PriceUpdate {
        address: String,
        old_price: f64,
        new_price: f64,
        timestamp: i64,
    },
}

/// Result of a cache read.
#[derive(Debug, Clone)]
pub enum CacheRead {
    /// A fresh snapshot.
    Fresh(Arc<Snapshot>),
    /// Nothing was ever stored.
    MissEmpty,
    /// A snapshot exists but its TTL elapsed.
    MissStale,
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New snapshot stored and a change event published.
    Changed { records: usize },
    /// Data within thresholds; freshness extended, no event.
    Unchanged { records: usize },
    /// Every source came back empty; previous snapshot retained untouched.
    SkippedEmpty,
}

struct CacheEntry {
    snapshot: Arc<Snapshot>,
    expires_at: Instant,
}

/// The shared snapshot cache.
pub struct SnapshotCache {
    entry: RwLock<Option<CacheEntry>>,
    store: Arc<dyn Store>,
    ttl: Duration,
    metrics: Arc<ServiceMetrics>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn Store>, ttl: Duration, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            entry: RwLock::new(None),
            store,
            ttl,
            metrics,
        }
    }

    /// Read the current snapshot, or signal which kind of miss occurred.
    pub async fn read(&self) -> CacheRead {
        let guard = self.entry.read().await;
        match guard.as_ref() {
            None => CacheRead::MissEmpty,
            Some(entry) if entry.expires_at > Instant::now() => {
                CacheRead::Fresh(Arc::clone(&entry.snapshot))
            }
            Some(_) => CacheRead::MissStale,
        }
    }

    /// Run one refresh cycle: fetch all sources, reconcile, and update the
    /// stored snapshot when the data meaningfully changed.
    ///
    /// Failures at the fetch boundary degrade to empty contributions inside
    /// the registry, so this never propagates an error to the scheduler.
    pub async fn refresh(&self, sources: &SourceRegistry) -> RefreshOutcome {
        self.metrics.record_refresh_cycle();

        let raw = sources.fetch_all().await;
        let reconciled = reconcile(raw);

        if reconciled.is_empty() {
            // Total upstream outage must not blank a still-valid cache.
            warn!("Refresh yielded no records from any source — retaining previous snapshot");
            self.metrics.record_skipped_empty();
            return RefreshOutcome::SkippedEmpty;
        }

        let snapshot = Arc::new(Snapshot::new(reconciled));
        let records = snapshot.len();

        let (changed, previous) = {
            let guard = self.entry.read().await;
            match guard.as_ref() {
                None => (true, None),
                Some(entry) => (
                    has_changed(&entry.snapshot, &snapshot),
                    Some(Arc::clone(&entry.snapshot)),
                ),
            }
        };

        if changed {
            {
                let mut guard = self.entry.write().await;
                *guard = Some(CacheEntry {
                    snapshot: Arc::clone(&snapshot),
                    expires_at: Instant::now() + self.ttl,
                });
            }
            self.persist(&snapshot).await;
            self.publish(&UpdateMessage::FullUpdate {
                data: (*snapshot).clone(),
                timestamp: now_millis(),
            })
            .await;
            self.metrics.record_snapshot_published();
            info!(records, "Snapshot changed — stored and published update");
            RefreshOutcome::Changed { records }
        } else {
            {
                let mut guard = self.entry.write().await;
                if let Some(entry) = guard.as_mut() {
                    entry.expires_at = Instant::now() + self.ttl;
                }
            }
            // Keep the store entry's TTL in step with local freshness
            if let Some(previous) = previous {
                self.persist(&previous).await;
            }
            debug!(records, "No meaningful change — extended snapshot freshness");
            RefreshOutcome::Unchanged { records }
        }
    }

    /// Point-update one record's USD price in the current snapshot.
    ///
    /// Returns the old price when the record existed, publishing a
    /// `price-update` event; None when there is no snapshot or no such
    /// address.
    pub async fn update_price(&self, address: &str, new_price: f64) -> Option<f64> {
        let (snapshot, old_price) = {
            let mut guard = self.entry.write().await;
            let entry = guard.as_mut()?;

            let mut records = entry.snapshot.records.clone();
            let record = records.iter_mut().find(|r| r.matches_address(address))?;
            let old_price = record.price_usd;
            record.price_usd = new_price;
            record.observed_at = now_millis();

            entry.snapshot = Arc::new(Snapshot::new(records));
            entry.expires_at = Instant::now() + self.ttl;
            (Arc::clone(&entry.snapshot), old_price)
        };

        self.persist(&snapshot).await;
        self.publish(&UpdateMessage::PriceUpdate {
            address: address.to_string(),
            old_price,
            new_price,
            timestamp: now_millis(),
        })
        .await;
        info!(address, old_price, new_price, "Price point-updated");
        Some(old_price)
    }

    async fn persist(&self, snapshot: &Arc<Snapshot>) {
        let json = match serde_json::to_string(&**snapshot) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "Failed to serialize snapshot for the store");
                return;
            }
        };
        if let Err(err) = self.store.set(SNAPSHOT_KEY, &json, self.ttl.as_secs()).await {
            // Store trouble degrades persistence, never the local cache
            error!(error = %err, "Failed to persist snapshot");
        }
    }

    async fn publish(&self, message: &UpdateMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "Failed to serialize update message");
                return;
            }
        };
        if let Err(err) = self.store.publish(UPDATES_CHANNEL, &json).await {
            error!(error = %err, "Failed to publish update message");
        }
    }
}

/// Whether `incoming` differs meaningfully from `existing`.
fn has_changed(existing: &Snapshot, incoming: &Snapshot) -> bool {
    if existing.len() != incoming.len() {
        return true;
    }

    for record in &incoming.records {
        match existing.get(&record.address) {
            None => return true,
            Some(previous) => {
                if record_differs(previous, record) {
                    return true;
                }
            }
        }
    }
    false
}

/// Per-field threshold comparison between two observations of one asset.
fn record_differs(existing: &AssetRecord, incoming: &AssetRecord) -> bool {
    if (existing.price_usd - incoming.price_usd).abs() > PRICE_THRESHOLD {
        return true;
    }
    if (existing.volume_24h - incoming.volume_24h).abs()
        > existing.volume_24h * RELATIVE_THRESHOLD
    {
        return true;
    }
    if (existing.price_change_24h - incoming.price_change_24h).abs() > PRICE_CHANGE_THRESHOLD {
        return true;
    }
    if existing.market_cap > 0.0
        && incoming.market_cap > 0.0
        && (existing.market_cap - incoming.market_cap).abs()
            > existing.market_cap * RELATIVE_THRESHOLD
    {
        return true;
    }
    if (existing.liquidity - incoming.liquidity).abs() > existing.liquidity * RELATIVE_THRESHOLD {
        return true;
    }
    false
}
