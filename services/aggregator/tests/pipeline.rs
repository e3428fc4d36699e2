//! End-to-end pipeline tests for the aggregation service
//!
//! Exercises the full flow with in-repo mock sources and the in-process
//! store: fetch → reconcile → cache → change event → hub fan-out, plus the
//! query surface over the resulting snapshots.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use aggregator::cache::{RefreshOutcome, SnapshotCache, SNAPSHOT_KEY, UPDATES_CHANNEL};
use aggregator::hub::{SubscriptionHub, SESSION_OUTBOX_CAPACITY};
use aggregator::metrics::ServiceMetrics;
use aggregator::service::{TokenLookup, TokenService};
use aggregator::sources::{PriceSource, SourceError, SourceRegistry};
use aggregator::store::{MemoryStore, Store};
use types::asset::AssetRecord;
use types::query::{FilterOptions, PaginationOptions, SortDirection, SortField, SortOptions};

fn record(address: &str, source: &str, price: f64, volume: f64) -> AssetRecord {
    AssetRecord {
        address: address.to_string(),
        symbol: "TKN".to_string(),
        name: "Token".to_string(),
        price_usd: price,
        price_native: price / 100.0,
        volume_24h: volume,
        price_change_24h: 1.0,
        market_cap: volume * 10.0,
        liquidity: volume / 2.0,
        source_id: source.to_string(),
        venue_address: format!("{}-pool", source),
        chain_id: "solana".to_string(),
        observed_at: 1_700_000_000_000,
    }
}

/// Mock source yielding a scripted sequence of fetch results; the last
/// result repeats once the script runs out.
struct ScriptedSource {
    key: &'static str,
    script: Mutex<VecDeque<Result<Vec<AssetRecord>, SourceError>>>,
    fallback: Result<Vec<AssetRecord>, SourceError>,
}

impl ScriptedSource {
    fn fixed(key: &'static str, records: Vec<AssetRecord>) -> Arc<Self> {
        Arc::new(Self {
            key,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(records),
        })
    }

    fn scripted(
        key: &'static str,
        script: Vec<Result<Vec<AssetRecord>, SourceError>>,
        fallback: Result<Vec<AssetRecord>, SourceError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            script: Mutex::new(script.into()),
            fallback,
        })
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    fn key(&self) -> &str {
        self.key
    }

    async fn fetch(&self) -> Result<Vec<AssetRecord>, SourceError> {
        let mut script = self.script.lock().await;
        match script.pop_front() {
            Some(result) => result,
            None => self.fallback.clone(),
        }
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    service: Arc<TokenService>,
    hub: Arc<SubscriptionHub>,
}

fn harness(sources: Vec<Arc<ScriptedSource>>) -> Harness {
    let metrics = Arc::new(ServiceMetrics::new());
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(SnapshotCache::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Duration::from_secs(30),
        Arc::clone(&metrics),
    ));
    let registry = Arc::new(SourceRegistry::new(
        sources
            .into_iter()
            .map(|s| s as Arc<dyn PriceSource>)
            .collect(),
        Arc::clone(&metrics),
    ));
    let service = Arc::new(TokenService::new(cache, registry, Arc::clone(&metrics)));
    let hub = Arc::new(SubscriptionHub::new(Arc::clone(&service), metrics));
    Harness {
        store,
        service,
        hub,
    }
}

/// Two sources report the same asset: the merged record carries the lower
/// price and both source identifiers.
#[tokio::test]
async fn test_two_source_merge_end_to_end() {
    let shared = "So11111111111111111111111111111111111111112";
    let h = harness(vec![
        ScriptedSource::fixed("dexscreener", vec![record(shared, "raydium", 1.50, 100.0)]),
        ScriptedSource::fixed(
            "jupiter",
            vec![record(shared, "jupiter-search", 1.52, 900.0)],
        ),
    ]);

    let outcome = h.service.refresh().await;
    assert_eq!(outcome, RefreshOutcome::Changed { records: 1 });

    let lookup = h.service.get_token(shared).await;
    let TokenLookup::Found(merged) = lookup else {
        panic!("expected merged record, got {:?}", lookup);
    };
    assert_eq!(merged.price_usd, 1.50, "minimum price wins");
    assert_eq!(merged.volume_24h, 900.0, "maximum volume wins");
    assert!(merged.source_id.contains("raydium"));
    assert!(merged.source_id.contains("jupiter-search"));
}

/// A changed refresh publishes a full-update that reaches every session,
/// while each session's direct queries see its own filtered slice.
#[tokio::test]
async fn test_change_event_fans_out_to_all_sessions() {
    let h = harness(vec![ScriptedSource::fixed(
        "dexscreener",
        vec![
            record("addr-big", "raydium", 1.0, 1000.0),
            record("addr-small", "raydium", 1.0, 10.0),
        ],
    )]);
    let _listener = h.hub.start_update_listener(Arc::clone(&h.store) as Arc<dyn Store>);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (tx1, mut rx1) = mpsc::channel(SESSION_OUTBOX_CAPACITY);
    let (tx2, mut rx2) = mpsc::channel(SESSION_OUTBOX_CAPACITY);
    let id1 = h.hub.connect(tx1);
    h.hub.connect(tx2);

    // One session narrows its view; the other keeps defaults
    h.hub
        .handle_message(
            &id1,
            r#"{"type": "subscribe", "filters": {"minVolume": 500}}"#,
        )
        .await;
    let reply: serde_json::Value = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
    assert_eq!(reply["type"], "data");
    assert_eq!(reply["data"]["total"], 0, "nothing fetched yet");

    let outcome = h.service.refresh().await;
    assert_eq!(outcome, RefreshOutcome::Changed { records: 2 });

    // Both sessions receive the undifferentiated full-update broadcast
    for rx in [&mut rx1, &mut rx2] {
        let raw = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("broadcast should arrive")
            .expect("channel open");
        let message: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(message["type"], "full-update");
        assert_eq!(message["data"]["records"].as_array().unwrap().len(), 2);
    }

    // Re-querying applies the narrowed view for session 1 only
    h.hub
        .handle_message(&id1, r#"{"type": "update-filters"}"#)
        .await;
    let reply: serde_json::Value = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
    assert_eq!(reply["data"]["total"], 1);
    assert_eq!(reply["data"]["data"][0]["address"], "addr-big");
}

/// A cycle in which every source fails keeps the previous snapshot readable
/// and publishes nothing.
#[tokio::test]
async fn test_total_outage_preserves_snapshot_and_silence() {
    let h = harness(vec![ScriptedSource::scripted(
        "dexscreener",
        vec![Ok(vec![record("addr", "raydium", 2.5, 100.0)])],
        Err(SourceError::Timeout),
    )]);

    assert_eq!(
        h.service.refresh().await,
        RefreshOutcome::Changed { records: 1 }
    );

    let mut updates = h.store.subscribe(UPDATES_CHANNEL).await.unwrap();

    // All subsequent fetches fail
    assert_eq!(h.service.refresh().await, RefreshOutcome::SkippedEmpty);
    assert_eq!(h.service.refresh().await, RefreshOutcome::SkippedEmpty);

    let lookup = h.service.get_token("addr").await;
    assert!(
        matches!(lookup, TokenLookup::Found(ref r) if r.price_usd == 2.5),
        "previous snapshot remains readable, got {:?}",
        lookup
    );
    assert!(updates.try_recv().is_err(), "no change event was emitted");

    // The persisted snapshot is also untouched
    let persisted = h.store.get(SNAPSHOT_KEY).await.unwrap().unwrap();
    assert!(persisted.contains("addr"));
}

/// Unchanged data extends freshness without a broadcast; a later meaningful
/// change publishes again.
#[tokio::test]
async fn test_change_detection_gates_publishing() {
    let h = harness(vec![ScriptedSource::scripted(
        "dexscreener",
        vec![
            Ok(vec![record("addr", "raydium", 100.0, 500.0)]),
            Ok(vec![record("addr", "raydium", 100.0009, 500.0)]),
            Ok(vec![record("addr", "raydium", 100.0011, 500.0)]),
        ],
        Err(SourceError::Timeout),
    )]);
    let _listener = h.hub.start_update_listener(Arc::clone(&h.store) as Arc<dyn Store>);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (tx, mut rx) = mpsc::channel(SESSION_OUTBOX_CAPACITY);
    h.hub.connect(tx);

    assert_eq!(
        h.service.refresh().await,
        RefreshOutcome::Changed { records: 1 }
    );
    let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(first["type"], "full-update");

    // Within the price threshold: no broadcast
    assert_eq!(
        h.service.refresh().await,
        RefreshOutcome::Unchanged { records: 1 }
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(rx.try_recv().is_err());

    // Past the threshold relative to the stored 100.0 snapshot
    assert_eq!(
        h.service.refresh().await,
        RefreshOutcome::Changed { records: 1 }
    );
    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("broadcast should arrive")
        .expect("channel open");
    let second: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(second["type"], "full-update");
}

/// Cursor pagination walks a 55-record dataset in three pages.
#[tokio::test]
async fn test_cursor_pagination_over_service() {
    let records: Vec<AssetRecord> = (0..55)
        .map(|i| record(&format!("addr-{:02}", i), "raydium", 1.0, i as f64))
        .collect();
    let h = harness(vec![ScriptedSource::fixed("dexscreener", records)]);

    let filters = FilterOptions::default();
    let sort = SortOptions {
        field: SortField::Volume24h,
        direction: SortDirection::Asc,
    };

    let page1 = h
        .service
        .get_tokens(&filters, &sort, &PaginationOptions::default())
        .await;
    assert_eq!(page1.data.len(), 20);
    assert_eq!(page1.total, 55);
    assert!(page1.has_more);
    assert_eq!(page1.next_cursor.as_deref(), Some("20"));

    let page3 = h
        .service
        .get_tokens(
            &filters,
            &sort,
            &PaginationOptions {
                limit: 20,
                cursor: Some("40".to_string()),
            },
        )
        .await;
    assert_eq!(page3.data.len(), 15);
    assert!(!page3.has_more);
    assert!(page3.next_cursor.is_none());
    assert_eq!(page3.data[0].volume_24h, 40.0);
}

/// The same scripted inputs produce the same reconciled snapshot, including
/// record order.
#[tokio::test]
async fn test_reconciliation_is_deterministic() {
    let build = || {
        harness(vec![
            ScriptedSource::fixed(
                "dexscreener",
                vec![
                    record("b-addr", "raydium", 2.0, 100.0),
                    record("a-addr", "orca", 1.0, 50.0),
                ],
            ),
            ScriptedSource::fixed("jupiter", vec![record("B-ADDR", "jupiter-search", 1.9, 400.0)]),
        ])
    };

    let h1 = build();
    let h2 = build();
    h1.service.refresh().await;
    h2.service.refresh().await;

    let snap1 = h1.service.current_snapshot().await.unwrap();
    let snap2 = h2.service.current_snapshot().await.unwrap();

    assert_eq!(snap1.records, snap2.records);
    let addresses: Vec<&str> = snap1.records.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addresses, vec!["b-addr", "a-addr"], "first-seen order kept");
    assert_eq!(snap1.records[0].price_usd, 1.9, "min across sources");
    assert_eq!(snap1.records[0].source_id, "raydium,jupiter-search");
}
