//! Record reconciliation
//!
//! Collapses the union of raw records from all sources into exactly one
//! canonical record per normalized (case-folded) address. Groups preserve
//! first-seen order, and contributors merge pairwise left-to-right in fetch
//! order, so the output is reproducible for the same input sequence.
//!
//! Per-field rules:
//! - `symbol`, `name`, `chain_id`, `venue_address`: first non-empty value
//! - `price_usd`, `price_native`: minimum across contributors
//! - `volume_24h`, `liquidity`, `market_cap`: maximum across contributors
//! - `price_change_24h`: first non-zero value
//! - `source_id`: comma-joined in contribution order (duplicates tolerated)
//! - `observed_at`: most recent contribution

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, warn};

use types::asset::AssetRecord;

/// Merge one incoming record into an existing one for the same asset.
///
/// `existing` is the earlier contributor and wins all first-seen fields.
pub fn merge(existing: &AssetRecord, incoming: &AssetRecord) -> AssetRecord {
    AssetRecord {
        address: existing.address.clone(),
        symbol: first_non_empty(&existing.symbol, &incoming.symbol),
        name: first_non_empty(&existing.name, &incoming.name),
        price_usd: existing.price_usd.min(incoming.price_usd),
        price_native: existing.price_native.min(incoming.price_native),
        volume_24h: existing.volume_24h.max(incoming.volume_24h),
        price_change_24h: if existing.price_change_24h != 0.0 {
            existing.price_change_24h
        } else {
            incoming.price_change_24h
        },
        market_cap: existing.market_cap.max(incoming.market_cap),
        liquidity: existing.liquidity.max(incoming.liquidity),
        source_id: format!("{},{}", existing.source_id, incoming.source_id),
        venue_address: first_non_empty(&existing.venue_address, &incoming.venue_address),
        chain_id: first_non_empty(&existing.chain_id, &incoming.chain_id),
        observed_at: existing.observed_at.max(incoming.observed_at),
    }
}

fn first_non_empty(first: &str, second: &str) -> String {
    if first.is_empty() {
        second.to_string()
    } else {
        first.to_string()
    }
}

/// Reconcile the union of raw records from one refresh cycle into one
/// canonical record per normalized address, in first-seen order.
///
/// Records failing validation are skipped with a warning; they never enter
/// a snapshot.
pub fn reconcile(raw: Vec<AssetRecord>) -> Vec<AssetRecord> {
    let total = raw.len();
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, AssetRecord> = HashMap::new();
    let mut skipped = 0usize;

    for record in raw {
        if let Err(err) = record.validate() {
            warn!(address = %record.address, error = %err, "Skipping invalid record");
            skipped += 1;
            continue;
        }

        let key = record.normalized_address();
        match merged.entry(key) {
            Entry::Occupied(mut entry) => {
                let combined = merge(entry.get(), &record);
                entry.insert(combined);
            }
            Entry::Vacant(entry) => {
                order.push(entry.key().clone());
                entry.insert(record);
            }
        }
    }

    debug!(
        raw = total,
        reconciled = order.len(),
        skipped,
        "Reconciled refresh cycle"
    );

    order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect()
}
