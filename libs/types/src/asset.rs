//! Asset records and dataset snapshots
//!
//! An [`AssetRecord`] is one row per distinct tradable asset observation.
//! A [`Snapshot`] is the ordered, immutable, deduplicated dataset published
//! by a refresh cycle; it is the unit stored in the cache and the unit
//! broadcast to clients.
//!
//! Addresses compare case-insensitively; every snapshot holds exactly one
//! record per normalized address.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::RecordError;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// One observation of a tradable asset, reconciled across sources.
///
/// Field names serialize in camelCase to match the upstream wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Chain-native identifier; equality key, compared case-insensitively.
    pub address: String,
    /// Display symbol; may be empty from some sources.
    pub symbol: String,
    /// Display name; may be empty from some sources.
    pub name: String,
    /// USD price, non-negative.
    pub price_usd: f64,
    /// Price in the chain-native quote asset, non-negative.
    pub price_native: f64,
    /// 24h traded volume in USD; absent upstream is reported as 0.
    pub volume_24h: f64,
    /// Signed 24h price change, in percentage points.
    pub price_change_24h: f64,
    /// Market capitalization in USD; absent upstream is reported as 0.
    pub market_cap: f64,
    /// Pool liquidity in USD; absent upstream is reported as 0.
    pub liquidity: f64,
    /// Originating source or venue; comma-joined after a merge.
    pub source_id: String,
    /// Source-specific pair/pool identifier.
    pub venue_address: String,
    /// Chain the asset trades on.
    pub chain_id: String,
    /// Unix milliseconds of the most recent contributing observation.
    pub observed_at: i64,
}

impl AssetRecord {
    /// Address folded to lowercase, the snapshot identity key.
    pub fn normalized_address(&self) -> String {
        self.address.to_lowercase()
    }

    /// Case-insensitive address comparison.
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }

    /// Validate invariants a record must satisfy before entering a snapshot.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.address.trim().is_empty() {
            return Err(RecordError::EmptyAddress);
        }
        for (field, value) in [
            ("priceUsd", self.price_usd),
            ("priceNative", self.price_native),
            ("volume24h", self.volume_24h),
            ("marketCap", self.market_cap),
            ("liquidity", self.liquidity),
        ] {
            if value < 0.0 {
                return Err(RecordError::NegativeQuantity {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// An ordered, immutable dataset of asset records plus its capture time.
///
/// Created by a successful refresh cycle and superseded (never mutated in
/// place) by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Reconciled records, one per normalized address.
    pub records: Vec<AssetRecord>,
    /// Unix milliseconds when this snapshot was captured.
    pub captured_at: i64,
}

impl Snapshot {
    /// Build a snapshot from reconciled records, stamped with the current time.
    pub fn new(records: Vec<AssetRecord>) -> Self {
        Self {
            records,
            captured_at: now_millis(),
        }
    }

    /// Number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by address, case-insensitively.
    pub fn get(&self, address: &str) -> Option<&AssetRecord> {
        self.records.iter().find(|r| r.matches_address(address))
    }
}
