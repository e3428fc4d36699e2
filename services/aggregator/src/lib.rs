//! Token Market Aggregation Service
//!
//! Periodically pulls token market data from multiple upstream price
//! sources, reconciles duplicate per-asset observations into one canonical
//! record each, maintains a TTL-bounded snapshot cache with change
//! detection, and fans change notifications out to WebSocket subscribers
//! that each hold independent filter/sort/pagination preferences.
//!
//! # Architecture
//!
//! ```text
//! RefreshScheduler (interval, single-flight)
//!        │
//!   ┌────▼─────────┐
//!   │SourceRegistry│  ← rate-limited fetches (DexScreener, Jupiter)
//!   └────┬─────────┘
//!        │ raw records
//!   ┌────▼─────┐
//!   │Reconciler│  ← one canonical record per normalized address
//!   └────┬─────┘
//!   ┌────▼────────┐  change event   ┌───────────────┐
//!   │SnapshotCache│ ───────────────▶│SubscriptionHub│
//!   └────┬────────┘  (store pub/sub)└───────┬───────┘
//!        │ read                             │ full-update
//!   ┌────▼──────┐                      ┌────▼─────┐
//!   │QueryEngine│ ◀── HTTP / WS query  │ sessions │
//!   └───────────┘                      └──────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod metrics;
pub mod models;
pub mod query;
pub mod rate_limit;
pub mod reconcile;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod sources;
pub mod state;
pub mod store;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
