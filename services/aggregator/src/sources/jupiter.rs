//! Jupiter search price source
//!
//! Queries the token search endpoint for a configured query string. The
//! response is a bare array; 24h volume is the sum of buy and sell legs,
//! and market cap falls back `mcap` → `fdv` → 0. Jupiter does not report a
//! native-quote price, so `price_native` is always 0.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use types::asset::{now_millis, AssetRecord};

use crate::rate_limit::RateLimiter;

use super::{get_json_with_retry, PriceSource, SourceError};

const BASE_URL: &str = "https://lite-api.jup.ag/tokens/v2/search";

/// Rate-limit bucket for this source.
pub const SOURCE_KEY: &str = "jupiter";

/// Source id stamped on records, matching the upstream venue label.
const SOURCE_ID: &str = "jupiter-search";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchToken {
    id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    usd_price: Option<f64>,
    stats24h: Option<Stats>,
    mcap: Option<f64>,
    fdv: Option<f64>,
    liquidity: Option<f64>,
    first_pool: Option<FirstPool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    buy_volume: Option<f64>,
    sell_volume: Option<f64>,
    price_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FirstPool {
    id: Option<String>,
}

/// Jupiter search client.
pub struct JupiterSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    query: String,
}

impl JupiterSource {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, query: impl Into<String>) -> Self {
        Self {
            client,
            limiter,
            query: query.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}?query={}", BASE_URL, self.query)
    }
}

#[async_trait]
impl PriceSource for JupiterSource {
    fn key(&self) -> &str {
        SOURCE_KEY
    }

    async fn fetch(&self) -> Result<Vec<AssetRecord>, SourceError> {
        let tokens: Vec<SearchToken> =
            get_json_with_retry(&self.client, &self.limiter, SOURCE_KEY, &self.url()).await?;
        Ok(map_tokens(tokens, now_millis()))
    }
}

/// Normalize the wire response into raw asset records.
pub(crate) fn map_tokens(tokens: Vec<SearchToken>, observed_at: i64) -> Vec<AssetRecord> {
    tokens
        .into_iter()
        .map(|token| {
            let stats = token.stats24h.as_ref();
            let volume_24h = stats
                .map(|s| s.buy_volume.unwrap_or(0.0) + s.sell_volume.unwrap_or(0.0))
                .unwrap_or(0.0);
            AssetRecord {
                address: token.id,
                symbol: token.symbol,
                name: token.name,
                price_usd: token.usd_price.unwrap_or(0.0),
                price_native: 0.0,
                volume_24h,
                price_change_24h: stats.and_then(|s| s.price_change).unwrap_or(0.0),
                market_cap: token.mcap.or(token.fdv).unwrap_or(0.0),
                liquidity: token.liquidity.unwrap_or(0.0),
                source_id: SOURCE_ID.to_string(),
                venue_address: token
                    .first_pool
                    .and_then(|p| p.id)
                    .unwrap_or_default(),
                chain_id: "solana".to_string(),
                observed_at,
            }
        })
        .collect()
}
