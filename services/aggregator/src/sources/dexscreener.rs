//! DexScreener price source
//!
//! Queries `/latest/dex/tokens/{addresses}` for a fixed address list. Prices
//! arrive string-encoded; market cap falls back to fully-diluted value when
//! absent. Each pair becomes one raw record keyed by its base token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use types::asset::{now_millis, AssetRecord};

use crate::rate_limit::RateLimiter;

use super::{get_json_with_retry, PriceSource, SourceError};

const BASE_URL: &str = "https://api.dexscreener.com/latest/dex/tokens";

/// Rate-limit bucket for this source.
pub const SOURCE_KEY: &str = "dexscreener";

#[derive(Debug, Deserialize)]
pub(crate) struct TokensResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    chain_id: String,
    #[serde(default)]
    dex_id: String,
    #[serde(default)]
    pair_address: String,
    base_token: PairToken,
    price_usd: Option<String>,
    price_native: Option<String>,
    volume: Option<VolumeBlock>,
    price_change: Option<ChangeBlock>,
    liquidity: Option<LiquidityBlock>,
    market_cap: Option<f64>,
    fdv: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PairToken {
    #[serde(default)]
    address: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct VolumeBlock {
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChangeBlock {
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LiquidityBlock {
    usd: Option<f64>,
}

/// DexScreener client for a fixed token-address watch list.
pub struct DexScreenerSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    token_addresses: Vec<String>,
}

impl DexScreenerSource {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, token_addresses: Vec<String>) -> Self {
        Self {
            client,
            limiter,
            token_addresses,
        }
    }

    fn url(&self) -> String {
        format!("{}/{}", BASE_URL, self.token_addresses.join(","))
    }
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    fn key(&self) -> &str {
        SOURCE_KEY
    }

    async fn fetch(&self) -> Result<Vec<AssetRecord>, SourceError> {
        let response: TokensResponse =
            get_json_with_retry(&self.client, &self.limiter, SOURCE_KEY, &self.url()).await?;
        Ok(map_response(response, now_millis()))
    }
}

/// Normalize the wire response into raw asset records.
pub(crate) fn map_response(response: TokensResponse, observed_at: i64) -> Vec<AssetRecord> {
    response
        .pairs
        .unwrap_or_default()
        .into_iter()
        .map(|pair| AssetRecord {
            address: pair.base_token.address,
            symbol: pair.base_token.symbol,
            name: pair.base_token.name,
            price_usd: pair
                .price_usd
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0),
            price_native: pair
                .price_native
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0),
            volume_24h: pair.volume.and_then(|v| v.h24).unwrap_or(0.0),
            price_change_24h: pair.price_change.and_then(|c| c.h24).unwrap_or(0.0),
            market_cap: pair.market_cap.or(pair.fdv).unwrap_or(0.0),
            liquidity: pair.liquidity.and_then(|l| l.usd).unwrap_or(0.0),
            source_id: pair.dex_id,
            venue_address: pair.pair_address,
            chain_id: pair.chain_id,
            observed_at,
        })
        .collect()
}
