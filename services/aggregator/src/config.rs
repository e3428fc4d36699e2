//! Environment-driven service configuration
//!
//! Every knob has a default so the service runs with no environment at all;
//! unparsable values fall back to the default rather than aborting startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the aggregation service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Snapshot time-to-live.
    pub cache_ttl: Duration,
    /// Interval between scheduled refresh cycles.
    pub refresh_interval: Duration,
    /// Per-request timeout for upstream fetches.
    pub fetch_timeout: Duration,
    /// Sliding-window quota for the DexScreener source.
    pub dexscreener_rate_limit: usize,
    /// Sliding-window quota for the Jupiter source.
    pub jupiter_rate_limit: usize,
    /// Sliding-window length shared by all sources.
    pub rate_limit_window: Duration,
    /// Redis connection URL; absent selects the in-process store.
    pub redis_url: Option<String>,
    /// Token addresses the DexScreener fetch is keyed on.
    pub token_addresses: Vec<String>,
    /// Search query driving the Jupiter source.
    pub jupiter_query: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cache_ttl: Duration::from_secs(30),
            refresh_interval: Duration::from_millis(5000),
            fetch_timeout: Duration::from_secs(10),
            dexscreener_rate_limit: 300,
            jupiter_rate_limit: 200,
            rate_limit_window: Duration::from_millis(60_000),
            redis_url: None,
            token_addresses: vec![
                "G1DXVVmqJs8Ei79QbK41dpgk2WtXSGqLtx9of7o8BAGS".to_string(),
                "So11111111111111111111111111111111111111112".to_string(),
            ],
            jupiter_query: "SOL".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let token_addresses = env::var("TOKEN_ADDRESSES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.token_addresses);

        Self {
            port: env_parse("PORT", defaults.port),
            cache_ttl: Duration::from_secs(env_parse(
                "CACHE_TTL_SECONDS",
                defaults.cache_ttl.as_secs(),
            )),
            refresh_interval: Duration::from_millis(env_parse(
                "REFRESH_INTERVAL_MS",
                defaults.refresh_interval.as_millis() as u64,
            )),
            fetch_timeout: Duration::from_secs(env_parse(
                "FETCH_TIMEOUT_SECONDS",
                defaults.fetch_timeout.as_secs(),
            )),
            dexscreener_rate_limit: env_parse(
                "DEXSCREENER_RATE_LIMIT",
                defaults.dexscreener_rate_limit,
            ),
            jupiter_rate_limit: env_parse("JUPITER_RATE_LIMIT", defaults.jupiter_rate_limit),
            rate_limit_window: Duration::from_millis(env_parse(
                "RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window.as_millis() as u64,
            )),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            token_addresses,
            jupiter_query: env::var("JUPITER_QUERY").unwrap_or(defaults.jupiter_query),
        }
    }
}

/// Parse an environment variable, returning `default` when unset or invalid.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
