use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use aggregator::cache::SnapshotCache;
use aggregator::config::ServiceConfig;
use aggregator::hub::SubscriptionHub;
use aggregator::metrics::ServiceMetrics;
use aggregator::rate_limit::RateLimiter;
use aggregator::router::create_router;
use aggregator::scheduler::RefreshScheduler;
use aggregator::service::TokenService;
use aggregator::sources::{
    dexscreener, jupiter, DexScreenerSource, JupiterSource, PriceSource, SourceRegistry,
};
use aggregator::state::AppState;
use aggregator::store::{MemoryStore, RedisStore, Store};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::from_env();
    info!(
        port = config.port,
        refresh_interval_ms = config.refresh_interval.as_millis() as u64,
        cache_ttl_s = config.cache_ttl.as_secs(),
        "Starting token aggregation service"
    );

    let store: Arc<dyn Store> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            info!("No REDIS_URL configured — using in-process store");
            Arc::new(MemoryStore::new())
        }
    };

    let metrics = Arc::new(ServiceMetrics::new());
    let limiter = Arc::new(
        RateLimiter::new(config.rate_limit_window, config.dexscreener_rate_limit)
            .with_quota(dexscreener::SOURCE_KEY, config.dexscreener_rate_limit)
            .with_quota(jupiter::SOURCE_KEY, config.jupiter_rate_limit),
    );
    let client = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .user_agent("token-aggregator/0.1")
        .build()?;

    let sources: Vec<Arc<dyn PriceSource>> = vec![
        Arc::new(DexScreenerSource::new(
            client.clone(),
            Arc::clone(&limiter),
            config.token_addresses.clone(),
        )),
        Arc::new(JupiterSource::new(
            client,
            Arc::clone(&limiter),
            config.jupiter_query.clone(),
        )),
    ];
    let registry = Arc::new(SourceRegistry::new(sources, Arc::clone(&metrics)));
    let cache = Arc::new(SnapshotCache::new(
        Arc::clone(&store),
        config.cache_ttl,
        Arc::clone(&metrics),
    ));
    let service = Arc::new(TokenService::new(cache, registry, Arc::clone(&metrics)));
    let hub = Arc::new(SubscriptionHub::new(
        Arc::clone(&service),
        Arc::clone(&metrics),
    ));

    // Change events flow store → hub → every live session
    let update_listener = hub.start_update_listener(Arc::clone(&store));
    let scheduler = RefreshScheduler::start(Arc::clone(&service), config.refresh_interval);

    let state = AppState::new(service, Arc::clone(&hub), store, metrics);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the refresh loop and close live sessions before exiting
    scheduler.stop().await;
    update_listener.abort();
    hub.close_all();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
