//! Periodic refresh driver
//!
//! A cancellable repeating task that runs one refresh cycle per tick,
//! started at service startup and stopped at shutdown. Ticks are
//! single-flight: a tick landing while a cycle is still running is skipped
//! rather than overlapping duplicate upstream work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::service::TokenService;

/// Handle to the running refresh loop.
pub struct RefreshScheduler {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl RefreshScheduler {
    /// Spawn the repeating refresh task. The first tick fires immediately,
    /// warming the cache at startup.
    pub fn start(service: Arc<TokenService>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let in_flight = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                period_ms = period.as_millis() as u64,
                "Refresh scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Single-flight guard: a slow fetch plus a short
                        // interval must not stack concurrent cycles.
                        if in_flight.swap(true, Ordering::AcqRel) {
                            debug!("Previous refresh still in flight — skipping tick");
                            continue;
                        }
                        let service = Arc::clone(&service);
                        let in_flight = Arc::clone(&in_flight);
                        tokio::spawn(async move {
                            let outcome = service.refresh().await;
                            debug!(?outcome, "Scheduled refresh finished");
                            in_flight.store(false, Ordering::Release);
                        });
                    }
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Refresh scheduler stopped");
        });

        Self { handle, shutdown }
    }

    /// Stop the repeating task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
