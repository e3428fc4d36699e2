use std::sync::Arc;

use crate::hub::SubscriptionHub;
use crate::metrics::ServiceMetrics;
use crate::service::TokenService;
use crate::store::Store;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TokenService>,
    pub hub: Arc<SubscriptionHub>,
    pub store: Arc<dyn Store>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(
        service: Arc<TokenService>,
        hub: Arc<SubscriptionHub>,
        store: Arc<dyn Store>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            service,
            hub,
            store,
            metrics,
        }
    }
}
