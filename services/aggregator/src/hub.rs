//! WebSocket subscription hub
//!
//! Owns the set of live client sessions and mediates between cache change
//! events and per-session delivery. Each session keeps independent
//! filter/sort/pagination preferences; change events go to every session as
//! an undifferentiated `full-update`; clients re-derive their own filtered
//! view, keeping server-side work per event constant.
//!
//! Protocol (client → server): `subscribe` replaces the full preference
//! state, `update-filters` shallow-merges provided fields, `ping` checks
//! liveness. Anything else gets a session-scoped `error` and the session
//! stays connected.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use types::asset::{AssetRecord, Snapshot};
use types::ids::SessionId;
use types::query::{
    FilterOptions, Page, PaginationOptions, PaginationUpdate, SortOptions, SortUpdate,
};

use crate::cache::{UpdateMessage, UPDATES_CHANNEL};
use crate::metrics::ServiceMetrics;
use crate::service::TokenService;
use crate::store::Store;

/// Bounded per-session outbox; a full outbox drops broadcasts rather than
/// blocking the publisher.
pub const SESSION_OUTBOX_CAPACITY: usize = 64;

/// One session's mutable preference state.
#[derive(Debug, Clone, Default)]
pub struct SessionPrefs {
    pub filters: FilterOptions,
    pub sort: SortOptions,
    pub pagination: PaginationOptions,
}

struct Session {
    prefs: Mutex<SessionPrefs>,
    outbox: mpsc::Sender<String>,
}

/// Messages a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Replace the session's full preference state.
    Subscribe {
        #[serde(default)]
        filters: FilterOptions,
        #[serde(default)]
        sort: SortOptions,
        #[serde(default)]
        pagination: PaginationOptions,
    },
    /// Shallow-merge provided fields over the existing state.
    UpdateFilters {
        #[serde(default)]
        filters: Option<FilterOptions>,
        #[serde(default)]
        sort: Option<SortUpdate>,
        #[serde(default)]
        pagination: Option<PaginationUpdate>,
    },
    /// Liveness check, no state change.
    Ping,
}

/// Messages the server pushes to a session.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The session's current view of the dataset.
    Data { data: Page<AssetRecord> },
    Pong,
    Error { message: String },
    /// A cache change event; every session receives the raw new snapshot.
    FullUpdate { data: Snapshot, timestamp: i64 },
    /// Non-snapshot events (price point updates) forwarded as-is.
    Update { data: UpdateMessage },
}

const KNOWN_KINDS: [&str; 3] = ["subscribe", "update-filters", "ping"];

/// The set of live sessions plus the shared data service.
pub struct SubscriptionHub {
    sessions: DashMap<SessionId, Arc<Session>>,
    service: Arc<TokenService>,
    metrics: Arc<ServiceMetrics>,
}

impl SubscriptionHub {
    pub fn new(service: Arc<TokenService>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            service,
            metrics,
        }
    }

    /// Register a new session around its outbound channel.
    pub fn connect(&self, outbox: mpsc::Sender<String>) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(
            id,
            Arc::new(Session {
                prefs: Mutex::new(SessionPrefs::default()),
                outbox,
            }),
        );
        self.metrics
            .set_connected_sessions(self.sessions.len() as u64);
        info!(session = %id, "Session connected");
        id
    }

    /// Remove a session; no further delivery is attempted.
    pub fn disconnect(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            self.metrics
                .set_connected_sessions(self.sessions.len() as u64);
            info!(session = %id, "Session disconnected");
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Push the immediate `data` message a session receives on connect,
    /// computed with its (default) preferences.
    pub async fn send_initial_data(&self, id: &SessionId) {
        if let Some(session) = self.get(id) {
            self.send_current_view(&session).await;
        }
    }

    /// Process one inbound message for a session, in arrival order.
    pub async fn handle_message(&self, id: &SessionId, raw: &str) {
        let Some(session) = self.get(id) else {
            return;
        };

        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                debug!(session = %id, error = %err, "Unparsable client message");
                self.send(
                    &session,
                    &ServerMessage::Error {
                        message: "Invalid message format".to_string(),
                    },
                )
                .await;
                return;
            }
        };

        match serde_json::from_value::<ClientMessage>(value.clone()) {
            Ok(message) => self.apply(&session, message).await,
            Err(err) => {
                let kind = value
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                debug!(session = %id, kind, error = %err, "Rejected client message");
                let message = if KNOWN_KINDS.contains(&kind) {
                    "Invalid message format".to_string()
                } else {
                    format!("Unknown message type: {}", kind)
                };
                self.send(&session, &ServerMessage::Error { message }).await;
            }
        }
    }

    async fn apply(&self, session: &Arc<Session>, message: ClientMessage) {
        match message {
            ClientMessage::Subscribe {
                filters,
                sort,
                pagination,
            } => {
                {
                    let mut prefs = session.prefs.lock().await;
                    *prefs = SessionPrefs {
                        filters,
                        sort,
                        pagination,
                    };
                }
                self.send_current_view(session).await;
            }
            ClientMessage::UpdateFilters {
                filters,
                sort,
                pagination,
            } => {
                {
                    let mut prefs = session.prefs.lock().await;
                    if let Some(patch) = filters {
                        prefs.filters.merge(patch);
                    }
                    if let Some(patch) = sort {
                        prefs.sort.apply(patch);
                    }
                    if let Some(patch) = pagination {
                        prefs.pagination.apply(patch);
                    }
                }
                self.send_current_view(session).await;
            }
            ClientMessage::Ping => {
                self.send(session, &ServerMessage::Pong).await;
            }
        }
    }

    /// Fan a cache change event out to every live session.
    ///
    /// The session set is captured once at event time; sessions joining or
    /// leaving afterwards are unaffected by this broadcast.
    pub async fn dispatch_update(&self, update: UpdateMessage) {
        let message = match update {
            UpdateMessage::FullUpdate { data, timestamp } => {
                ServerMessage::FullUpdate { data, timestamp }
            }
            other => ServerMessage::Update { data: other },
        };
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "Failed to serialize broadcast message");
                return;
            }
        };

        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for session in sessions {
            match session.outbox.try_send(json.clone()) {
                Ok(()) => self.metrics.record_broadcast(),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.metrics.record_broadcast_drop();
                    warn!("Session outbox full — dropping broadcast for lagging client");
                }
                // Closed outbox means the socket task is tearing down; the
                // disconnect path removes the session.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Bridge the store's update channel into broadcasts.
    pub fn start_update_listener(self: &Arc<Self>, store: Arc<dyn Store>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut updates = match store.subscribe(UPDATES_CHANNEL).await {
                Ok(updates) => updates,
                Err(err) => {
                    error!(error = %err, "Failed to subscribe to update channel");
                    return;
                }
            };
            while let Some(raw) = updates.recv().await {
                match serde_json::from_str::<UpdateMessage>(&raw) {
                    Ok(update) => hub.dispatch_update(update).await,
                    Err(err) => {
                        warn!(error = %err, "Ignoring undecodable update message");
                    }
                }
            }
        })
    }

    /// Drop every session, e.g. at shutdown.
    pub fn close_all(&self) {
        self.sessions.clear();
        self.metrics.set_connected_sessions(0);
    }

    fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    async fn send_current_view(&self, session: &Arc<Session>) {
        let prefs = session.prefs.lock().await.clone();
        let page = self
            .service
            .get_tokens(&prefs.filters, &prefs.sort, &prefs.pagination)
            .await;
        self.send(session, &ServerMessage::Data { data: page }).await;
    }

    async fn send(&self, session: &Arc<Session>, message: &ServerMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "Failed to serialize server message");
                return;
            }
        };
        if session.outbox.send(json).await.is_err() {
            debug!("Session outbox closed during send");
        }
    }
}
