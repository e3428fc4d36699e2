//! Key/value store and pub/sub boundary
//!
//! The cache persists snapshots through this seam and the hub receives
//! change events from it. Two backends: Redis (shared across processes) and
//! an in-process store used when no Redis URL is configured and in tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, warn};

/// Capacity of subscription delivery channels.
const CHANNEL_CAPACITY: usize = 64;

/// Errors from the store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// TTL-bounded key/value storage plus pub/sub fan-in.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl_seconds`.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError>;

    /// Fetch the value under `key`, or None when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Publish a message to a channel.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError>;

    /// Subscribe to a channel; messages arrive on the returned receiver
    /// until it is dropped.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, StoreError>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;
}

struct ValueEntry {
    value: String,
    expires_at: Instant,
}

/// In-process store: a TTL map plus broadcast channels.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, ValueEntry>>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let entry = ValueEntry {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.values.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        {
            let values = self.values.read().await;
            match values.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }
        // Expired: drop it so the map does not accumulate dead entries
        self.values.write().await.remove(key);
        Ok(None)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        if let Some(sender) = self.channels.read().await.get(channel) {
            // A send error only means no live subscribers
            let _ = sender.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, StoreError> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        let mut broadcast_rx = sender.subscribe();
        drop(channels);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Subscriber lagged — messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Redis-backed store.
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisStore {
    /// Open a client and establish a managed connection.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|err| StoreError::Connection(err.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        debug!(url, "Connected to Redis");
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(value)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .publish(channel, message)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "Dropping undecodable pub/sub payload");
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();
        let result: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get() {
        let store = MemoryStore::new();
        store.set("k", "v", 30).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryStore::new();
        store.set("k", "v1", 30).await.unwrap();
        store.set("k", "v2", 30).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_memory_store_ttl_expiry() {
        let store = MemoryStore::new();
        store.set("k", "v", 0).await.unwrap();
        // ttl 0 expires immediately
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_pub_sub_roundtrip() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("chan").await.unwrap();
        store.publish("chan", "hello").await.unwrap();
        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_memory_store_publish_without_subscribers() {
        let store = MemoryStore::new();
        // No subscriber registered; publish is a quiet no-op
        assert!(store.publish("chan", "ignored").await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_store_multiple_subscribers() {
        let store = MemoryStore::new();
        let mut rx1 = store.subscribe("chan").await.unwrap();
        let mut rx2 = store.subscribe("chan").await.unwrap();
        store.publish("chan", "fan-out").await.unwrap();
        assert_eq!(rx1.recv().await, Some("fan-out".to_string()));
        assert_eq!(rx2.recv().await, Some("fan-out".to_string()));
    }
}
