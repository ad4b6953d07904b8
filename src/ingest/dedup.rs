// src/ingest/dedup.rs
//! Expiring "already delivered" markers keyed by an update's content fingerprint.
//!
//! The store is shared by every job (and every worker pointing at the same
//! Redis). There is no locking: keys are derived from content, so two writers
//! racing on the same key both write the same marker.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use redis::{aio::ConnectionManager, AsyncCommands};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::ingest::types::Update;

/// Spans several one-minute polling cycles, so overlapping windows still
/// recognise what was already sent.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const KEY_PREFIX: &str = "update_";

/// Minimal key-value surface the dedup cache needs.
#[async_trait::async_trait]
pub trait DedupStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<()>;
}

/// Hex SHA-256 over the update's full serialized field set (date included).
pub fn fingerprint(update: &Update) -> Result<String> {
    let json = serde_json::to_vec(update).context("serializing update for fingerprint")?;
    let digest = Sha256::digest(&json);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}

pub fn key_for(update: &Update) -> Result<String> {
    Ok(format!("{KEY_PREFIX}{}", fingerprint(update)?))
}

#[derive(Clone)]
pub struct DedupCache {
    store: Arc<dyn DedupStore>,
    ttl: Duration,
}

impl fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupCache").field("ttl", &self.ttl).finish()
    }
}

impl DedupCache {
    pub fn new(store: Arc<dyn DedupStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn has(&self, update: &Update) -> Result<bool> {
        self.store.exists(&key_for(update)?).await
    }

    pub async fn register(&self, update: &Update) -> Result<()> {
        self.store.set_with_ttl(&key_for(update)?, self.ttl).await
    }
}

/// Redis-backed store; what production workers share.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis dedup store at {}", redis_url);
        let client = redis::Client::open(redis_url).context("creating redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connecting to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl DedupStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let hit: bool = conn.exists(key).await.context("redis EXISTS")?;
        debug!(key, hit, "dedup lookup");
        Ok(hit)
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, "1", ttl.as_secs().max(1))
            .await
            .context("redis SETEX")?;
        debug!(key, ttl_secs = ttl.as_secs(), "dedup marker stored");
        Ok(())
    }
}

/// Process-local store with lazy expiry. Suitable for a single worker and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, expires_at| *expires_at > now);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DedupStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(expires_at) if *expires_at > now => Ok(true),
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{IncidentReference, UpdateStatus};
    use chrono::{TimeZone, Utc};

    fn update(title: &str, year: i32) -> Update {
        Update {
            title: title.into(),
            description: "desc".into(),
            link: "https://example.test/i/1".into(),
            date: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
            service_key: "svc".into(),
            service_name: "Service".into(),
            status: UpdateStatus::Active,
            incident_reference: IncidentReference::Absent,
            components: None,
        }
    }

    #[test]
    fn fingerprint_is_content_based() {
        let fp = |t: &str, y: i32| fingerprint(&update(t, y)).unwrap();
        assert_eq!(fp("a", 2021), fp("a", 2021));
        assert_ne!(fp("a", 2021), fp("b", 2021));
        assert_ne!(fp("a", 2010), fp("a", 2020));
    }

    #[test]
    fn key_has_prefix_and_hex_digest() {
        let k = key_for(&update("a", 2021)).unwrap();
        assert!(k.starts_with("update_"));
        assert_eq!(k.len(), "update_".len() + 64);
    }

    #[tokio::test]
    async fn register_writes_the_marker_under_key_for() {
        let store = Arc::new(MemoryStore::new());
        let cache = DedupCache::new(store.clone());
        let a = update("title", 2021);

        cache.register(&a).await.unwrap();
        assert!(store.exists(&key_for(&a).unwrap()).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn registered_update_is_seen_others_are_not() {
        let cache = DedupCache::new(Arc::new(MemoryStore::new()));
        let a = update("title", 2021);
        let other = update("other", 2021);

        assert!(!cache.has(&a).await.unwrap());
        cache.register(&a).await.unwrap();
        assert!(cache.has(&a).await.unwrap());
        assert!(!cache.has(&other).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn markers_expire_after_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = DedupCache::new(store.clone()).with_ttl(Duration::from_secs(300));
        let a = update("title", 2021);

        cache.register(&a).await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.has(&a).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.has(&a).await.unwrap());
        assert!(store.is_empty());
    }
}
