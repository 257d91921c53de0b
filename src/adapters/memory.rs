//! In-Memory Adapters
//!
//! Backends and an origin that live entirely in process memory. Used by the
//! test suites and for running the service without Redis or S3. Each one
//! counts its calls and can be switched into a failing state to simulate an
//! outage.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::domain::{
    CacheEntry, KeyValueBackend, ObjectBackend, OriginFetcher, Provenance, SearchQuery,
    StoreTier,
};
use crate::error::{Error, Result};

fn unavailable(tier: StoreTier) -> Error {
    Error::TierUnavailable {
        tier,
        reason: "in-memory backend marked unavailable".to_string(),
    }
}

// =============================================================================
// Key-Value Backend
// =============================================================================

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    ttl: Option<Duration>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory key-value backend with per-key expiry
#[derive(Debug, Default)]
pub struct InMemoryKeyValueBackend {
    storage: DashMap<String, StoredValue>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
    gets: AtomicU64,
    sets: AtomicU64,
}

impl InMemoryKeyValueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation, as if the service were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Fail writes only
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Store a raw payload without expiry, bypassing the codec
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.storage.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                ttl: None,
                expires_at: None,
            },
        );
    }

    /// Raw payload under `key`, if present and not expired
    pub fn raw(&self, key: &str) -> Option<String> {
        self.storage
            .get(key)
            .filter(|stored| !stored.is_expired())
            .map(|stored| stored.value.clone())
    }

    /// TTL the key was last written with
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.storage.get(key).and_then(|stored| stored.ttl)
    }

    /// Number of `get` calls served
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `set_ex` calls served
    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.storage.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryKeyValueBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(unavailable(StoreTier::Fast));
        }

        if let Some(stored) = self.storage.get(key) {
            if !stored.is_expired() {
                return Ok(Some(stored.value.clone()));
            }
        }
        // Expired entries are dropped lazily
        self.storage.remove_if(key, |_, stored| stored.is_expired());
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) || self.fail_writes.load(Ordering::Relaxed) {
            return Err(unavailable(StoreTier::Fast));
        }

        self.storage.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                ttl: Some(ttl),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(unavailable(StoreTier::Fast));
        }
        Ok(())
    }
}

// =============================================================================
// Object Backend
// =============================================================================

/// In-memory object backend
#[derive(Debug, Default)]
pub struct InMemoryObjectBackend {
    objects: DashMap<String, Bytes>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
    gets: AtomicU64,
    puts: AtomicU64,
}

impl InMemoryObjectBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation, as if the service were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Fail writes only
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Store a raw body, bypassing the codec
    pub fn insert_raw(&self, key: &str, body: Bytes) {
        self.objects.insert(key.to_string(), body);
    }

    /// Raw body under `key`
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|body| body.clone())
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectBackend for InMemoryObjectBackend {
    async fn get_object(&self, key: &str) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(unavailable(StoreTier::Durable));
        }
        Ok(self.raw(key))
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) || self.fail_writes.load(Ordering::Relaxed) {
            return Err(unavailable(StoreTier::Durable));
        }
        self.objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(unavailable(StoreTier::Durable));
        }
        Ok(())
    }
}

// =============================================================================
// Origin
// =============================================================================

/// Origin serving canned records keyed by normalized query
#[derive(Debug, Default)]
pub struct StaticOriginFetcher {
    records: DashMap<String, Value>,
    fetched: RwLock<Vec<String>>,
    failing: AtomicBool,
    delay: RwLock<Duration>,
}

impl StaticOriginFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `record` for `query`
    pub fn insert(&self, query: &str, record: Value) {
        self.records.insert(query.to_string(), record);
    }

    /// Fail every fetch with a 503
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Wait this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = delay;
    }

    /// Number of fetches issued
    pub fn calls(&self) -> usize {
        self.fetched.read().len()
    }

    /// Queries fetched, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.read().clone()
    }
}

#[async_trait]
impl OriginFetcher for StaticOriginFetcher {
    async fn fetch(&self, query: &SearchQuery) -> Result<CacheEntry> {
        self.fetched.write().push(query.to_string());

        let delay = *self.delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let url = format!("memory://origin/{}", query);
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::OriginStatus { status: 503, url });
        }

        let record = self
            .records
            .get(query.as_str())
            .map(|record| record.clone())
            .ok_or(Error::OriginStatus { status: 404, url })?;

        CacheEntry::from_record(record, Provenance::Origin)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[tokio::test]
    async fn test_kv_set_get() {
        let kv = InMemoryKeyValueBackend::new();
        kv.set_ex("a", "1", Duration::from_secs(60)).await.unwrap();

        assert_eq!(kv.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(kv.ttl_of("a"), Some(Duration::from_secs(60)));
        assert_eq!(kv.gets(), 1);
        assert_eq!(kv.sets(), 1);
    }

    #[tokio::test]
    async fn test_kv_expiry() {
        let kv = InMemoryKeyValueBackend::new();
        kv.set_ex("a", "1", Duration::from_millis(20)).await.unwrap();
        assert_eq!(kv.len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(kv.get("a").await.unwrap(), None);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_kv_unavailable() {
        let kv = InMemoryKeyValueBackend::new();
        kv.set_unavailable(true);

        assert_matches!(
            kv.get("a").await,
            Err(Error::TierUnavailable { tier: StoreTier::Fast, .. })
        );
        assert!(kv.ping().await.is_err());

        kv.set_unavailable(false);
        assert!(kv.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_kv_fail_writes_keeps_reads() {
        let kv = InMemoryKeyValueBackend::new();
        kv.insert_raw("a", "1");
        kv.set_fail_writes(true);

        assert!(kv.set_ex("b", "2", Duration::from_secs(1)).await.is_err());
        assert_eq!(kv.get("a").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_objects_put_get() {
        let objects = InMemoryObjectBackend::new();
        objects
            .put_object("k", Bytes::from_static(b"body"))
            .await
            .unwrap();

        assert_eq!(objects.get_object("k").await.unwrap().unwrap().as_ref(), b"body");
        assert!(objects.get_object("missing").await.unwrap().is_none());
        assert_eq!(objects.puts(), 1);
        assert_eq!(objects.gets(), 2);
    }

    #[tokio::test]
    async fn test_static_origin() {
        let origin = StaticOriginFetcher::new();
        origin.insert("Rust", json!({"title": "Rust"}));

        let query = SearchQuery::parse("Rust").unwrap();
        let entry = origin.fetch(&query).await.unwrap();
        assert_eq!(entry.source(), Provenance::Origin);

        let missing = SearchQuery::parse("Go").unwrap();
        assert_matches!(
            origin.fetch(&missing).await,
            Err(Error::OriginStatus { status: 404, .. })
        );

        origin.set_failing(true);
        assert_matches!(
            origin.fetch(&query).await,
            Err(Error::OriginStatus { status: 503, .. })
        );
        assert_eq!(origin.fetched(), vec!["Rust", "Go", "Rust"]);
    }
}
