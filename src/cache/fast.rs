//! Fast Tier - Key-Value Store with TTL
//!
//! Entries are JSON strings written with a fixed expiry. A payload that does
//! not decode is reported as a corrupt entry; the resolver treats it the
//! same as a miss.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{CacheEntry, KeyValueBackend, StoreTier, TierStore};
use crate::error::{Error, Result};

/// Default expiry for fast-tier entries (1 hour)
pub const DEFAULT_FAST_TTL: Duration = Duration::from_secs(3600);

/// Fast tier store over a key-value backend
pub struct FastStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl FastStore {
    /// Create a fast store with the default TTL
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_ttl(backend, DEFAULT_FAST_TTL)
    }

    /// Create a fast store with a custom TTL
    pub fn with_ttl(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Expiry applied on every put
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for FastStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastStore").field("ttl", &self.ttl).finish()
    }
}

#[async_trait]
impl TierStore for FastStore {
    fn tier(&self) -> StoreTier {
        StoreTier::Fast
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(payload) = self.backend.get(key).await? else {
            return Ok(None);
        };

        CacheEntry::from_json(payload.as_bytes())
            .map(|entry| Some(entry.tagged(self.tier().provenance())))
            .map_err(|e| Error::CorruptEntry {
                tier: StoreTier::Fast,
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let payload = entry.clone().tagged(self.tier().provenance()).to_json()?;
        self.backend.set_ex(key, &payload, self.ttl).await?;
        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "fast tier write");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.backend.ping().await
    }
}
