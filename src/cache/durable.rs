//! Durable Tier - Object Store
//!
//! Authoritative cache of record. Objects never expire; a body is the JSON
//! entry tagged `durable-tier`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::domain::{CacheEntry, ObjectBackend, StoreTier, TierStore};
use crate::error::{Error, Result};

/// Durable tier store over an object backend
pub struct DurableStore {
    backend: Arc<dyn ObjectBackend>,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl TierStore for DurableStore {
    fn tier(&self) -> StoreTier {
        StoreTier::Durable
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(body) = self.backend.get_object(key).await? else {
            return Ok(None);
        };

        CacheEntry::from_json(&body)
            .map(|entry| Some(entry.tagged(self.tier().provenance())))
            .map_err(|e| Error::CorruptEntry {
                tier: StoreTier::Durable,
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let body = entry.clone().tagged(self.tier().provenance()).to_json()?;
        self.backend.put_object(key, Bytes::from(body)).await?;
        debug!(key = %key, "durable tier write");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.backend.ping().await
    }
}
