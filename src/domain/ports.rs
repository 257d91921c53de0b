//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! Value objects shared by every tier plus the traits the resolver depends
//! on. Infrastructure adapters implement the backend ports; the cache layer
//! builds the tier stores on top of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  TierStore │ OriginFetcher │ KeyValue │ Object      │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  RedisBackend │ S3Backend │ HttpOrigin │ InMemory   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// =============================================================================
// Value Objects
// =============================================================================

/// A query after normalization.
///
/// Whitespace is trimmed once, here. Both tier keys and the origin request
/// are derived from the same normalized value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Normalize a raw query, rejecting it when nothing is left.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuery(
                "query must not be empty or whitespace".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-tier keys for one logical entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    fast: String,
    durable: String,
}

impl CacheKey {
    /// Derive both namespaced forms from the same normalized query.
    ///
    /// Fast tier: `{namespace}:{query}`. Durable tier: `{namespace}-{query}`.
    pub fn derive(namespace: &str, query: &SearchQuery) -> Self {
        Self {
            fast: format!("{}:{}", namespace, query.as_str()),
            durable: format!("{}-{}", namespace, query.as_str()),
        }
    }

    /// Key addressed in the fast tier
    pub fn fast(&self) -> &str {
        &self.fast
    }

    /// Key addressed in the durable tier
    pub fn durable(&self) -> &str {
        &self.durable
    }

    /// Key for the given tier
    pub fn for_tier(&self, tier: StoreTier) -> &str {
        match tier {
            StoreTier::Fast => &self.fast,
            StoreTier::Durable => &self.durable,
        }
    }
}

/// Where a value was served from, or which tier it is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    FastTier,
    DurableTier,
    Origin,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::FastTier => "fast-tier",
            Provenance::DurableTier => "durable-tier",
            Provenance::Origin => "origin",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTier {
    /// Low-latency key-value tier with TTL
    Fast,
    /// Durable object store, no expiry
    Durable,
}

impl StoreTier {
    /// Provenance label written into entries stored in this tier.
    pub fn provenance(&self) -> Provenance {
        match self {
            StoreTier::Fast => Provenance::FastTier,
            StoreTier::Durable => Provenance::DurableTier,
        }
    }
}

impl std::fmt::Display for StoreTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreTier::Fast => write!(f, "fast"),
            StoreTier::Durable => write!(f, "durable"),
        }
    }
}

/// A resolved value: an opaque JSON record plus its provenance tag.
///
/// Serialized as the record object with an extra `source` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    record: Map<String, Value>,
    source: Provenance,
}

impl CacheEntry {
    /// Build an entry from a JSON document.
    ///
    /// The document must be an object. A `source` member it already carries
    /// is replaced by the provenance tag.
    pub fn from_record(document: Value, source: Provenance) -> Result<Self> {
        match document {
            Value::Object(mut record) => {
                record.remove("source");
                Ok(Self { record, source })
            }
            other => Err(Error::OriginParse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Same record, re-tagged.
    pub fn tagged(mut self, source: Provenance) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> Provenance {
        self.source
    }

    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    /// Encode for storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored payload.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Tier Store Port
// =============================================================================

/// Uniform get/put contract over one cache tier.
///
/// Implementations own their persisted data and their failure domain.
/// Errors returned here are tier faults: the resolver logs them and moves
/// on to the next tier.
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Which tier this store serves.
    fn tier(&self) -> StoreTier;

    /// Look up `key`. `Ok(None)` means absent, not failed.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store `entry` under `key`, re-tagged with this tier's provenance.
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    /// Check that the backing service answers.
    async fn health_check(&self) -> Result<()>;
}

// =============================================================================
// Origin Port
// =============================================================================

/// Port for the authoritative upstream source.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Fetch the record for `query`, tagged with `origin` provenance.
    async fn fetch(&self, query: &SearchQuery) -> Result<CacheEntry>;
}

// =============================================================================
// Backend Ports
// =============================================================================

/// Key-value service backing the fast tier (Redis wire contract).
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Read the string stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key` with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Check if the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Blob store backing the durable tier (S3 wire contract).
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Read the object body stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write an object, replacing any existing body.
    async fn put_object(&self, key: &str, body: Bytes) -> Result<()>;

    /// Check if the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
