//! Domain Layer
//!
//! Value objects and port traits for the tiered lookup cache.
//!
//! # Architecture
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for tiers, origin and backends
//! - **Proptest** (`proptest.rs`) - Property tests for query normalization
//!
//! # Usage
//!
//! ```ignore
//! use readthrough::domain::{CacheKey, SearchQuery, TierStore};
//!
//! async fn peek<S: TierStore>(store: &S, raw: &str) -> Result<bool> {
//!     let query = SearchQuery::parse(raw)?;
//!     let key = CacheKey::derive("wikipedia", &query);
//!     Ok(store.get(key.for_tier(store.tier())).await?.is_some())
//! }
//! ```

pub mod ports;
mod proptest;

pub use ports::{
    // Value objects
    CacheEntry,
    CacheKey,
    // Port traits
    KeyValueBackend,
    ObjectBackend,
    OriginFetcher,
    Provenance,
    SearchQuery,
    StoreTier,
    TierStore,
};
