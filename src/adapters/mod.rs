//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  KeyValueBackend │ ObjectBackend │ OriginFetcher           │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ RedisKeyValueBackend │ S3ObjectBackend │ HttpOriginFetcher │ │
//! │  │ InMemoryKeyValueBackend │ InMemoryObjectBackend            │ │
//! │  │ StaticOriginFetcher                                        │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use readthrough::adapters::{RedisKeyValueBackend, S3Config, S3ObjectBackend};
//! use readthrough::cache::{DurableStore, FastStore};
//!
//! let fast = FastStore::new(Arc::new(RedisKeyValueBackend::connect(url).await?));
//! let durable = DurableStore::new(Arc::new(S3ObjectBackend::from_env(&S3Config::default()).await));
//! ```

mod memory;
mod origin;
mod redis;
mod s3;

pub use self::memory::{InMemoryKeyValueBackend, InMemoryObjectBackend, StaticOriginFetcher};
pub use self::origin::{
    HttpOriginFetcher, OriginConfig, DEFAULT_ORIGIN_URL_TEMPLATE, QUERY_PLACEHOLDER,
};
pub use self::redis::RedisKeyValueBackend;
pub use self::s3::{BucketProvisioning, S3Config, S3ObjectBackend};
