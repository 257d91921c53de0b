//! readthrough - Two-Tier Read-Through Cache
//!
//! A query service that answers from a fast key-value tier (Redis), falls
//! back to a durable object tier (S3), and only on a full miss asks the
//! origin (the Wikipedia parse API). Origin results are written back to both
//! tiers.
//!
//! # Architecture
//!
//! ```text
//! HTTP boundary → CacheResolver → Fast tier → Durable tier → Origin
//!                                    ▲             ▲            │
//!                                    └─────────────┴────────────┘
//!                                          write-back
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Backend adapters implementing domain ports
//! - [`cache`] - Tier stores, resolver and metrics
//! - [`domain`] - Value objects and port traits
//! - [`error`] - Error types
//! - [`server`] - HTTP boundary and health checks

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod server;

// Re-export commonly used types
pub use cache::{CacheResolver, Resolution, ResolverConfig, WriteBackMode};
pub use domain::{CacheEntry, Provenance, SearchQuery};
pub use error::{Error, Result};
