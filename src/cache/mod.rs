//! Two-Tier Read-Through Cache
//!
//! A fast key-value tier and a durable object tier in front of an origin.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Cache Resolver                                   │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  Fast Tier (Redis)       │ Durable Tier (S3)        │ Origin (HTTP)      │
//! │  ┌────────────────────┐  │ ┌────────────────────┐   │ ┌──────────────┐   │
//! │  │ JSON string        │  │ │ JSON object body   │   │ │ GET template │   │
//! │  │ SETEX 3600s        │  │ │ no expiry          │   │ │ parse JSON   │   │
//! │  └────────────────────┘  │ └────────────────────┘   │ └──────────────┘   │
//! │           ▲              │           ▲              │        │           │
//! │           └──────────────┴───────────┴──────────────┴────────┘           │
//! │                          Write-back on origin hit                         │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - Strict sequential fallback, cheapest tier first
//! - A tier fault never blocks fallback to the next tier
//! - Stored provenance reflects the storage tier, not the retrieval tier

mod durable;
mod fast;
mod lookup;
mod metrics;
mod resolver;

pub use durable::DurableStore;
pub use fast::{FastStore, DEFAULT_FAST_TTL};
pub use lookup::TierLookup;
pub use metrics::{MetricsSnapshot, ResolverMetrics};
pub use resolver::{
    CacheResolver, Resolution, ResolverConfig, WriteBackMode, DEFAULT_NAMESPACE,
};

// =============================================================================
// Tests
// =============================================================================
