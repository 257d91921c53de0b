//! Error types for the read-through cache

use thiserror::Error;

use crate::domain::StoreTier;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving a lookup
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Query was empty after normalization
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // =========================================================================
    // Tier Faults (absorbed by the resolver, never surfaced)
    // =========================================================================
    /// Redis command or connection error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Object store request failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Tier backend unreachable
    #[error("{tier} tier unavailable: {reason}")]
    TierUnavailable { tier: StoreTier, reason: String },

    /// Stored payload could not be decoded
    #[error("Corrupt entry in {tier} tier under key {key}: {reason}")]
    CorruptEntry {
        tier: StoreTier,
        key: String,
        reason: String,
    },

    // =========================================================================
    // Origin Faults
    // =========================================================================
    /// Origin could not be reached
    #[error("Origin connection error: {0}")]
    OriginConnection(#[source] reqwest::Error),

    /// Origin answered with a non-success status
    #[error("Origin returned status {status} for {url}")]
    OriginStatus { status: u16, url: String },

    /// Origin body was not a usable JSON document
    #[error("Failed to parse origin response: {0}")]
    OriginParse(String),

    /// Origin answered with an error document instead of a record
    #[error("Origin reported an error: {0}")]
    OriginRejected(String),

    /// Every tier missed and the origin failed
    #[error("Could not resolve query {query}: {source}")]
    Unresolvable {
        query: String,
        #[source]
        source: Box<Error>,
    },

    /// Resolution was cancelled by the caller
    #[error("Resolution cancelled for query: {query}")]
    Cancelled { query: String },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for faults that belong to a single cache tier.
    ///
    /// The resolver still downgrades any other store error to a miss but
    /// logs it as unexpected.
    pub fn is_tier_fault(&self) -> bool {
        matches!(
            self,
            Error::Redis(_)
                | Error::ObjectStore(_)
                | Error::TierUnavailable { .. }
                | Error::CorruptEntry { .. }
        )
    }

    /// Short label used for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidQuery(_) => "invalid_query",
            Error::Unresolvable { .. } => "unresolvable",
            Error::Cancelled { .. } => "cancelled",
            _ => "internal",
        }
    }
}
