//! Health Checks
//!
//! Liveness and readiness. Readiness also pings both tier backends; a tier
//! that is down degrades the service but does not stop it, since lookups
//! fall through to the next tier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheResolver;
use crate::domain::StoreTier;
use crate::error::Result;

/// Health status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    /// A tier is down; requests are still served
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Healthy or degraded
    pub fn is_operational(&self) -> bool {
        *self != HealthStatus::Unhealthy
    }
}

/// One line of a readiness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl HealthCheckResult {
    fn flag(ready: bool) -> Self {
        Self {
            name: "readiness".to_string(),
            status: if ready {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            message: (!ready).then(|| "Service not ready".to_string()),
            duration_ms: 0,
        }
    }

    fn tier(tier: StoreTier, ping: Result<()>, elapsed: Duration) -> Self {
        let (status, message) = match ping {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Degraded, Some(e.to_string())),
        };
        Self {
            name: format!("{}-tier", tier),
            status,
            message,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across all checks
    pub status: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    pub version: String,
    pub uptime_seconds: u64,
    pub checked_at: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(checks: Vec<HealthCheckResult>, uptime: Duration) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            checks,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime.as_secs(),
            checked_at: Utc::now(),
        }
    }
}

/// Process-wide liveness and readiness flags
#[derive(Debug)]
pub struct HealthCheck {
    start_time: Instant,
    live: AtomicBool,
    ready: AtomicBool,
}

impl HealthCheck {
    /// Live but not yet ready
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Cleared once shutdown starts.
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Relaxed);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    /// Readiness flag plus a ping of each tier
    pub async fn readiness_report(&self, resolver: &CacheResolver) -> HealthResponse {
        let mut checks = vec![HealthCheckResult::flag(self.is_ready())];

        let started = Instant::now();
        for (tier, ping) in resolver.tier_health().await {
            checks.push(HealthCheckResult::tier(tier, ping, started.elapsed()));
        }

        HealthResponse::new(checks, self.start_time.elapsed())
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
