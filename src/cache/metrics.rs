//! Resolver Metrics Collection
//!
//! Prometheus counters and histograms for every resolution stage. Each
//! `ResolverMetrics` owns its registry so independent resolvers (and tests)
//! never collide on metric names.
//!
//! Every known counter series is created at zero on construction, so the
//! exposition does not change shape when a snapshot reads them.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::{Provenance, StoreTier};
use crate::error::Result;

/// Latency buckets in seconds, from a sub-millisecond fast hit to a slow origin.
const DURATION_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const TIERS: [StoreTier; 2] = [StoreTier::Fast, StoreTier::Durable];
const SOURCES: [Provenance; 3] = [
    Provenance::FastTier,
    Provenance::DurableTier,
    Provenance::Origin,
];
const LOOKUP_OUTCOMES: &[&str] = &["hit", "miss", "fault"];
const WRITE_BACK_OUTCOMES: &[&str] = &["ok", "failed"];
const FAILURE_REASONS: &[&str] = &["invalid_query", "unresolvable", "cancelled", "internal"];

/// Resolver metrics collector
#[derive(Clone)]
pub struct ResolverMetrics {
    registry: Registry,
    tier_lookups: IntCounterVec,
    resolutions: IntCounterVec,
    failures: IntCounterVec,
    write_backs: IntCounterVec,
    resolve_duration: HistogramVec,
}

impl ResolverMetrics {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create a collector registered into `registry`
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let tier_lookups = IntCounterVec::new(
            Opts::new(
                "readthrough_tier_lookups_total",
                "Tier lookups by tier and outcome",
            ),
            &["tier", "outcome"],
        )?;
        let resolutions = IntCounterVec::new(
            Opts::new(
                "readthrough_resolutions_total",
                "Successful resolutions by source",
            ),
            &["source"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new(
                "readthrough_resolution_failures_total",
                "Failed resolutions by reason",
            ),
            &["reason"],
        )?;
        let write_backs = IntCounterVec::new(
            Opts::new(
                "readthrough_write_backs_total",
                "Write-backs by tier and outcome",
            ),
            &["tier", "outcome"],
        )?;
        let resolve_duration = HistogramVec::new(
            HistogramOpts::new(
                "readthrough_resolve_duration_seconds",
                "Resolution latency by source",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["source"],
        )?;

        registry.register(Box::new(tier_lookups.clone()))?;
        registry.register(Box::new(resolutions.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(write_backs.clone()))?;
        registry.register(Box::new(resolve_duration.clone()))?;

        for tier in TIERS {
            let tier = tier.to_string();
            for outcome in LOOKUP_OUTCOMES {
                tier_lookups.with_label_values(&[tier.as_str(), *outcome]);
            }
            for outcome in WRITE_BACK_OUTCOMES {
                write_backs.with_label_values(&[tier.as_str(), *outcome]);
            }
        }
        for source in SOURCES {
            resolutions.with_label_values(&[source.as_str()]);
        }
        for reason in FAILURE_REASONS {
            failures.with_label_values(&[*reason]);
        }

        Ok(Self {
            registry,
            tier_lookups,
            resolutions,
            failures,
            write_backs,
            resolve_duration,
        })
    }

    pub fn record_lookup(&self, tier: StoreTier, outcome: &str) {
        self.tier_lookups
            .with_label_values(&[tier.to_string().as_str(), outcome])
            .inc();
    }

    pub fn record_resolution(&self, source: Provenance, latency: Duration) {
        self.resolutions.with_label_values(&[source.as_str()]).inc();
        self.resolve_duration
            .with_label_values(&[source.as_str()])
            .observe(latency.as_secs_f64());
    }

    pub fn record_failure(&self, reason: &str) {
        self.failures.with_label_values(&[reason]).inc();
    }

    pub fn record_write_back(&self, tier: StoreTier, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.write_backs
            .with_label_values(&[tier.to_string().as_str(), outcome])
            .inc();
    }

    /// Registry backing these metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format.
    ///
    /// Returns the content type alongside the body.
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }

    /// Get a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let lookup = |tier: StoreTier, outcome: &str| {
            self.tier_lookups
                .with_label_values(&[tier.to_string().as_str(), outcome])
                .get()
        };
        let write_back = |tier: StoreTier, outcome: &str| {
            self.write_backs
                .with_label_values(&[tier.to_string().as_str(), outcome])
                .get()
        };

        MetricsSnapshot {
            fast_hits: lookup(StoreTier::Fast, "hit"),
            fast_misses: lookup(StoreTier::Fast, "miss"),
            fast_faults: lookup(StoreTier::Fast, "fault"),
            durable_hits: lookup(StoreTier::Durable, "hit"),
            durable_misses: lookup(StoreTier::Durable, "miss"),
            durable_faults: lookup(StoreTier::Durable, "fault"),
            origin_resolutions: self
                .resolutions
                .with_label_values(&[Provenance::Origin.as_str()])
                .get(),
            failures: FAILURE_REASONS
                .iter()
                .map(|reason| self.failures.with_label_values(&[*reason]).get())
                .sum(),
            write_backs_ok: write_back(StoreTier::Fast, "ok") + write_back(StoreTier::Durable, "ok"),
            write_backs_failed: write_back(StoreTier::Fast, "failed")
                + write_back(StoreTier::Durable, "failed"),
        }
    }
}

impl std::fmt::Debug for ResolverMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverMetrics").finish_non_exhaustive()
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fast_hits: u64,
    pub fast_misses: u64,
    pub fast_faults: u64,
    pub durable_hits: u64,
    pub durable_misses: u64,
    pub durable_faults: u64,
    pub origin_resolutions: u64,
    pub failures: u64,
    pub write_backs_ok: u64,
    pub write_backs_failed: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_start_at_zero() {
        let metrics = ResolverMetrics::new().unwrap();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_lookup_counters() {
        let metrics = ResolverMetrics::new().unwrap();
        metrics.record_lookup(StoreTier::Fast, "miss");
        metrics.record_lookup(StoreTier::Fast, "fault");
        metrics.record_lookup(StoreTier::Durable, "hit");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fast_misses, 1);
        assert_eq!(snapshot.fast_faults, 1);
        assert_eq!(snapshot.durable_hits, 1);
        assert_eq!(snapshot.fast_hits, 0);
    }

    #[test]
    fn test_write_back_and_failure_counters() {
        let metrics = ResolverMetrics::new().unwrap();
        metrics.record_write_back(StoreTier::Fast, true);
        metrics.record_write_back(StoreTier::Durable, false);
        metrics.record_failure("unresolvable");
        metrics.record_failure("invalid_query");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_backs_ok, 1);
        assert_eq!(snapshot.write_backs_failed, 1);
        assert_eq!(snapshot.failures, 2);
    }

    #[test]
    fn test_encode_text_format() {
        let metrics = ResolverMetrics::new().unwrap();
        metrics.record_resolution(Provenance::Origin, Duration::from_millis(120));

        let (content_type, body) = metrics.encode().unwrap();
        let body = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("readthrough_resolutions_total{source=\"origin\"} 1"));
        assert!(body.contains("readthrough_resolve_duration_seconds_bucket"));
    }

    #[test]
    fn test_snapshot_does_not_change_exposition() {
        let metrics = ResolverMetrics::new().unwrap();
        let (_, before) = metrics.encode().unwrap();

        metrics.snapshot();
        let _ = format!("{:?}", metrics);
        let (_, after) = metrics.encode().unwrap();

        assert_eq!(before, after);
        let body = String::from_utf8(before).unwrap();
        assert!(body.contains("readthrough_tier_lookups_total{outcome=\"fault\",tier=\"durable\"} 0"));
        assert!(body.contains("readthrough_resolution_failures_total{reason=\"cancelled\"} 0"));
    }

    #[test]
    fn test_shared_registry_rejects_duplicates() {
        let registry = Registry::new();
        ResolverMetrics::with_registry(registry.clone()).unwrap();
        assert!(ResolverMetrics::with_registry(registry).is_err());
    }
}
