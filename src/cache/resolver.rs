//! Cache Resolver - Ordered Fallback Across Tiers
//!
//! Resolves a query from the fast tier, then the durable tier, then the
//! origin. The first tier producing a value wins and nothing after it is
//! consulted. Only an origin hit populates the tiers.
//!
//! ```text
//! start → fast-lookup ──hit──────────────────────────────▶ done
//!             │ miss/fault
//!             ▼
//!         durable-lookup ──hit───────────────────────────▶ done
//!             │ miss/fault
//!             ▼
//!         origin-fetch ──ok──▶ populate (fast ∥ durable) ─▶ done
//!             │ error
//!             ▼
//!         Unresolvable
//! ```
//!
//! Tier faults never escape: they are logged, counted and treated as a miss.
//! Write-back is best-effort and failure-swallowed. In background mode it
//! runs on a task tracker owned by the resolver and never delays the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, instrument, warn};

use super::lookup::TierLookup;
use super::metrics::ResolverMetrics;
use crate::domain::{
    CacheEntry, CacheKey, OriginFetcher, Provenance, SearchQuery, StoreTier, TierStore,
};
use crate::error::{Error, Result};

/// Default key namespace shared by both tiers
pub const DEFAULT_NAMESPACE: &str = "wikipedia";

/// How origin write-backs are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteBackMode {
    /// Spawn onto the resolver's task tracker and return immediately
    #[default]
    Background,
    /// Await both puts before returning; failures are still swallowed
    Inline,
}

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Namespace prefix for both tier keys
    pub namespace: String,
    /// Copy durable hits into the fast tier
    pub promote_durable_hits: bool,
    /// Write-back scheduling
    pub write_back: WriteBackMode,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            promote_durable_hits: false,
            write_back: WriteBackMode::Background,
        }
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The resolved entry, tagged with `source`
    pub entry: CacheEntry,
    /// Where the value came from
    pub source: Provenance,
    /// Time spent resolving
    pub latency: Duration,
}

impl Resolution {
    fn new(entry: CacheEntry, source: Provenance, started: Instant) -> Self {
        Self {
            entry: entry.tagged(source),
            source,
            latency: started.elapsed(),
        }
    }
}

/// Read-through resolver over a fast tier, a durable tier and an origin
pub struct CacheResolver {
    fast: Arc<dyn TierStore>,
    durable: Arc<dyn TierStore>,
    origin: Arc<dyn OriginFetcher>,
    config: ResolverConfig,
    metrics: Arc<ResolverMetrics>,
    write_backs: TaskTracker,
}

impl CacheResolver {
    /// Create a resolver with default configuration
    pub fn new(
        fast: Arc<dyn TierStore>,
        durable: Arc<dyn TierStore>,
        origin: Arc<dyn OriginFetcher>,
    ) -> Result<Self> {
        Ok(Self::with_config(
            ResolverConfig::default(),
            fast,
            durable,
            origin,
            Arc::new(ResolverMetrics::new()?),
        ))
    }

    /// Create a resolver with custom configuration and metrics
    pub fn with_config(
        config: ResolverConfig,
        fast: Arc<dyn TierStore>,
        durable: Arc<dyn TierStore>,
        origin: Arc<dyn OriginFetcher>,
        metrics: Arc<ResolverMetrics>,
    ) -> Self {
        Self {
            fast,
            durable,
            origin,
            config,
            metrics,
            write_backs: TaskTracker::new(),
        }
    }

    /// Resolve a raw query through the tier chain
    pub async fn resolve(&self, raw_query: &str) -> Result<Resolution> {
        self.resolve_with_cancel(raw_query, &CancellationToken::new())
            .await
    }

    /// Resolve a raw query, aborting the current stage if `cancel` fires
    #[instrument(skip(self, raw_query, cancel), fields(query = %raw_query.trim()))]
    pub async fn resolve_with_cancel(
        &self,
        raw_query: &str,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let started = Instant::now();
        let result = self.run(raw_query, cancel, started).await;

        match &result {
            Ok(resolution) => self
                .metrics
                .record_resolution(resolution.source, resolution.latency),
            Err(e) => self.metrics.record_failure(e.reason()),
        }

        result
    }

    async fn run(
        &self,
        raw_query: &str,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<Resolution> {
        let query = SearchQuery::parse(raw_query)?;
        let key = CacheKey::derive(&self.config.namespace, &query);

        if let Some(entry) = self.lookup(&self.fast, &key, &query, cancel).await? {
            return Ok(Resolution::new(entry, Provenance::FastTier, started));
        }

        if let Some(entry) = self.lookup(&self.durable, &key, &query, cancel).await? {
            if self.config.promote_durable_hits {
                self.populate(vec![self.fast.clone()], &key, &entry).await;
            }
            return Ok(Resolution::new(entry, Provenance::DurableTier, started));
        }

        let entry = self.fetch_origin(&query, cancel).await?;
        self.populate(vec![self.fast.clone(), self.durable.clone()], &key, &entry)
            .await;

        Ok(Resolution::new(entry, Provenance::Origin, started))
    }

    /// Consult one tier. Faults are logged and downgraded to a miss.
    async fn lookup(
        &self,
        store: &Arc<dyn TierStore>,
        key: &CacheKey,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<CacheEntry>> {
        let tier = store.tier();
        let key = key.for_tier(tier);

        let lookup = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled { query: query.to_string() });
            }
            result = store.get(key) => TierLookup::from(result),
        };

        self.metrics.record_lookup(tier, lookup.outcome());

        match lookup {
            TierLookup::Hit(entry) => {
                debug!(tier = %tier, key = %key, "cache hit");
                Ok(Some(entry))
            }
            TierLookup::Miss => {
                debug!(tier = %tier, key = %key, "Could not find key in {} tier", tier);
                Ok(None)
            }
            TierLookup::Fault(e) if e.is_tier_fault() => {
                warn!(tier = %tier, key = %key, error = %e, "tier fault, treating as miss");
                Ok(None)
            }
            TierLookup::Fault(e) => {
                error!(tier = %tier, key = %key, error = %e, "unexpected tier error, treating as miss");
                Ok(None)
            }
        }
    }

    async fn fetch_origin(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<CacheEntry> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled { query: query.to_string() });
            }
            result = self.origin.fetch(query) => result,
        };

        result.map_err(|e| {
            error!(query = %query, error = %e, "origin fetch failed after all tiers missed");
            Error::Unresolvable {
                query: query.to_string(),
                source: Box::new(e),
            }
        })
    }

    /// Write `entry` into `stores`, best-effort.
    async fn populate(&self, stores: Vec<Arc<dyn TierStore>>, key: &CacheKey, entry: &CacheEntry) {
        let task = write_back(stores, key.clone(), entry.clone(), self.metrics.clone());

        match self.config.write_back {
            WriteBackMode::Inline => task.await,
            WriteBackMode::Background => {
                self.write_backs.spawn(task);
            }
        }
    }

    /// Wait for every background write-back spawned so far
    pub async fn drain_write_backs(&self) {
        self.write_backs.close();
        self.write_backs.wait().await;
        self.write_backs.reopen();
    }

    /// Number of write-backs still running
    pub fn pending_write_backs(&self) -> usize {
        self.write_backs.len()
    }

    /// Ping both tiers
    pub async fn tier_health(&self) -> Vec<(StoreTier, Result<()>)> {
        let (fast, durable) =
            tokio::join!(self.fast.health_check(), self.durable.health_check());
        vec![(StoreTier::Fast, fast), (StoreTier::Durable, durable)]
    }

    pub fn metrics(&self) -> &Arc<ResolverMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

impl std::fmt::Debug for CacheResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheResolver")
            .field("config", &self.config)
            .field("pending_write_backs", &self.write_backs.len())
            .finish()
    }
}

/// Issue the puts concurrently and log each outcome.
async fn write_back(
    stores: Vec<Arc<dyn TierStore>>,
    key: CacheKey,
    entry: CacheEntry,
    metrics: Arc<ResolverMetrics>,
) {
    let puts = stores.iter().map(|store| {
        let tier = store.tier();
        let key = key.for_tier(tier);
        let entry = &entry;
        async move { (tier, key, store.put(key, entry).await) }
    });

    for (tier, key, result) in join_all(puts).await {
        match result {
            Ok(()) => {
                metrics.record_write_back(tier, true);
                debug!(tier = %tier, key = %key, "write-back complete");
            }
            Err(e) => {
                metrics.record_write_back(tier, false);
                warn!(tier = %tier, key = %key, error = %e, "write-back failed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
