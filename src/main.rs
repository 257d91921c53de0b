//! readthrough
//!
//! Serves `/api/search` from Redis, then S3, then the origin.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          readthrough                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Fast Tier   │───▶│ Durable Tier │───▶│    Origin    │       │
//! │  │   (Redis)    │    │     (S3)     │    │    (HTTP)    │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use readthrough::adapters::{
    HttpOriginFetcher, OriginConfig, RedisKeyValueBackend, S3Config, S3ObjectBackend,
    DEFAULT_ORIGIN_URL_TEMPLATE,
};
use readthrough::cache::{
    CacheResolver, DurableStore, FastStore, ResolverConfig, ResolverMetrics, WriteBackMode,
    DEFAULT_NAMESPACE,
};
use readthrough::error::Result;
use readthrough::server::{self, AppState};

// =============================================================================
// CLI Arguments
// =============================================================================

/// readthrough - Two-tier read-through cache in front of an HTTP origin
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    listen_addr: String,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// S3 bucket for durable entries
    #[arg(long, env = "S3_BUCKET", default_value = "readthrough-store")]
    s3_bucket: String,

    /// S3 region
    #[arg(long, env = "S3_REGION", default_value = "ap-southeast-2")]
    s3_region: String,

    /// Custom S3 endpoint (MinIO, Ceph RGW)
    #[arg(long, env = "S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// Do not create the bucket at startup
    #[arg(long, env = "SKIP_BUCKET_PROVISIONING")]
    skip_bucket_provisioning: bool,

    /// Origin URL with a {query} placeholder
    #[arg(long, env = "ORIGIN_URL_TEMPLATE", default_value = DEFAULT_ORIGIN_URL_TEMPLATE)]
    origin_url_template: String,

    /// Origin request timeout in seconds
    #[arg(long, env = "ORIGIN_TIMEOUT_SECONDS", default_value = "10")]
    origin_timeout_seconds: u64,

    /// Namespace prefix for cache keys
    #[arg(long, env = "KEY_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    key_namespace: String,

    /// Fast tier expiry in seconds
    #[arg(long, env = "FAST_TTL_SECONDS", default_value = "3600")]
    fast_ttl_seconds: u64,

    /// Copy durable-tier hits into the fast tier
    #[arg(long, env = "PROMOTE_DURABLE_HITS")]
    promote_durable_hits: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting readthrough");
    info!("  Redis URL: {}", args.redis_url);
    info!("  S3 bucket: {} ({})", args.s3_bucket, args.s3_region);
    info!("  Origin: {}", args.origin_url_template);
    info!("  Key namespace: {}", args.key_namespace);
    info!("  Promote durable hits: {}", args.promote_durable_hits);

    // Fast tier
    let redis = RedisKeyValueBackend::connect(&args.redis_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            e
        })?;
    let fast = FastStore::with_ttl(
        Arc::new(redis),
        Duration::from_secs(args.fast_ttl_seconds),
    );

    // Durable tier
    let s3_config = S3Config {
        bucket: args.s3_bucket.clone(),
        region: args.s3_region.clone(),
        endpoint: args.s3_endpoint.clone(),
    };
    let s3 = S3ObjectBackend::from_env(&s3_config).await;
    if args.skip_bucket_provisioning {
        info!("Skipping bucket provisioning for {}", s3.bucket());
    } else {
        s3.ensure_bucket().await.map_err(|e| {
            error!("Bucket provisioning failed: {}", e);
            e
        })?;
    }
    let durable = DurableStore::new(Arc::new(s3));

    // Origin
    let origin = HttpOriginFetcher::new(OriginConfig {
        url_template: args.origin_url_template.clone(),
        timeout: Duration::from_secs(args.origin_timeout_seconds),
        ..Default::default()
    })?;

    let resolver = Arc::new(CacheResolver::with_config(
        ResolverConfig {
            namespace: args.key_namespace.clone(),
            promote_durable_hits: args.promote_durable_hits,
            write_back: WriteBackMode::Background,
        },
        Arc::new(fast),
        Arc::new(durable),
        Arc::new(origin),
        Arc::new(ResolverMetrics::new()?),
    ));

    let listener = TcpListener::bind(&args.listen_addr).await.map_err(|e| {
        error!("Failed to bind server to {}: {}", args.listen_addr, e);
        e
    })?;

    let state = AppState::new(resolver.clone());
    let server = tokio::spawn(server::serve(listener, state.clone()));
    state.health.set_ready(true);
    info!("Service ready");

    shutdown_signal().await;

    info!("Shutting down");
    state.health.set_ready(false);
    state.health.set_live(false);
    state.shutdown.cancel();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
    }

    info!(
        "Draining {} background write-backs",
        resolver.pending_write_backs()
    );
    resolver.drain_write_backs().await;

    info!("Shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "aws_config=warn", "aws_smithy_runtime=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Signals
// =============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
