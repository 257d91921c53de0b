//! HTTP Boundary
//!
//! A small hyper server in front of the resolver.
//!
//! | Route          | Response                                             |
//! |----------------|------------------------------------------------------|
//! | `/api/search`  | 200 entry JSON, or 500 `Could not retrieve query: q.` |
//! | `/healthz`     | liveness                                             |
//! | `/livez`       | liveness                                             |
//! | `/readyz`      | JSON health report, 503 unless operational           |
//! | `/metrics`     | Prometheus text format                               |
//!
//! Every response carries `X-Response-Time`. Failures are never
//! differentiated at this boundary; the logs carry the cause.

pub mod health;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::form_urlencoded;
use uuid::Uuid;

use crate::cache::CacheResolver;
use crate::error::Result;

pub use self::health::{HealthCheck, HealthCheckResult, HealthResponse, HealthStatus};

/// Header reporting handler latency
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Shared state for every connection
#[derive(Debug, Clone)]
pub struct AppState {
    pub resolver: Arc<CacheResolver>,
    pub health: Arc<HealthCheck>,
    /// Fires on shutdown; in-flight resolutions observe a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(resolver: Arc<CacheResolver>) -> Self {
        Self {
            resolver,
            health: Arc::new(HealthCheck::new()),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Accept connections until `state.shutdown` fires, then wait for open
/// connections to finish their in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let connections = TaskTracker::new();

    if let Ok(addr) = listener.local_addr() {
        info!("Server listening on {}", addr);
    }

    loop {
        let (stream, peer) = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Server accept error");
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let state = state.clone();
        let shutdown = state.shutdown.clone();

        connections.spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle(&state, req).await) }
            });

            let conn = http1::Builder::new().serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };

            if let Err(e) = result {
                debug!(peer = %peer, error = %e, "Server connection error");
            }
        });
    }

    connections.close();
    connections.wait().await;
    info!("Server stopped accepting connections");
    Ok(())
}

/// Route one request
pub async fn handle<B>(state: &AppState, req: Request<B>) -> Response<Full<Bytes>> {
    let started = Instant::now();
    // Request bodies are never read
    let (parts, _) = req.into_parts();
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %parts.method,
        path = %parts.uri.path(),
    );

    let mut response = route(state, &parts.method, &parts.uri)
        .instrument(span)
        .await;

    let elapsed = format!("{}ms", started.elapsed().as_millis());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }
    response
}

async fn route(state: &AppState, method: &Method, uri: &Uri) -> Response<Full<Bytes>> {
    match uri.path() {
        "/api/search" if method == Method::GET => {
            search(state, query_param(uri.query(), "query")).await
        }
        "/api/search" => {
            let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET"));
            response
        }
        "/healthz" | "/livez" => {
            if state.health.is_live() {
                text(StatusCode::OK, "ok")
            } else {
                text(StatusCode::SERVICE_UNAVAILABLE, "not live")
            }
        }
        "/readyz" => {
            let report = state.health.readiness_report(&state.resolver).await;
            let status = if report.status.is_operational() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            match serde_json::to_vec(&report) {
                Ok(body) => json(status, body),
                Err(e) => {
                    error!(error = %e, "Could not encode health report");
                    text(StatusCode::INTERNAL_SERVER_ERROR, "health report unavailable")
                }
            }
        }
        "/metrics" => match state.resolver.metrics().encode() {
            Ok((content_type, buffer)) => {
                let mut response = respond(StatusCode::OK, buffer);
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(e) => {
                error!(error = %e, "Could not encode metrics");
                text(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
            }
        },
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn search(state: &AppState, query: String) -> Response<Full<Bytes>> {
    let cancel = state.shutdown.child_token();

    let resolution = match state.resolver.resolve_with_cancel(&query, &cancel).await {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!(query = %query, error = %e, "Could not retrieve query");
            return failure(&query);
        }
    };

    match resolution.entry.to_json() {
        Ok(body) => {
            info!(
                "Successfully served query: {} from {}",
                query.trim(),
                resolution.source
            );
            json(StatusCode::OK, body.into_bytes())
        }
        Err(e) => {
            error!(query = %query, error = %e, "Could not encode entry");
            failure(&query)
        }
    }
}

fn failure(query: &str) -> Response<Full<Bytes>> {
    text(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Could not retrieve query: {}.", query.trim()),
    )
}

/// Decoded value of `name` in a query string; absent means empty.
///
/// Keys and values are form-decoded; invalid UTF-8 is replaced lossily.
pub fn query_param(query_string: Option<&str>, name: &str) -> String {
    let Some(query_string) = query_string else {
        return String::new();
    };

    form_urlencoded::parse(query_string.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = respond(status, body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn json(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = respond(status, body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

// =============================================================================
// Tests
// =============================================================================
