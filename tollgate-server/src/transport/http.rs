//! HTTP/JSON transport for easy integration
//!
//! # API Endpoints
//!
//! ## POST /check
//!
//! Run one admission check.
//!
//! ### Request Body
//!
//! ```json
//! {
//!   "identity": "user:123",
//!   "resource": "/search",
//!   "tier": "premium",
//!   "timestamp": 1234567890123456789
//! }
//! ```
//!
//! - `tier` is optional (defaults to the configured default tier)
//! - `timestamp` is optional (defaults to current time, in nanoseconds)
//!
//! ### Response
//!
//! ```json
//! {
//!   "allowed": true,
//!   "limit": 1000,
//!   "remaining": 999.0,
//!   "retry_after": 0,
//!   "degraded": false
//! }
//! ```
//!
//! Rejections are still HTTP 200 with `allowed: false`; the caller owns
//! the translation to a 429-equivalent using `retry_after`.
//!
//! ## GET /health
//!
//! Health check endpoint. Returns "OK" with 200 status.
//!
//! ## GET /metrics
//!
//! Server metrics in Prometheus text format.

use super::Transport;
use crate::actor::AdmissionHandle;
use crate::metrics::Metrics;
use crate::types::{CheckRequest as InternalRequest, CheckResponse};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// HTTP request format for admission checks
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpCheckRequest {
    /// Principal being rate limited
    pub identity: String,
    /// Endpoint or operation being protected
    pub resource: String,
    /// Tier name (optional, defaults to the configured default tier)
    pub tier: Option<String>,
    /// Unix timestamp in nanoseconds (optional, defaults to current time)
    pub timestamp: Option<i64>,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,
}

/// HTTP transport implementation
///
/// Provides a REST API with JSON payloads for easy integration.
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        let addr = format!("{host}:{port}").parse().expect("Invalid address");
        Self { addr }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, limiter: AdmissionHandle, metrics: Arc<Metrics>) -> Result<()> {
        let app_state = Arc::new(AppState { limiter, metrics });

        let app = Router::new()
            .route("/check", post(handle_check))
            .route("/health", get(|| async { "OK" }))
            .route("/metrics", get(handle_metrics))
            .with_state(app_state);

        tracing::info!("HTTP server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

struct AppState {
    limiter: AdmissionHandle,
    metrics: Arc<Metrics>,
}

async fn handle_check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HttpCheckRequest>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<HttpErrorResponse>)> {
    let started = Instant::now();

    let timestamp = if let Some(nanos) = req.timestamp {
        UNIX_EPOCH + Duration::from_nanos(nanos as u64)
    } else {
        SystemTime::now()
    };

    let internal_req = InternalRequest {
        identity: req.identity,
        resource: req.resource,
        tier: req.tier,
        timestamp,
    };

    match state.limiter.check(internal_req).await {
        Ok(response) => {
            state.metrics.record_check(
                started.elapsed().as_micros() as u64,
                response.allowed,
                response.degraded,
            );
            Ok(Json(response))
        }
        Err(e) => {
            state
                .metrics
                .record_error(started.elapsed().as_micros() as u64);
            tracing::error!("admission check failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HttpErrorResponse {
                    error: format!("Internal server error: {e}"),
                }),
            ))
        }
    }
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.export_prometheus()
}
