//! Transport layer for the admission server
//!
//! [`http`] is the wire protocol: a REST API with JSON payloads. The
//! server answers every well-formed check with a structured decision
//! body — translating a rejection into an HTTP 429 (or equivalent) is
//! the calling layer's concern, not this server's.

pub mod http;


use crate::actor::AdmissionHandle;
use crate::metrics::Metrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for transport implementations
///
/// Each transport is responsible for:
/// - Accepting client connections
/// - Parsing protocol-specific requests
/// - Forwarding requests to the admission actor
/// - Sending responses back to clients
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// Binds to the configured address and serves requests using the
    /// provided admission handle, recording outcomes into `metrics`.
    /// Runs indefinitely until an error occurs or the server shuts down.
    async fn start(self, limiter: AdmissionHandle, metrics: Arc<Metrics>) -> Result<()>;
}
