//! Common types used across the server
//!
//! The transport parses its protocol-specific request format into
//! [`CheckRequest`], the actor answers with [`CheckResponse`], and the
//! transport serializes that back out.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tollgate::Decision;

/// Internal admission request, after transport-specific parsing
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Principal being rate limited (user id, API key, client address, ...)
    pub identity: String,
    /// Endpoint or operation being protected
    pub resource: String,
    /// Tier name; `None` resolves to the configured default tier
    pub tier: Option<String>,
    /// Request timestamp, for consistent accounting across callers
    pub timestamp: SystemTime,
}

/// Admission response returned to clients
///
/// # Response Interpretation
///
/// - If `allowed` is true: the request can proceed
/// - If `allowed` is false: reject the request and surface `retry_after`
///   to the caller (producing a 429-equivalent is the caller's business)
/// - If `degraded` is true: the state store could not be consulted and
///   the configured fallback policy produced this answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Capacity of the tier applied
    pub limit: i64,
    /// Tokens left in the bucket after this check
    pub remaining: f64,
    /// Seconds to wait before retrying (0 when allowed)
    pub retry_after: u64,
    /// True when the fallback policy answered instead of the store
    pub degraded: bool,
}

impl From<Decision> for CheckResponse {
    fn from(decision: Decision) -> Self {
        CheckResponse {
            allowed: decision.allowed,
            limit: decision.limit,
            remaining: decision.remaining,
            retry_after: decision.retry_after.as_secs(),
            degraded: decision.degraded,
        }
    }
}
