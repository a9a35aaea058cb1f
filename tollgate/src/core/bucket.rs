//! Persisted bucket state and refill arithmetic
//!
//! The refill computation is pure: the engine reads state, computes the
//! next state with no intervening suspension point, and commits it in a
//! single store call.

use std::time::{Duration, SystemTime};

use crate::core::policy::TierPolicy;

/// Persisted record for one (identity, resource) bucket
///
/// `tokens` is continuous so fractional refill rates stay exact over
/// arbitrary intervals; only the admission test (`>= 1`) and the decrement
/// are integer-like in effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    /// Tokens currently in the bucket, within `[0, capacity]`
    pub tokens: f64,
    /// Wall-clock instant of the last refill computation
    pub last_refill: SystemTime,
}

impl BucketState {
    /// Implicit initial state for a key never seen before: a full bucket
    pub fn full(policy: &TierPolicy, now: SystemTime) -> Self {
        BucketState {
            tokens: policy.capacity() as f64,
            last_refill: now,
        }
    }

    /// Token level after refilling up to `now` under `policy`
    ///
    /// Elapsed time clamps to zero, so a reading behind `last_refill`
    /// (clock skew, a stale snapshot) never subtracts tokens. The capacity
    /// clamp applies the policy in force now: a tier downgrade caps excess
    /// tokens on the next check instead of waiting for them to drain. No
    /// upper bound on elapsed time is needed — the clamp bounds the result
    /// however long the bucket sat idle.
    pub fn refill(&self, policy: &TierPolicy, now: SystemTime) -> f64 {
        let elapsed = now
            .duration_since(self.last_refill)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        let refilled = self.tokens + elapsed * policy.refill_rate();
        refilled.min(policy.capacity() as f64)
    }
}
