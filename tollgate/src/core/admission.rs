//! The admission facade: the single entry point called once per request
//!
//! Resolves the tier, renders the bucket key, and delegates to the
//! engine. Store failures never escape as errors — the configured
//! fallback policy turns them into a degraded decision, and the condition
//! is surfaced through logging and the decision's `degraded` marker.

use std::time::{Duration, SystemTime};

use crate::core::engine::{Decision, TokenBucketEngine};
use crate::core::key::BucketKey;
use crate::core::policy::TierRegistry;
use crate::core::store::StateStore;

/// What to answer when the state store cannot be consulted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackPolicy {
    /// Admit the request and mark the decision degraded
    FailOpen,
    /// Reject the request with a fixed retry-after
    FailClosed {
        /// Retry hint handed to rejected callers while degraded
        retry_after: Duration,
    },
}

/// Per-request admission control over an engine and a tier registry
pub struct AdmissionControl<S: StateStore> {
    engine: TokenBucketEngine<S>,
    tiers: TierRegistry,
    fallback: FallbackPolicy,
}

impl<S: StateStore> AdmissionControl<S> {
    /// Assemble the facade
    pub fn new(
        store: S,
        tiers: TierRegistry,
        idle_ttl: Duration,
        fallback: FallbackPolicy,
    ) -> Self {
        AdmissionControl {
            engine: TokenBucketEngine::new(store, idle_ttl),
            tiers,
            fallback,
        }
    }

    /// Decide whether this principal may touch this resource right now
    ///
    /// An absent or unknown tier name resolves to the default tier. The
    /// result is always a structured [`Decision`], never an error: when
    /// the store is unavailable (or a contended update exhausted its
    /// retries) the fallback policy answers and `degraded` is set.
    pub fn admit(
        &mut self,
        identity: &str,
        resource: &str,
        tier: Option<&str>,
        now: SystemTime,
    ) -> Decision {
        let policy = *self.tiers.resolve(tier);
        let key = BucketKey::new(identity, resource);

        match self.engine.check(&key, &policy, now) {
            Ok(decision) => decision,
            Err(error) => {
                tracing::warn!(%key, %error, "state store unavailable, applying fallback policy");
                match self.fallback {
                    FallbackPolicy::FailOpen => Decision {
                        allowed: true,
                        limit: policy.capacity(),
                        remaining: 0.0,
                        retry_after: Duration::ZERO,
                        degraded: true,
                    },
                    FallbackPolicy::FailClosed { retry_after } => Decision {
                        allowed: false,
                        limit: policy.capacity(),
                        remaining: 0.0,
                        retry_after,
                        degraded: true,
                    },
                }
            }
        }
    }

    /// The tier registry in force
    pub fn tiers(&self) -> &TierRegistry {
        &self.tiers
    }
}
