//! The token bucket decision engine
//!
//! One call to [`TokenBucketEngine::check`] answers one admission
//! question: read the bucket, refill it, try to take a token, commit the
//! result atomically, and report when a rejected caller may retry.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::core::bucket::BucketState;
use crate::core::key::BucketKey;
use crate::core::policy::TierPolicy;
use crate::core::store::{StateStore, StoreError};

/// Bounded retry budget for lost compare-and-swap races
const MAX_COMMIT_ATTEMPTS: usize = 8;

/// Errors escaping one engine check
///
/// Rejection is not an error — a denied request is the normal
/// `allowed = false` decision. These variants cover the store itself
/// failing; the admission facade absorbs them into its fallback policy
/// rather than showing them to callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The state store could not be reached
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Every commit attempt lost its compare-and-swap race
    #[error("bucket update contended past {attempts} attempts")]
    ContentionExhausted { attempts: usize },
}

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Capacity of the tier in force when the decision was made
    pub limit: i64,
    /// Tokens left in the bucket after this check
    pub remaining: f64,
    /// How long a rejected caller should wait before retrying (zero when allowed)
    pub retry_after: Duration,
    /// True when the decision came from the fallback policy, not the store
    pub degraded: bool,
}

/// Token bucket engine over an injected state store
///
/// The read-compute-write cycle is one read plus one atomic commit; the
/// computation in between is pure and never suspends. A lost commit race
/// means another caller's decision landed first, so the engine re-reads
/// and recomputes against the fresher state, a bounded number of times.
/// Whichever caller commits first sees the prior state; the others
/// necessarily see the updated one, so under contention some are
/// correctly rejected even if a different serialization would have
/// admitted them.
pub struct TokenBucketEngine<S: StateStore> {
    store: S,
    idle_ttl: Duration,
}

impl<S: StateStore> TokenBucketEngine<S> {
    /// Create an engine around a store
    ///
    /// `idle_ttl` is how long an untouched bucket survives in the store.
    /// It refreshes on every write, so only dormant buckets expire — and
    /// an expired bucket is simply recreated full on its next check.
    pub fn new(store: S, idle_ttl: Duration) -> Self {
        TokenBucketEngine { store, idle_ttl }
    }

    /// Check whether one request for `key` may proceed under `policy`
    ///
    /// Absent keys synthesize a full bucket. Rejected checks persist too:
    /// the refill timestamp must advance on every decision, or the next
    /// check would re-count the same idle interval and hand out free
    /// tokens during a deficit window.
    pub fn check(
        &mut self,
        key: &BucketKey,
        policy: &TierPolicy,
        now: SystemTime,
    ) -> Result<Decision, EngineError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self.store.get(key.as_str(), now)?;

            let prior = match current {
                Some(versioned) => versioned.state,
                None => BucketState::full(policy, now),
            };

            let refilled = prior.refill(policy, now);
            let allowed = refilled >= 1.0;
            let remaining = if allowed { refilled - 1.0 } else { refilled };

            let next = BucketState {
                tokens: remaining,
                last_refill: now,
            };

            let committed = match current {
                Some(versioned) => self.store.compare_and_swap_with_ttl(
                    key.as_str(),
                    versioned.version,
                    next,
                    self.idle_ttl,
                    now,
                )?,
                None => {
                    self.store
                        .set_if_not_exists_with_ttl(key.as_str(), next, self.idle_ttl, now)?
                }
            };

            if committed {
                let retry_after = if allowed {
                    Duration::ZERO
                } else {
                    retry_after_for_deficit(remaining, policy)
                };

                return Ok(Decision {
                    allowed,
                    limit: policy.capacity(),
                    remaining,
                    retry_after,
                    degraded: false,
                });
            }

            tracing::debug!(%key, attempt, "lost bucket commit race, retrying");
        }

        Err(EngineError::ContentionExhausted {
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    /// The idle TTL applied to every write
    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }
}

/// Whole seconds until a bucket in deficit accrues its next full token
fn retry_after_for_deficit(tokens: f64, policy: &TierPolicy) -> Duration {
    let deficit = 1.0 - tokens;
    Duration::from_secs((deficit / policy.refill_rate()).ceil() as u64)
}
