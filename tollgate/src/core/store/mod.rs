//! Atomic storage backends for bucket state
//!
//! The engine talks to storage through [`StateStore`], an atomic
//! compare-and-swap-with-expiry contract over a single key space. The
//! store guarantees that no other writer's update lands between the read
//! and the write that commits a decision — issuing the read and the write
//! as independent, non-atomic store calls is exactly the race this
//! contract exists to close.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::core::bucket::BucketState;

mod adaptive_cleanup;
mod periodic;

pub use adaptive_cleanup::{AdaptiveStore, AdaptiveStoreBuilder};
pub use periodic::{PeriodicStore, PeriodicStoreBuilder};

#[cfg(test)]
mod tests;

/// Failure to reach or use the shared state store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached or timed out
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Bucket state plus the optimistic-concurrency token for one key
///
/// The version increases on every committed write; a compare-and-swap
/// against a stale version fails, which is how concurrent writers to the
/// same key are totally ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionedState {
    pub state: BucketState,
    pub version: u64,
}

/// Atomic keyed storage for bucket state
///
/// The TTL refreshes on every successful write, so active buckets never
/// expire mid-use while idle buckets age out and are recreated full.
pub trait StateStore {
    /// Read the current state for a key, if present and unexpired
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<VersionedState>, StoreError>;

    /// Commit `state` iff the stored version still equals `expected_version`
    ///
    /// Returns `Ok(false)` when another writer got there first, or the
    /// entry expired underneath the caller; the caller re-reads and
    /// recomputes against the fresher state.
    fn compare_and_swap_with_ttl(
        &mut self,
        key: &str,
        expected_version: u64,
        state: BucketState,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<bool, StoreError>;

    /// Create a key iff it does not exist (or its entry has expired)
    fn set_if_not_exists_with_ttl(
        &mut self,
        key: &str,
        state: BucketState,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<bool, StoreError>;
}
