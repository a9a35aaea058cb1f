use std::time::{Duration, SystemTime};

use super::{StateStore, StoreError, VersionedState};
use crate::core::bucket::BucketState;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: BucketState,
    version: u64,
    expires_at: SystemTime,
}

/// Fixed-interval cleanup store
///
/// Sweeps expired buckets at regular, predictable intervals. Best suited
/// for steady workloads where you want deterministic cleanup behavior.
///
/// # Example
///
/// ```
/// use tollgate::{PeriodicStore, TokenBucketEngine};
/// use std::time::Duration;
///
/// // Sweep expired buckets every 5 minutes
/// let store = PeriodicStore::builder()
///     .cleanup_interval(Duration::from_secs(300))
///     .build();
/// let mut engine = TokenBucketEngine::new(store, Duration::from_secs(3600));
/// ```
pub struct PeriodicStore {
    data: HashMap<String, Entry>,
    // Track when next cleanup is needed
    next_cleanup: SystemTime,
    cleanup_interval: Duration,
    // Entries removed by the last sweep
    expired_count: usize,
}

/// Builder for configuring a [`PeriodicStore`]
///
/// # Example
///
/// ```
/// use tollgate::PeriodicStore;
/// use std::time::Duration;
///
/// let store = PeriodicStore::builder()
///     .capacity(100_000)
///     .cleanup_interval(Duration::from_secs(120))
///     .build();
/// ```
pub struct PeriodicStoreBuilder {
    capacity: usize,
    cleanup_interval: Duration,
}

impl PeriodicStore {
    /// Create a new PeriodicStore with default configuration
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new PeriodicStore sized for `capacity` unique keys
    ///
    /// The store allocates 30% more space to reduce hash collisions.
    pub fn with_capacity(capacity: usize) -> Self {
        PeriodicStore {
            // Pre-allocate with overhead to avoid rehashing
            data: HashMap::with_capacity((capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize),
            next_cleanup: SystemTime::now() + Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            expired_count: 0,
        }
    }

    /// Create a new builder for configuring a PeriodicStore
    pub fn builder() -> PeriodicStoreBuilder {
        PeriodicStoreBuilder {
            capacity: DEFAULT_CAPACITY,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }

    fn with_config(capacity: usize, cleanup_interval: Duration) -> Self {
        PeriodicStore {
            data: HashMap::with_capacity((capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize),
            next_cleanup: SystemTime::now() + cleanup_interval,
            cleanup_interval,
            expired_count: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[cfg(test)]
    pub fn expired_count(&self) -> usize {
        self.expired_count
    }

    fn maybe_clean_expired(&mut self, now: SystemTime) {
        // Clean periodically based on time
        if now >= self.next_cleanup {
            let before_count = self.data.len();
            self.data.retain(|_, entry| entry.expires_at > now);
            self.expired_count = before_count.saturating_sub(self.data.len());
            self.next_cleanup = now + self.cleanup_interval;
        }
    }
}

impl Default for PeriodicStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for PeriodicStore {
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<VersionedState>, StoreError> {
        match self.data.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(VersionedState {
                state: entry.state,
                version: entry.version,
            })),
            _ => Ok(None),
        }
    }

    fn compare_and_swap_with_ttl(
        &mut self,
        key: &str,
        expected_version: u64,
        state: BucketState,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<bool, StoreError> {
        // Only clean periodically, not on every operation
        self.maybe_clean_expired(now);

        match self.data.get_mut(key) {
            Some(entry) if entry.expires_at <= now => Ok(false),
            Some(entry) if entry.version == expected_version => {
                entry.state = state;
                entry.version += 1;
                entry.expires_at = now + ttl;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    fn set_if_not_exists_with_ttl(
        &mut self,
        key: &str,
        state: BucketState,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<bool, StoreError> {
        self.maybe_clean_expired(now);

        match self.data.get(key) {
            // Live key: creation loses to whoever got there first
            Some(entry) if entry.expires_at > now => Ok(false),
            // Absent or expired: recreate from scratch
            _ => {
                self.data.insert(
                    key.to_string(),
                    Entry {
                        state,
                        version: 0,
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }
}

impl Default for PeriodicStoreBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl PeriodicStoreBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected capacity (number of unique keys)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the interval between cleanup sweeps
    ///
    /// Shorter intervals mean more consistent memory usage but higher CPU
    /// overhead.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Build the PeriodicStore with the configured settings
    pub fn build(self) -> PeriodicStore {
        PeriodicStore::with_config(self.capacity, self.cleanup_interval)
    }
}
