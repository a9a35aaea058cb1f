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
const MIN_CLEANUP_INTERVAL_SECS: u64 = 1;
const MAX_CLEANUP_INTERVAL_SECS: u64 = 300;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5;
const MAX_OPERATIONS_BEFORE_CLEANUP: usize = 100_000;
const EXPIRED_RATIO_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: BucketState,
    version: u64,
    expires_at: SystemTime,
}

/// Adaptive cleanup store
///
/// Dynamically adjusts its sweep frequency based on usage patterns,
/// making it a good fit for variable workloads. It monitors the ratio of
/// expired entries and adjusts cleanup intervals accordingly.
///
/// # Example
///
/// ```
/// use tollgate::{AdaptiveStore, TokenBucketEngine};
/// use std::time::Duration;
///
/// let mut engine = TokenBucketEngine::new(AdaptiveStore::new(), Duration::from_secs(3600));
/// ```
pub struct AdaptiveStore {
    data: HashMap<String, Entry>,
    // Cleanup timing
    next_cleanup: SystemTime,
    min_cleanup_interval: Duration,
    max_cleanup_interval: Duration,
    current_cleanup_interval: Duration,
    // Cleanup triggers
    expired_count: usize,
    operations_since_cleanup: usize,
    max_operations_before_cleanup: usize,
    // Cleanup history for adaptation
    last_cleanup_removed: usize,
    last_cleanup_total: usize,
}

/// Builder for configuring an [`AdaptiveStore`]
///
/// # Example
///
/// ```
/// use tollgate::AdaptiveStore;
///
/// let store = AdaptiveStore::builder()
///     .capacity(1_000_000)
///     .min_interval(std::time::Duration::from_secs(5))
///     .max_interval(std::time::Duration::from_secs(300))
///     .max_operations(100_000)
///     .build();
/// ```
pub struct AdaptiveStoreBuilder {
    capacity: usize,
    min_cleanup_interval: Duration,
    max_cleanup_interval: Duration,
    max_operations_before_cleanup: usize,
}

impl AdaptiveStore {
    /// Create a new AdaptiveStore with default configuration
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new AdaptiveStore sized for `capacity` unique keys
    pub fn with_capacity(capacity: usize) -> Self {
        AdaptiveStore {
            data: HashMap::with_capacity((capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize),
            next_cleanup: SystemTime::now() + Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            min_cleanup_interval: Duration::from_secs(MIN_CLEANUP_INTERVAL_SECS),
            max_cleanup_interval: Duration::from_secs(MAX_CLEANUP_INTERVAL_SECS),
            current_cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            expired_count: 0,
            operations_since_cleanup: 0,
            max_operations_before_cleanup: MAX_OPERATIONS_BEFORE_CLEANUP,
            last_cleanup_removed: 0,
            last_cleanup_total: 0,
        }
    }

    /// Create a new builder for configuring an AdaptiveStore
    pub fn builder() -> AdaptiveStoreBuilder {
        AdaptiveStoreBuilder {
            capacity: DEFAULT_CAPACITY,
            min_cleanup_interval: Duration::from_secs(MIN_CLEANUP_INTERVAL_SECS),
            max_cleanup_interval: Duration::from_secs(MAX_CLEANUP_INTERVAL_SECS),
            max_operations_before_cleanup: MAX_OPERATIONS_BEFORE_CLEANUP,
        }
    }

    fn with_config(
        capacity: usize,
        min_cleanup_interval: Duration,
        max_cleanup_interval: Duration,
        max_operations_before_cleanup: usize,
    ) -> Self {
        AdaptiveStore {
            data: HashMap::with_capacity((capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize),
            next_cleanup: SystemTime::now() + Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            min_cleanup_interval,
            max_cleanup_interval,
            current_cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            expired_count: 0,
            operations_since_cleanup: 0,
            max_operations_before_cleanup,
            last_cleanup_removed: 0,
            last_cleanup_total: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn should_clean(&self, now: SystemTime) -> bool {
        // Time-based trigger
        if now >= self.next_cleanup {
            return true;
        }

        // Operation count trigger (prevent unbounded growth)
        if self.operations_since_cleanup >= self.max_operations_before_cleanup {
            return true;
        }

        // Expired percentage trigger with dynamic threshold
        if self.expired_count > 50 {
            let expired_ratio = self.expired_count as f64 / self.data.len().max(1) as f64;

            // Clean sooner when the last sweep was productive
            let threshold = if self.last_cleanup_removed > self.last_cleanup_total / 4 {
                EXPIRED_RATIO_THRESHOLD / 2.0
            } else {
                EXPIRED_RATIO_THRESHOLD * 1.25
            };

            if expired_ratio > threshold {
                return true;
            }
        }

        // Memory pressure trigger (if the map is getting too large)
        if self.data.len() > self.data.capacity() * 3 / 4 {
            return true;
        }

        false
    }

    fn cleanup(&mut self, now: SystemTime) {
        let initial_len = self.data.len();

        self.data.retain(|_, entry| entry.expires_at > now);

        let removed = initial_len - self.data.len();

        // Adaptive interval adjustment
        if removed == 0 && self.expired_count == 0 {
            // No expired entries, increase interval
            self.current_cleanup_interval =
                (self.current_cleanup_interval * 2).min(self.max_cleanup_interval);
        } else if removed as f64 > initial_len as f64 * 0.5 {
            // Removed many entries, decrease interval
            self.current_cleanup_interval =
                (self.current_cleanup_interval / 2).max(self.min_cleanup_interval);
        }

        // Update state
        self.last_cleanup_removed = removed;
        self.last_cleanup_total = initial_len;
        self.next_cleanup = now + self.current_cleanup_interval;
        self.expired_count = 0;
        self.operations_since_cleanup = 0;
    }

    fn maybe_clean_expired(&mut self, now: SystemTime) {
        self.operations_since_cleanup += 1;

        if self.should_clean(now) {
            self.cleanup(now);
        }
    }
}

impl Default for AdaptiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for AdaptiveStore {
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
        self.maybe_clean_expired(now);

        match self.data.get_mut(key) {
            Some(entry) if entry.expires_at <= now => {
                self.expired_count += 1;
                Ok(false)
            }
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
            Some(entry) if entry.expires_at > now => Ok(false),
            Some(_) => {
                // Expired entry being recreated
                self.expired_count += 1;
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
            None => {
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

impl Default for AdaptiveStoreBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            min_cleanup_interval: Duration::from_secs(MIN_CLEANUP_INTERVAL_SECS),
            max_cleanup_interval: Duration::from_secs(MAX_CLEANUP_INTERVAL_SECS),
            max_operations_before_cleanup: MAX_OPERATIONS_BEFORE_CLEANUP,
        }
    }
}

impl AdaptiveStoreBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected capacity (number of unique keys)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the minimum cleanup interval
    ///
    /// Sweeps never run more frequently than this.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_cleanup_interval = interval;
        self
    }

    /// Set the maximum cleanup interval
    ///
    /// Sweeps run at least this often, even with few expired entries.
    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.max_cleanup_interval = interval;
        self
    }

    /// Set the maximum operations before forcing a sweep
    ///
    /// Bounds memory growth under sustained load.
    pub fn max_operations(mut self, max_ops: usize) -> Self {
        self.max_operations_before_cleanup = max_ops;
        self
    }

    /// Build the AdaptiveStore with the configured settings
    pub fn build(self) -> AdaptiveStore {
        AdaptiveStore::with_config(
            self.capacity,
            self.min_cleanup_interval,
            self.max_cleanup_interval,
            self.max_operations_before_cleanup,
        )
    }
}
