//! Tier policies and the registry that resolves them
//!
//! A tier is a named (capacity, refill rate) bundle assignable per
//! identity. The registry is built once at startup and read-only
//! afterwards, so any number of concurrent callers can resolve tiers
//! without synchronization.

use thiserror::Error;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

/// Errors raised while loading tier policies
///
/// All variants are fatal at startup: the process must not run with a
/// nonsensical refill rate or capacity. An unknown tier *name* at check
/// time is not an error — it resolves to the default tier.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    /// Capacity must be zero or positive (zero means "always reject")
    #[error("negative capacity: {0}")]
    NegativeCapacity(i64),
    /// Refill rate must be positive and finite
    #[error("invalid refill rate: {0}")]
    InvalidRefillRate(f64),
    /// The configured default tier is not in the registry
    #[error("default tier {0:?} is not registered")]
    UnknownDefaultTier(String),
    /// A registry cannot be built without a default tier
    #[error("no default tier configured")]
    MissingDefaultTier,
}

/// Immutable per-tier policy: burst capacity and refill rate
///
/// Validated on construction, so an invalid policy value is
/// unrepresentable downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPolicy {
    capacity: i64,
    refill_rate: f64,
}

impl TierPolicy {
    /// Create a validated policy
    ///
    /// `capacity` is the maximum token count. Zero is legal and yields a
    /// tier that rejects every request; a negative value is an error.
    /// `refill_rate` is tokens added per second and must be positive and
    /// finite — a zero rate would make retry-after undefined.
    ///
    /// # Example
    ///
    /// ```
    /// use tollgate::TierPolicy;
    ///
    /// let policy = TierPolicy::new(100, 1.0).unwrap();
    /// assert_eq!(policy.capacity(), 100);
    ///
    /// assert!(TierPolicy::new(100, 0.0).is_err());
    /// assert!(TierPolicy::new(-1, 1.0).is_err());
    /// ```
    pub fn new(capacity: i64, refill_rate: f64) -> Result<Self, PolicyError> {
        if capacity < 0 {
            return Err(PolicyError::NegativeCapacity(capacity));
        }
        if !refill_rate.is_finite() || refill_rate <= 0.0 {
            return Err(PolicyError::InvalidRefillRate(refill_rate));
        }
        Ok(TierPolicy {
            capacity,
            refill_rate,
        })
    }

    /// Maximum tokens the bucket can hold
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Tokens added per second
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

/// Process-wide tier table, immutable after build
///
/// Built once via [`TierRegistry::builder`] and handed to the admission
/// facade; lookups never fail because unknown names fall back to the
/// default tier.
#[derive(Debug, Clone)]
pub struct TierRegistry {
    tiers: HashMap<String, TierPolicy>,
    default_tier: String,
    default_policy: TierPolicy,
}

impl TierRegistry {
    /// Create a new builder for assembling a registry
    pub fn builder() -> TierRegistryBuilder {
        TierRegistryBuilder::new()
    }

    /// Resolve a tier name to its policy
    ///
    /// `None` and unregistered names resolve to the default tier: tier
    /// lookup must never fail a request.
    pub fn resolve(&self, tier: Option<&str>) -> &TierPolicy {
        match tier {
            Some(name) => self.tiers.get(name).unwrap_or(&self.default_policy),
            None => &self.default_policy,
        }
    }

    /// Policy of the configured default tier
    pub fn default_policy(&self) -> &TierPolicy {
        &self.default_policy
    }

    /// Name of the configured default tier
    pub fn default_tier(&self) -> &str {
        &self.default_tier
    }

    /// Number of registered tiers
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Builder for a [`TierRegistry`]
///
/// # Example
///
/// ```
/// use tollgate::{TierPolicy, TierRegistry};
///
/// let tiers = TierRegistry::builder()
///     .tier("free", TierPolicy::new(100, 1.0)?)
///     .tier("premium", TierPolicy::new(1000, 2.0)?)
///     .default_tier("free")
///     .build()?;
///
/// assert_eq!(tiers.resolve(Some("premium")).capacity(), 1000);
/// assert_eq!(tiers.resolve(Some("no-such-tier")).capacity(), 100);
/// # Ok::<(), tollgate::PolicyError>(())
/// ```
#[derive(Debug, Default)]
pub struct TierRegistryBuilder {
    tiers: HashMap<String, TierPolicy>,
    default_tier: Option<String>,
}

impl TierRegistryBuilder {
    /// Create a new builder with no tiers registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tier; a repeated name replaces the earlier policy
    pub fn tier(mut self, name: impl Into<String>, policy: TierPolicy) -> Self {
        self.tiers.insert(name.into(), policy);
        self
    }

    /// Name the tier applied when a request carries no (or an unknown) tier
    pub fn default_tier(mut self, name: impl Into<String>) -> Self {
        self.default_tier = Some(name.into());
        self
    }

    /// Build the registry
    ///
    /// # Errors
    ///
    /// Fails when no default tier was named, or the named default is not
    /// among the registered tiers.
    pub fn build(self) -> Result<TierRegistry, PolicyError> {
        let default_tier = self.default_tier.ok_or(PolicyError::MissingDefaultTier)?;
        let default_policy = *self
            .tiers
            .get(&default_tier)
            .ok_or_else(|| PolicyError::UnknownDefaultTier(default_tier.clone()))?;

        Ok(TierRegistry {
            tiers: self.tiers,
            default_tier,
            default_policy,
        })
    }
}
