//! Factory wiring configuration into a running admission actor
//!
//! Builds the tier registry, the configured bucket store, the admission
//! facade, and finally the actor that owns them.
//!
//! # Store Types
//!
//! ## Periodic Store
//! - Sweeps expired buckets at fixed intervals
//! - Predictable memory usage patterns
//! - Best for: consistent workloads with predictable traffic
//!
//! ## Adaptive Store
//! - Sweep frequency adjusts based on load
//! - Balances performance and memory usage
//! - Best for: workloads with varying traffic patterns

use crate::actor::{AdmissionActor, AdmissionHandle};
use crate::config::{Config, FallbackMode, StoreType};
use anyhow::{Context, Result};
use std::time::Duration;
use tollgate::{
    AdaptiveStore, AdmissionControl, FallbackPolicy, PeriodicStore, TierPolicy, TierRegistry,
};

/// Build the tier registry from the configured tier specs
///
/// # Errors
///
/// Fails when a tier carries invalid policy values (negative capacity,
/// non-positive refill rate) or the default tier is not registered —
/// all fatal at startup.
pub fn build_registry(config: &Config) -> Result<TierRegistry> {
    let mut builder = TierRegistry::builder();

    for spec in &config.limits.tiers {
        let policy = TierPolicy::new(spec.capacity, spec.refill_rate)
            .with_context(|| format!("invalid policy for tier {:?}", spec.name))?;
        builder = builder.tier(spec.name.as_str(), policy);
    }

    builder
        .default_tier(config.limits.default_tier.as_str())
        .build()
        .context("failed to build tier registry")
}

/// Create an admission actor with the configured store
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env_and_args()?;
/// let limiter = create_admission(&config)?;
/// let response = limiter.check(request).await?;
/// ```
pub fn create_admission(config: &Config) -> Result<AdmissionHandle> {
    let tiers = build_registry(config)?;

    let fallback = match config.limits.fallback {
        FallbackMode::FailOpen => FallbackPolicy::FailOpen,
        FallbackMode::FailClosed => FallbackPolicy::FailClosed {
            retry_after: config.limits.fallback_retry_after,
        },
    };

    let handle = match config.store.store_type {
        StoreType::Periodic => {
            let store = PeriodicStore::builder()
                .capacity(config.store.capacity)
                .cleanup_interval(Duration::from_secs(config.store.cleanup_interval))
                .build();
            AdmissionActor::spawn_periodic(
                config.buffer_size,
                AdmissionControl::new(store, tiers, config.limits.idle_ttl, fallback),
            )
        }
        StoreType::Adaptive => {
            let store = AdaptiveStore::builder()
                .capacity(config.store.capacity)
                .min_interval(Duration::from_secs(config.store.min_interval))
                .max_interval(Duration::from_secs(config.store.max_interval))
                .max_operations(config.store.max_operations)
                .build();
            AdmissionActor::spawn_adaptive(
                config.buffer_size,
                AdmissionControl::new(store, tiers, config.limits.idle_ttl, fallback),
            )
        }
    };

    Ok(handle)
}
