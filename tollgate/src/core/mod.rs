//! Core components of the tollgate admission library
//!
//! This module contains the fundamental building blocks:
//! - [`policy`]: tier policies and the registry that resolves them
//! - [`key`]: collision-resistant bucket key composition
//! - [`bucket`]: persisted bucket state and the refill arithmetic
//! - [`store`]: atomic storage backends for bucket state
//! - [`engine`]: the token bucket decision engine
//! - [`admission`]: the per-request entry point with fallback handling

pub mod admission;
pub mod bucket;
pub mod engine;
pub mod key;
pub mod policy;
pub mod store;

#[cfg(test)]
mod tests;

pub use admission::{AdmissionControl, FallbackPolicy};
pub use bucket::BucketState;
pub use engine::{Decision, EngineError, TokenBucketEngine};
pub use key::BucketKey;
pub use policy::{PolicyError, TierPolicy, TierRegistry, TierRegistryBuilder};
pub use store::{
    AdaptiveStore, AdaptiveStoreBuilder, PeriodicStore, PeriodicStoreBuilder, StateStore,
    StoreError, VersionedState,
};
