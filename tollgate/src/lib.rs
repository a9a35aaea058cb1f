//! # Tollgate
//!
//! Tiered token bucket admission control for Rust.
//!
//! ## Overview
//!
//! Tollgate answers one question per incoming request: is this principal,
//! on this resource, currently allowed to proceed — and if not, when may
//! it retry? It provides:
//!
//! - **Token bucket semantics**: capacity-bounded tokens refill over time
//!   at a fixed rate and are consumed one per admitted request
//! - **Tiered policies**: capacity and refill rate resolved per named tier,
//!   with a default-tier fallback that never fails a request
//! - **Atomic accounting**: every decision is one read plus one
//!   compare-and-swap commit, so concurrent callers can never both spend
//!   the same token
//! - **Degraded-mode fallback**: a configurable fail-open or fail-closed
//!   answer when the state store cannot be consulted
//!
//! ## Quick Start
//!
//! ```
//! use tollgate::{AdmissionControl, FallbackPolicy, PeriodicStore, TierPolicy, TierRegistry};
//! use std::time::{Duration, SystemTime};
//!
//! let tiers = TierRegistry::builder()
//!     .tier("free", TierPolicy::new(100, 1.0)?)
//!     .tier("premium", TierPolicy::new(1000, 2.0)?)
//!     .default_tier("free")
//!     .build()?;
//!
//! let mut admission = AdmissionControl::new(
//!     PeriodicStore::new(),
//!     tiers,
//!     Duration::from_secs(3600),
//!     FallbackPolicy::FailOpen,
//! );
//!
//! let decision = admission.admit("user:42", "/search", Some("premium"), SystemTime::now());
//!
//! if decision.allowed {
//!     println!("Request allowed! Remaining: {}", decision.remaining);
//! } else {
//!     println!("Rate limited! Retry after: {} seconds", decision.retry_after.as_secs());
//! }
//! # Ok::<(), tollgate::PolicyError>(())
//! ```
//!
//! ## Store Types
//!
//! Bucket state lives behind the [`StateStore`] port — an atomic
//! compare-and-swap-with-expiry contract. Two in-memory adapters ship with
//! the crate:
//!
//! ### [`PeriodicStore`]
//! Sweeps expired buckets at a fixed interval. Best for steady workloads.
//!
//! ```
//! use tollgate::PeriodicStore;
//!
//! let store = PeriodicStore::builder()
//!     .capacity(100_000)
//!     .cleanup_interval(std::time::Duration::from_secs(300))
//!     .build();
//! ```
//!
//! ### [`AdaptiveStore`]
//! Adjusts sweep frequency to the observed expiry rate. Best for variable
//! workloads.
//!
//! ```
//! use tollgate::AdaptiveStore;
//!
//! let store = AdaptiveStore::builder()
//!     .capacity(1_000_000)
//!     .min_interval(std::time::Duration::from_secs(5))
//!     .max_interval(std::time::Duration::from_secs(300))
//!     .build();
//! ```
//!
//! ## Lower-level access
//!
//! [`AdmissionControl`] is the per-request entry point. When you already
//! hold a resolved [`TierPolicy`] and want the raw decision algorithm,
//! [`TokenBucketEngine`] exposes it directly:
//!
//! ```
//! use tollgate::{BucketKey, PeriodicStore, TierPolicy, TokenBucketEngine};
//! use std::time::{Duration, SystemTime};
//!
//! let mut engine = TokenBucketEngine::new(PeriodicStore::new(), Duration::from_secs(3600));
//! let key = BucketKey::new("api_key_12345", "/upload");
//! let policy = TierPolicy::new(50, 0.5)?;
//!
//! let decision = engine.check(&key, &policy, SystemTime::now())?;
//! assert!(decision.allowed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Thread Safety
//!
//! The admission facade is not thread-safe; it assumes a single owner of
//! the store (an actor task, or a mutex in simple setups). Different keys
//! are fully independent, so sharding across several facades with disjoint
//! key spaces is safe.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster store hashing

pub mod core;

pub use crate::core::{
    AdaptiveStore, AdaptiveStoreBuilder, AdmissionControl, BucketKey, BucketState, Decision,
    EngineError, FallbackPolicy, PeriodicStore, PeriodicStoreBuilder, PolicyError, StateStore,
    StoreError, TierPolicy, TierRegistry, TierRegistryBuilder, TokenBucketEngine, VersionedState,
};
