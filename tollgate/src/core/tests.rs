use std::time::{Duration, SystemTime};

use super::admission::{AdmissionControl, FallbackPolicy};
use super::bucket::BucketState;
use super::engine::{EngineError, TokenBucketEngine};
use super::key::BucketKey;
use super::policy::{TierPolicy, TierRegistry};
use super::store::{PeriodicStore, StateStore, StoreError, VersionedState};

const TTL: Duration = Duration::from_secs(3600);

fn policy(capacity: i64, refill_rate: f64) -> TierPolicy {
    TierPolicy::new(capacity, refill_rate).unwrap()
}

fn engine() -> TokenBucketEngine<PeriodicStore> {
    TokenBucketEngine::new(PeriodicStore::new(), TTL)
}

fn registry(capacity: i64, refill_rate: f64) -> TierRegistry {
    TierRegistry::builder()
        .tier("standard", policy(capacity, refill_rate))
        .default_tier("standard")
        .build()
        .unwrap()
}

#[test]
fn first_check_starts_from_a_full_bucket() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let now = SystemTime::now();

    let decision = engine.check(&key, &policy(5, 1.0), now).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit, 5);
    assert_eq!(decision.remaining, 4.0);
    assert_eq!(decision.retry_after, Duration::ZERO);
    assert!(!decision.degraded);
}

#[test]
fn burst_drains_to_rejection() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(3, 1.0);
    let now = SystemTime::now();

    for expected_remaining in [2.0, 1.0, 0.0] {
        let decision = engine.check(&key, &tier, now).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected_remaining);
    }

    let decision = engine.check(&key, &tier, now).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.0);
    assert_eq!(decision.retry_after, Duration::from_secs(1));
}

#[test]
fn hundred_calls_in_one_second_then_reject() {
    let mut engine = engine();
    let key = BucketKey::new("user:42", "/api");
    let tier = policy(100, 1.0);
    let now = SystemTime::now();

    for i in 0..100 {
        let decision = engine.check(&key, &tier, now).unwrap();
        assert!(decision.allowed, "call {} should be admitted", i + 1);
        assert_eq!(decision.remaining, (99 - i) as f64);
    }

    let decision = engine.check(&key, &tier, now).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.0);
    assert_eq!(decision.retry_after, Duration::from_secs(1));
}

#[test]
fn backwards_clock_never_adds_tokens() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(2, 1.0);
    let base = SystemTime::now();

    let decision = engine.check(&key, &tier, base).unwrap();
    assert_eq!(decision.remaining, 1.0);

    // A reading 5 seconds behind the stored timestamp clamps elapsed to
    // zero: the one remaining token is spent, nothing is refilled.
    let earlier = base - Duration::from_secs(5);
    let decision = engine.check(&key, &tier, earlier).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 0.0);

    let decision = engine.check(&key, &tier, earlier).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.0);
}

#[test]
fn refill_arithmetic_is_exact() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(10, 0.5);
    let start = SystemTime::now();

    // Drain the bucket with admitted calls only
    for _ in 0..10 {
        assert!(engine.check(&key, &tier, start).unwrap().allowed);
    }

    // n tokens accrue after n / refill_rate seconds: 4 tokens in 8 s
    let later = start + Duration::from_secs(8);
    let decision = engine.check(&key, &tier, later).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 3.0);
}

#[test]
fn long_idle_refill_is_bounded_by_capacity() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(10, 1.0);
    let start = SystemTime::now();

    for _ in 0..10 {
        assert!(engine.check(&key, &tier, start).unwrap().allowed);
    }

    // Weeks of idle time still cap at capacity
    let later = start + Duration::from_secs(3_000_000);
    let decision = engine.check(&key, &tier, later).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 9.0);
}

#[test]
fn tier_downgrade_clamps_on_the_next_check() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let big = policy(100, 1.0);
    let now = SystemTime::now();

    // Spend half the big tier's capacity, leaving 50 tokens
    for _ in 0..50 {
        assert!(engine.check(&key, &big, now).unwrap().allowed);
    }

    // The same bucket checked under a downgraded tier clamps immediately
    let small = policy(10, 1.0);
    let decision = engine.check(&key, &small, now).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit, 10);
    assert_eq!(decision.remaining, 9.0);
}

#[test]
fn rejection_advances_the_refill_timestamp() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(2, 0.1);
    let t0 = SystemTime::now();

    assert!(engine.check(&key, &tier, t0).unwrap().allowed);
    assert!(engine.check(&key, &tier, t0).unwrap().allowed);

    // Rejected at t0+5s with 0.5 tokens accrued; the rejection persists
    // both the partial refill and the new timestamp.
    let t1 = t0 + Duration::from_secs(5);
    let decision = engine.check(&key, &tier, t1).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.5);
    assert_eq!(decision.retry_after, Duration::from_secs(5));

    // Five more seconds accrue exactly the other half token. If the
    // rejection had not advanced the timestamp, the full t0..t2 interval
    // would be counted twice and 1.5 tokens would appear here.
    let t2 = t0 + Duration::from_secs(10);
    let decision = engine.check(&key, &tier, t2).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 0.0);
}

#[test]
fn immediate_repeat_rejections_do_not_drift() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(1, 0.25);
    let now = SystemTime::now();

    assert!(engine.check(&key, &tier, now).unwrap().allowed);

    let first = engine.check(&key, &tier, now).unwrap();
    let second = engine.check(&key, &tier, now).unwrap();
    assert!(!first.allowed);
    assert!(!second.allowed);
    assert_eq!(first.remaining, second.remaining);
    assert_eq!(first.retry_after, second.retry_after);
}

#[test]
fn tokens_stay_within_bounds_across_jittered_calls() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(5, 2.0);
    let base = SystemTime::now();

    let offsets: [i64; 12] = [0, 3, -2, 7, 7, 1, -10, 40, 0, 2, -1, 15];
    for offset in offsets {
        let now = if offset >= 0 {
            base + Duration::from_secs(offset as u64)
        } else {
            base - Duration::from_secs((-offset) as u64)
        };
        let decision = engine.check(&key, &tier, now).unwrap();
        assert!(decision.remaining >= 0.0);
        assert!(decision.remaining <= 5.0);
    }
}

#[test]
fn zero_capacity_tier_always_rejects() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(0, 1.0);
    let now = SystemTime::now();

    let decision = engine.check(&key, &tier, now).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.0);
    assert_eq!(decision.retry_after, Duration::from_secs(1));
}

#[test]
fn single_initial_token_admits_exactly_one() {
    let mut engine = engine();
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(1, 1e-9);
    let now = SystemTime::now();

    let admitted = (0..5)
        .filter(|_| engine.check(&key, &tier, now).unwrap().allowed)
        .count();
    assert_eq!(admitted, 1);
}

#[test]
fn independent_keys_do_not_interact() {
    let mut engine = engine();
    let tier = policy(1, 1.0);
    let now = SystemTime::now();

    let a = BucketKey::new("user:1", "/search");
    let b = BucketKey::new("user:2", "/search");
    let c = BucketKey::new("user:1", "/upload");

    assert!(engine.check(&a, &tier, now).unwrap().allowed);
    assert!(engine.check(&b, &tier, now).unwrap().allowed);
    assert!(engine.check(&c, &tier, now).unwrap().allowed);
    assert!(!engine.check(&a, &tier, now).unwrap().allowed);
}

/// Wraps a real store and injects a competing writer between the
/// engine's read and its commit, making the commit lose its race.
struct RacingStore {
    inner: PeriodicStore,
    skip_commits: usize,
    interceptions_left: usize,
}

impl RacingStore {
    fn new(skip_commits: usize, interceptions: usize) -> Self {
        RacingStore {
            inner: PeriodicStore::new(),
            skip_commits,
            interceptions_left: interceptions,
        }
    }

    fn should_intercept(&mut self) -> bool {
        if self.skip_commits > 0 {
            self.skip_commits -= 1;
            return false;
        }
        if self.interceptions_left > 0 {
            self.interceptions_left -= 1;
            return true;
        }
        false
    }
}

impl StateStore for RacingStore {
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<VersionedState>, StoreError> {
        self.inner.get(key, now)
    }

    fn compare_and_swap_with_ttl(
        &mut self,
        key: &str,
        expected_version: u64,
        state: BucketState,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<bool, StoreError> {
        if self.should_intercept() {
            // A competing writer spends a token first
            if let Some(current) = self.inner.get(key, now)? {
                let mut stolen = current.state;
                if stolen.tokens >= 1.0 {
                    stolen.tokens -= 1.0;
                }
                stolen.last_refill = now;
                self.inner
                    .compare_and_swap_with_ttl(key, current.version, stolen, ttl, now)?;
            }
        }
        self.inner
            .compare_and_swap_with_ttl(key, expected_version, state, ttl, now)
    }

    fn set_if_not_exists_with_ttl(
        &mut self,
        key: &str,
        state: BucketState,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<bool, StoreError> {
        if self.should_intercept() {
            // A competing writer creates the bucket first, committing the
            // same post-consumption state this caller is about to write
            self.inner.set_if_not_exists_with_ttl(key, state, ttl, now)?;
        }
        self.inner.set_if_not_exists_with_ttl(key, state, ttl, now)
    }
}

#[test]
fn lost_creation_race_is_not_a_double_admission() {
    // capacity 1: the competing writer takes the only token, so our call
    // must retry against the fresher state and reject.
    let mut engine = TokenBucketEngine::new(RacingStore::new(0, 1), TTL);
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(1, 1e-9);

    let decision = engine.check(&key, &tier, SystemTime::now()).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.0);
}

#[test]
fn lost_update_race_is_not_a_double_admission() {
    let mut engine = TokenBucketEngine::new(RacingStore::new(1, 1), TTL);
    let key = BucketKey::new("user:1", "/search");
    let tier = policy(2, 1e-9);
    let now = SystemTime::now();

    // First check commits cleanly, leaving one token
    assert!(engine.check(&key, &tier, now).unwrap().allowed);

    // Second check loses its CAS to the competing writer who took the
    // last token; the retry sees an empty bucket.
    let decision = engine.check(&key, &tier, now).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0.0);
}

/// Store whose commits always lose, as under pathological contention
struct AlwaysContendedStore;

impl StateStore for AlwaysContendedStore {
    fn get(&self, _key: &str, _now: SystemTime) -> Result<Option<VersionedState>, StoreError> {
        Ok(None)
    }

    fn compare_and_swap_with_ttl(
        &mut self,
        _key: &str,
        _expected_version: u64,
        _state: BucketState,
        _ttl: Duration,
        _now: SystemTime,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn set_if_not_exists_with_ttl(
        &mut self,
        _key: &str,
        _state: BucketState,
        _ttl: Duration,
        _now: SystemTime,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Store that cannot be reached at all
struct FailingStore;

impl StateStore for FailingStore {
    fn get(&self, _key: &str, _now: SystemTime) -> Result<Option<VersionedState>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn compare_and_swap_with_ttl(
        &mut self,
        _key: &str,
        _expected_version: u64,
        _state: BucketState,
        _ttl: Duration,
        _now: SystemTime,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn set_if_not_exists_with_ttl(
        &mut self,
        _key: &str,
        _state: BucketState,
        _ttl: Duration,
        _now: SystemTime,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[test]
fn exhausted_contention_surfaces_as_an_engine_error() {
    let mut engine = TokenBucketEngine::new(AlwaysContendedStore, TTL);
    let key = BucketKey::new("user:1", "/search");

    let err = engine
        .check(&key, &policy(10, 1.0), SystemTime::now())
        .unwrap_err();
    assert!(matches!(err, EngineError::ContentionExhausted { .. }));
}

#[test]
fn fail_open_admits_with_degraded_marker() {
    let mut admission = AdmissionControl::new(
        FailingStore,
        registry(100, 1.0),
        TTL,
        FallbackPolicy::FailOpen,
    );

    let decision = admission.admit("user:1", "/search", None, SystemTime::now());
    assert!(decision.allowed);
    assert!(decision.degraded);
    assert_eq!(decision.retry_after, Duration::ZERO);
}

#[test]
fn fail_closed_rejects_with_fixed_retry_after() {
    let mut admission = AdmissionControl::new(
        FailingStore,
        registry(100, 1.0),
        TTL,
        FallbackPolicy::FailClosed {
            retry_after: Duration::from_secs(30),
        },
    );

    let decision = admission.admit("user:1", "/search", None, SystemTime::now());
    assert!(!decision.allowed);
    assert!(decision.degraded);
    assert_eq!(decision.retry_after, Duration::from_secs(30));
}

#[test]
fn exhausted_contention_falls_back_like_unavailability() {
    let mut admission = AdmissionControl::new(
        AlwaysContendedStore,
        registry(100, 1.0),
        TTL,
        FallbackPolicy::FailOpen,
    );

    let decision = admission.admit("user:1", "/search", None, SystemTime::now());
    assert!(decision.allowed);
    assert!(decision.degraded);
}

#[test]
fn facade_resolves_tiers_and_falls_back_to_default() {
    let tiers = TierRegistry::builder()
        .tier("free", policy(2, 1.0))
        .tier("premium", policy(5, 2.0))
        .default_tier("free")
        .build()
        .unwrap();
    let mut admission =
        AdmissionControl::new(PeriodicStore::new(), tiers, TTL, FallbackPolicy::FailOpen);
    let now = SystemTime::now();

    let decision = admission.admit("user:1", "/search", Some("premium"), now);
    assert_eq!(decision.limit, 5);

    // Unknown tier resolves to the default, against the same bucket
    let decision = admission.admit("user:1", "/search", Some("enterprise"), now);
    assert_eq!(decision.limit, 2);

    let decision = admission.admit("user:1", "/search", None, now);
    assert_eq!(decision.limit, 2);
}

#[test]
fn tier_switch_applies_to_the_existing_bucket() {
    let tiers = TierRegistry::builder()
        .tier("free", policy(2, 0.1))
        .tier("premium", policy(100, 1.0))
        .default_tier("free")
        .build()
        .unwrap();
    let mut admission =
        AdmissionControl::new(PeriodicStore::new(), tiers, TTL, FallbackPolicy::FailOpen);
    let now = SystemTime::now();

    // Drain the free tier
    assert!(admission.admit("user:1", "/search", None, now).allowed);
    assert!(admission.admit("user:1", "/search", None, now).allowed);
    let decision = admission.admit("user:1", "/search", None, now);
    assert!(!decision.allowed);
    assert_eq!(decision.retry_after, Duration::from_secs(10));

    // An upgrade takes effect on the same bucket at once: the key carries
    // no tier, so the empty bucket now refills at the premium rate and
    // reports the premium ceiling.
    let decision = admission.admit("user:1", "/search", Some("premium"), now);
    assert!(!decision.allowed);
    assert_eq!(decision.limit, 100);
    assert_eq!(decision.retry_after, Duration::from_secs(1));

    let decision = admission.admit(
        "user:1",
        "/search",
        Some("premium"),
        now + Duration::from_secs(1),
    );
    assert!(decision.allowed);
}
