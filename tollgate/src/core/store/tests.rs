use std::time::{Duration, SystemTime};

use super::{AdaptiveStore, PeriodicStore, StateStore};
use crate::core::bucket::BucketState;

const TTL: Duration = Duration::from_secs(10);

fn state(tokens: f64, at: SystemTime) -> BucketState {
    BucketState {
        tokens,
        last_refill: at,
    }
}

/// Contract every store adapter must satisfy
fn atomic_contract_suite<S: StateStore>(mut store: S) {
    let t0 = SystemTime::now();

    // Fresh key reads as absent
    assert!(store.get("k", t0).unwrap().is_none());

    // Creation succeeds once, then loses to the existing live entry
    assert!(
        store
            .set_if_not_exists_with_ttl("k", state(5.0, t0), TTL, t0)
            .unwrap()
    );
    assert!(
        !store
            .set_if_not_exists_with_ttl("k", state(9.0, t0), TTL, t0)
            .unwrap()
    );

    let read = store.get("k", t0).unwrap().unwrap();
    assert_eq!(read.state.tokens, 5.0);
    assert_eq!(read.version, 0);

    // CAS against the current version commits and bumps the version
    assert!(
        store
            .compare_and_swap_with_ttl("k", 0, state(4.0, t0), TTL, t0)
            .unwrap()
    );
    let read = store.get("k", t0).unwrap().unwrap();
    assert_eq!(read.state.tokens, 4.0);
    assert_eq!(read.version, 1);

    // CAS against a stale version must fail and leave the entry untouched
    assert!(
        !store
            .compare_and_swap_with_ttl("k", 0, state(99.0, t0), TTL, t0)
            .unwrap()
    );
    let read = store.get("k", t0).unwrap().unwrap();
    assert_eq!(read.state.tokens, 4.0);

    // CAS on an unknown key fails rather than creating it
    assert!(
        !store
            .compare_and_swap_with_ttl("missing", 0, state(1.0, t0), TTL, t0)
            .unwrap()
    );
    assert!(store.get("missing", t0).unwrap().is_none());

    // Expiry: past the TTL the entry reads as absent and CAS fails
    let expired_at = t0 + TTL + Duration::from_secs(1);
    assert!(store.get("k", expired_at).unwrap().is_none());
    assert!(
        !store
            .compare_and_swap_with_ttl("k", 1, state(3.0, expired_at), TTL, expired_at)
            .unwrap()
    );

    // An expired key can be recreated, with its version reset
    assert!(
        store
            .set_if_not_exists_with_ttl("k", state(7.0, expired_at), TTL, expired_at)
            .unwrap()
    );
    let read = store.get("k", expired_at).unwrap().unwrap();
    assert_eq!(read.state.tokens, 7.0);
    assert_eq!(read.version, 0);
}

#[test]
fn periodic_store_satisfies_the_atomic_contract() {
    atomic_contract_suite(PeriodicStore::new());
}

#[test]
fn adaptive_store_satisfies_the_atomic_contract() {
    atomic_contract_suite(AdaptiveStore::new());
}

#[test]
fn ttl_refreshes_on_every_write() {
    let mut store = PeriodicStore::new();
    let t0 = SystemTime::now();

    store
        .set_if_not_exists_with_ttl("k", state(5.0, t0), TTL, t0)
        .unwrap();

    // A write at t0+5 pushes expiry to t0+15
    let t1 = t0 + Duration::from_secs(5);
    assert!(
        store
            .compare_and_swap_with_ttl("k", 0, state(4.0, t1), TTL, t1)
            .unwrap()
    );

    let t2 = t0 + Duration::from_secs(12);
    assert!(store.get("k", t2).unwrap().is_some());

    let t3 = t0 + Duration::from_secs(16);
    assert!(store.get("k", t3).unwrap().is_none());
}

#[test]
fn round_trip_preserves_bucket_state_fields() {
    let mut store = PeriodicStore::new();
    let t0 = SystemTime::now();
    let written = state(2.75, t0 - Duration::from_millis(1500));

    store
        .set_if_not_exists_with_ttl("k", written, TTL, t0)
        .unwrap();
    let read = store.get("k", t0).unwrap().unwrap();
    assert_eq!(read.state, written);
}

#[test]
fn periodic_cleanup_sweeps_expired_entries() {
    let mut store = PeriodicStore::builder()
        .cleanup_interval(Duration::from_secs(1))
        .build();
    let t0 = SystemTime::now();

    for i in 0..3 {
        let key = format!("stale:{i}");
        store
            .set_if_not_exists_with_ttl(&key, state(1.0, t0), Duration::from_secs(1), t0)
            .unwrap();
    }
    assert_eq!(store.len(), 3);

    // Past both the entries' TTL and the sweep interval, the next write
    // triggers a sweep that drops all three
    let t1 = t0 + Duration::from_secs(120);
    store
        .set_if_not_exists_with_ttl("fresh", state(1.0, t1), TTL, t1)
        .unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.expired_count(), 3);
}

#[test]
fn adaptive_cleanup_triggers_on_operation_pressure() {
    let mut store = AdaptiveStore::builder()
        .capacity(1024)
        .max_operations(5)
        .build();
    let t0 = SystemTime::now();

    for i in 0..3 {
        let key = format!("stale:{i}");
        store
            .set_if_not_exists_with_ttl(&key, state(1.0, t0), Duration::from_secs(1), t0)
            .unwrap();
    }
    assert_eq!(store.len(), 3);

    // Writes past the operation budget force a sweep even before the
    // timed trigger fires
    let t1 = t0 + Duration::from_secs(2);
    for i in 0..5 {
        let key = format!("fresh:{i}");
        store
            .set_if_not_exists_with_ttl(&key, state(1.0, t1), TTL, t1)
            .unwrap();
    }
    assert!(store.len() <= 5, "stale entries were never swept");
}
