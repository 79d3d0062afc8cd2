//! Integration tests for the shared/weak ownership subsystem.
//!
//! These exercise the public contract only: observable counts, equality,
//! expiration, destruction ordering, and allocation accounting.

use std::cell::Cell;
use std::rc::Rc;

use tether::{stats, BrokenWeakError, SelfAware, SelfRef, SharedHandle, WeakHandle};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Payload that tallies how many times it was dropped.
struct DropTally(Rc<Cell<usize>>);

impl Drop for DropTally {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn use_count_tracks_live_strong_handles() {
    init_logging();
    let a = SharedHandle::new(7u32);
    assert_eq!(a.strong_count(), 1);
    let b = a.clone();
    let c = b.clone();
    assert_eq!(a.strong_count(), 3);
    drop(b);
    assert_eq!(a.strong_count(), 2);
    let mut d = c.clone();
    d.reset();
    assert_eq!(a.strong_count(), 2);
    drop(c);
    assert_eq!(a.strong_count(), 1);
}

#[test]
fn object_dies_with_last_strong_while_weaks_remain() {
    let drops = Rc::new(Cell::new(0));
    let strong = SharedHandle::new(DropTally(drops.clone()));
    let w1 = strong.downgrade();
    let w2 = w1.clone();

    assert_eq!(drops.get(), 0);
    drop(strong);
    // Destructor ran exactly once, at the last strong release.
    assert_eq!(drops.get(), 1);

    // The block still answers queries for the surviving observers.
    assert!(w1.expired());
    assert_eq!(w2.strong_count(), 0);
    drop(w1);
    assert!(w2.expired());
    drop(w2);
    assert_eq!(drops.get(), 1);
}

#[test]
fn block_freed_exactly_once_after_last_weak() {
    let freed_before = stats::blocks_freed();
    let strong = SharedHandle::new(0u8);
    let weak = strong.downgrade();
    drop(strong);
    drop(weak);
    assert!(stats::blocks_freed() >= freed_before + 1);
    // Totals stay balanced: nothing leaks and nothing frees twice.
    assert!(stats::blocks_freed() <= stats::blocks_allocated());
}

#[test]
fn aliasing_observes_member_and_keeps_whole_alive() {
    struct Record {
        header: u16,
        body: Vec<u8>,
    }
    let drops = Rc::new(Cell::new(0));
    struct Wrapped(Record, DropTally);

    let whole = SharedHandle::new(Wrapped(
        Record {
            header: 0xBEEF,
            body: vec![1, 2, 3],
        },
        DropTally(drops.clone()),
    ));
    let header = whole.project(|w| &w.0.header).unwrap();
    let body = whole.project(|w| &w.0.body).unwrap();
    assert_eq!(whole.strong_count(), 3);

    drop(whole);
    assert_eq!(drops.get(), 0, "aliases must keep the whole object alive");
    assert_eq!(header.as_ref(), Some(&0xBEEF));
    drop(header);
    assert_eq!(body.as_ref().map(Vec::len), Some(3));
    drop(body);
    assert_eq!(drops.get(), 1);
}

#[test]
fn promotion_before_and_after_expiry() {
    let strong = SharedHandle::new(String::from("live"));
    let weak = strong.downgrade();

    // While the source is alive: equal by observed pointer.
    let locked = weak.lock().unwrap();
    assert_eq!(locked, strong);
    let promoted = SharedHandle::try_from(&weak).unwrap();
    assert_eq!(promoted, strong);

    drop(locked);
    drop(promoted);
    drop(strong);

    // After the source is gone: empty result and broken-weak error.
    assert!(weak.lock().is_none());
    assert_eq!(SharedHandle::try_from(&weak), Err(BrokenWeakError));
}

#[test]
fn promotion_of_moved_from_family_still_works() {
    let strong = SharedHandle::new(5u32);
    let weak = strong.downgrade();
    let moved = strong; // move, no count change
    assert_eq!(weak.strong_count(), 1);
    assert_eq!(weak.lock().unwrap(), moved);
}

// ============================================================================
// SelfAware round trips
// ============================================================================

struct Sensor {
    self_ref: SelfRef<Sensor>,
    id: u32,
}

impl Sensor {
    fn new(id: u32) -> Self {
        Self {
            self_ref: SelfRef::new(),
            id,
        }
    }
}

impl SelfAware for Sensor {
    fn self_ref(&self) -> &SelfRef<Sensor> {
        &self.self_ref
    }
}

trait Device {
    fn device_id(&self) -> u32;
    fn handle(&self) -> SharedHandle<dyn Device>;
}

impl Device for Sensor {
    fn device_id(&self) -> u32 {
        self.id
    }

    fn handle(&self) -> SharedHandle<dyn Device> {
        self.shared_self()
            .map(|h| h.project(|s| s as &dyn Device).unwrap())
            .unwrap_or_default()
    }
}

#[test]
fn self_awareness_round_trip_both_paths() {
    for handle in [
        SharedHandle::new_bound(Sensor::new(1)),
        SharedHandle::adopt_bound(Box::new(Sensor::new(1))),
    ] {
        let object = handle.as_ref().unwrap();
        let again = object.shared_self().unwrap();
        assert_eq!(again, handle);
        assert_eq!(handle.strong_count(), 2);
        assert_eq!(object.weak_self().lock().unwrap(), handle);
    }
}

#[test]
fn self_awareness_through_upcast_handle() {
    let concrete = SharedHandle::new_bound(Sensor::new(9));
    let upcast: SharedHandle<dyn Device> = concrete.project(|s| s as &dyn Device).unwrap();
    // The object reached through the trait-object handle can still hand out
    // a handle to itself, observing the same address.
    let from_base = upcast.as_ref().unwrap().handle();
    assert_eq!(from_base, upcast);
    assert_eq!(from_base.as_ref().unwrap().device_id(), 9);
    assert_eq!(concrete.strong_count(), 3);
}

#[test]
fn weak_self_is_total_even_when_unbound() {
    let loose = Sensor::new(2);
    let weak = loose.weak_self();
    assert!(weak.expired());
    assert!(weak.lock().is_none());
    assert_eq!(loose.shared_self().unwrap_err(), BrokenWeakError);
}

// ============================================================================
// Allocation accounting
// ============================================================================

#[test]
fn factory_embeds_object_adopt_does_not() {
    init_logging();
    let allocated_before = stats::blocks_allocated();

    // Both paths cost exactly one control block...
    let factory = SharedHandle::new([0u64; 4]);
    let adopted = SharedHandle::adopt(Box::new([0u64; 4]));
    assert!(stats::blocks_allocated() >= allocated_before + 2);

    // ...but only the adopt path pays for a second object allocation, so
    // the two observed pointers cannot be equal or adjacent bookkeeping.
    assert_ne!(factory, adopted);

    let destroyed_before = stats::objects_destroyed();
    drop(factory);
    drop(adopted);
    assert!(stats::objects_destroyed() >= destroyed_before + 2);
}

#[test]
fn family_of_weaks_teardown_is_balanced() {
    let strong = SharedHandle::new(vec![0u8; 32]);
    let weaks: Vec<WeakHandle<Vec<u8>>> = (0..8).map(|_| strong.downgrade()).collect();
    drop(strong);
    for weak in &weaks {
        assert!(weak.expired());
    }
    drop(weaks);
    assert!(stats::blocks_freed() <= stats::blocks_allocated());
}
