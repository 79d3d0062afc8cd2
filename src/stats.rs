//! Allocation Accounting
//!
//! Global counters over control-block traffic, for tests and embedders
//! that want to observe allocation behavior: the single-allocation factory
//! path is visible here as one block allocation where the adopt path costs
//! a block plus the adopted object.
//!
//! Counters are monotonic totals; [`live_blocks`] derives the current
//! population. They are atomics only so the accessors stay callable from
//! any thread (the handles themselves are single-threaded).

use std::sync::atomic::{AtomicUsize, Ordering};

static BLOCKS_ALLOCATED: AtomicUsize = AtomicUsize::new(0);
static BLOCKS_FREED: AtomicUsize = AtomicUsize::new(0);
static OBJECTS_DESTROYED: AtomicUsize = AtomicUsize::new(0);

/// Total control blocks ever allocated.
pub fn blocks_allocated() -> usize {
    BLOCKS_ALLOCATED.load(Ordering::Relaxed)
}

/// Total control blocks ever freed.
pub fn blocks_freed() -> usize {
    BLOCKS_FREED.load(Ordering::Relaxed)
}

/// Total managed objects ever destroyed.
pub fn objects_destroyed() -> usize {
    OBJECTS_DESTROYED.load(Ordering::Relaxed)
}

/// Control blocks currently alive.
pub fn live_blocks() -> usize {
    blocks_allocated().saturating_sub(blocks_freed())
}

pub(crate) fn record_block_allocated() {
    BLOCKS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_block_freed() {
    BLOCKS_FREED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_object_destroyed() {
    OBJECTS_DESTROYED.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SharedHandle;

    #[test]
    fn test_counters_move_with_family_lifecycle() {
        let allocated_before = blocks_allocated();
        let destroyed_before = objects_destroyed();
        let freed_before = blocks_freed();

        let handle = SharedHandle::new(0u64);
        assert!(blocks_allocated() >= allocated_before + 1);
        drop(handle);
        assert!(objects_destroyed() >= destroyed_before + 1);
        assert!(blocks_freed() >= freed_before + 1);
    }
}
