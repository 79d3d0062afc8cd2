//! Control Blocks
//!
//! Out-of-band accounting metadata shared by every [`SharedHandle`] and
//! [`WeakHandle`] in one ownership family.
//!
//! ## Design
//!
//! A control block tracks two counts:
//!
//! - **strong**: number of owning references; the managed object is alive
//!   iff this is greater than zero.
//! - **weak**: number of observer references, plus one unit held
//!   collectively by all strong references. The block itself is alive iff
//!   this is greater than zero.
//!
//! The collective-weak convention means there is exactly one teardown rule
//! per count kind, unified in [`release`]: dropping the last strong
//! reference destroys the object and then releases the collective weak
//! unit; dropping the last weak unit frees the block. This stays correct
//! even when the managed object's own destructor drops weak handles to the
//! same block (the `SelfRef` back-reference), because the collective unit
//! keeps the block allocated until object destruction has fully finished.
//!
//! Two concrete blocks exist and the set is closed:
//!
//! - [`PointerBlock`]: the object was allocated independently; the block
//!   stores the raw pointer and drops the `Box` on demand. Two heap
//!   allocations per family.
//! - [`InlineBlock`]: the object lives inside the block's own storage,
//!   collapsing the family into a single heap allocation. Used by the
//!   [`SharedHandle::new`] factory.
//!
//! [`SharedHandle`]: crate::shared::SharedHandle
//! [`SharedHandle::new`]: crate::shared::SharedHandle::new
//! [`WeakHandle`]: crate::weak::WeakHandle

use std::cell::{Cell, UnsafeCell};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::stats;

/// Shorthand for an erased pointer to a live control block.
pub(crate) type BlockPtr = NonNull<dyn ControlBlock>;

/// Which kind of reference is being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    /// An owning reference (one `SharedHandle`).
    Strong,
    /// An observer reference (one `WeakHandle`, a `SelfRef` slot, or the
    /// collective unit held by all strong references).
    Weak,
}

/// Capability set shared by the two concrete blocks.
///
/// Object-safe on purpose: handles store a type-erased `dyn ControlBlock`
/// pointer so that aliased handles over different element types can share
/// one block.
pub(crate) trait ControlBlock {
    /// Current strong count.
    fn strong(&self) -> usize;

    /// Current weak count (including the collective strong unit).
    fn weak(&self) -> usize;

    /// Add one strong reference.
    fn inc_strong(&self);

    /// Add one weak reference.
    fn inc_weak(&self);

    /// Remove one strong reference, returning the new count.
    fn dec_strong(&self) -> usize;

    /// Remove one weak reference, returning the new count.
    fn dec_weak(&self) -> usize;

    /// Destroy the managed object.
    ///
    /// # Safety
    ///
    /// Must be called exactly once per block, at the transition of the
    /// strong count to zero. No reference to the object may exist.
    unsafe fn destroy_object(&self);
}

/// Plain non-atomic reference counts.
///
/// New families start with one strong reference (the constructing handle)
/// and one weak reference (held collectively by all strong references).
pub(crate) struct Counts {
    strong: Cell<usize>,
    weak: Cell<usize>,
}

impl Counts {
    fn new() -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(1),
        }
    }

    fn strong(&self) -> usize {
        self.strong.get()
    }

    fn weak(&self) -> usize {
        self.weak.get()
    }

    fn inc_strong(&self) {
        debug_assert!(self.strong.get() > 0, "revived a dead strong count");
        debug_assert!(self.strong.get() < usize::MAX, "strong count overflow");
        self.strong.set(self.strong.get() + 1);
    }

    fn inc_weak(&self) {
        debug_assert!(self.weak.get() < usize::MAX, "weak count overflow");
        self.weak.set(self.weak.get() + 1);
    }

    fn dec_strong(&self) -> usize {
        debug_assert!(self.strong.get() > 0, "strong count underflow");
        let next = self.strong.get() - 1;
        self.strong.set(next);
        next
    }

    fn dec_weak(&self) -> usize {
        debug_assert!(self.weak.get() > 0, "weak count underflow");
        let next = self.weak.get() - 1;
        self.weak.set(next);
        next
    }
}

// ============================================================================
// PointerBlock - object allocated independently of its accounting
// ============================================================================

/// Block for an object adopted from an existing heap allocation.
pub(crate) struct PointerBlock<T: ?Sized> {
    counts: Counts,
    ptr: *mut T,
}

impl<T: ?Sized> ControlBlock for PointerBlock<T> {
    fn strong(&self) -> usize {
        self.counts.strong()
    }

    fn weak(&self) -> usize {
        self.counts.weak()
    }

    fn inc_strong(&self) {
        self.counts.inc_strong();
    }

    fn inc_weak(&self) {
        self.counts.inc_weak();
    }

    fn dec_strong(&self) -> usize {
        self.counts.dec_strong()
    }

    fn dec_weak(&self) -> usize {
        self.counts.dec_weak()
    }

    unsafe fn destroy_object(&self) {
        // SAFETY: `ptr` came from `Box::into_raw` in `new_pointer`, and the
        // caller guarantees this runs exactly once with no references alive.
        drop(unsafe { Box::from_raw(self.ptr) });
    }
}

// ============================================================================
// InlineBlock - object embedded in the block storage
// ============================================================================

/// Block whose storage embeds the managed object, so one allocation covers
/// both the object and its accounting.
///
/// The slot is `MaybeUninit` because the value dies (at strong count zero)
/// before the block does (at weak count zero); dropping the block must not
/// drop the value a second time.
pub(crate) struct InlineBlock<T> {
    counts: Counts,
    slot: UnsafeCell<MaybeUninit<T>>,
}

impl<T> InlineBlock<T> {
    fn object_ptr(&self) -> *mut T {
        self.slot.get().cast::<T>()
    }
}

impl<T> ControlBlock for InlineBlock<T> {
    fn strong(&self) -> usize {
        self.counts.strong()
    }

    fn weak(&self) -> usize {
        self.counts.weak()
    }

    fn inc_strong(&self) {
        self.counts.inc_strong();
    }

    fn inc_weak(&self) {
        self.counts.inc_weak();
    }

    fn dec_strong(&self) -> usize {
        self.counts.dec_strong()
    }

    fn dec_weak(&self) -> usize {
        self.counts.dec_weak()
    }

    unsafe fn destroy_object(&self) {
        // SAFETY: the slot was initialized at construction, and the caller
        // guarantees this runs exactly once with no references alive.
        unsafe { std::ptr::drop_in_place(self.object_ptr()) };
    }
}

// ============================================================================
// Allocation and release
// ============================================================================

/// Allocate a block for an independently allocated object.
///
/// `ptr` must be non-null and valid for deletion via `Box::from_raw`; the
/// handle constructors uphold this.
pub(crate) fn new_pointer<T: ?Sized + 'static>(ptr: *mut T) -> BlockPtr {
    let block: Box<dyn ControlBlock> = Box::new(PointerBlock {
        counts: Counts::new(),
        ptr,
    });
    let raw = Box::into_raw(block);
    stats::record_block_allocated();
    log::trace!("pointer block allocated at {:p}", raw);
    // SAFETY: Box::into_raw never returns null.
    unsafe { NonNull::new_unchecked(raw) }
}

/// Allocate a block with the object embedded in it.
///
/// Returns the erased block pointer and a typed pointer into the embedded
/// storage.
pub(crate) fn new_inline<T: 'static>(value: T) -> (BlockPtr, NonNull<T>) {
    let block: Box<InlineBlock<T>> = Box::new(InlineBlock {
        counts: Counts::new(),
        slot: UnsafeCell::new(MaybeUninit::new(value)),
    });
    let raw = Box::into_raw(block);
    // SAFETY: `raw` points to the live block just leaked out of the Box.
    let object = unsafe { NonNull::new_unchecked((*raw).object_ptr()) };
    stats::record_block_allocated();
    log::trace!("inline block allocated at {:p}", raw);
    // SAFETY: Box::into_raw never returns null.
    (unsafe { NonNull::new_unchecked(raw as *mut dyn ControlBlock) }, object)
}

/// Release one reference of the given kind and react to count transitions.
///
/// This is the single teardown path for the whole crate: handle destructors,
/// `reset`, and the collective strong-side weak unit all funnel through it.
///
/// # Safety
///
/// The caller must actually hold a reference of the given kind on `block`,
/// and must not use `block` afterwards.
pub(crate) unsafe fn release(block: BlockPtr, kind: RefKind) {
    match kind {
        RefKind::Strong => {
            // SAFETY: the caller's strong reference keeps the block alive.
            let remaining = unsafe { block.as_ref().dec_strong() };
            if remaining == 0 {
                // SAFETY: strong count just hit zero; exactly-once by the
                // strictly ordered single-threaded count mutations.
                unsafe { block.as_ref().destroy_object() };
                stats::record_object_destroyed();
                log::trace!("object destroyed for block at {:p}", block.as_ptr());
                // SAFETY: releasing the weak unit held collectively by the
                // strong references, after object destruction has finished.
                unsafe { release(block, RefKind::Weak) };
            }
        }
        RefKind::Weak => {
            // SAFETY: the caller's weak reference keeps the block alive.
            let remaining = unsafe { block.as_ref().dec_weak() };
            if remaining == 0 {
                stats::record_block_freed();
                log::trace!("block freed at {:p}", block.as_ptr());
                // SAFETY: both counts are zero, so this pointer is the only
                // remaining way to reach the block.
                drop(unsafe { Box::from_raw(block.as_ptr()) });
            }
        }
    }
}
