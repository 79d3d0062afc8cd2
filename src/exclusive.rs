//! Exclusive Ownership Handles
//!
//! [`ExclusiveHandle`] owns exactly one heap allocation and destroys it
//! through a pluggable [`Destroy`] policy when dropped. Ownership moves and
//! never copies; there is no control block and no counting. The pointer and
//! the destroyer live side by side in a [`PairStorage`], so a stateless
//! destroyer costs nothing over a bare pointer.
//!
//! Three storage shapes are covered:
//!
//! - single objects (and trait objects), destroyed by [`DefaultDestroy`];
//! - slices, `ExclusiveHandle<[T]>`, which add indexed access — Rust's
//!   `Box<[T]>` already frees with the right layout, so no separate array
//!   destroyer is needed;
//! - untyped byte storage via [`UntypedHandle`], destroyed by
//!   [`RawDestroy`] with an explicit [`Layout`].
//!
//! # Example
//!
//! ```
//! use tether::ExclusiveHandle;
//!
//! let mut handle = ExclusiveHandle::new(41u32);
//! *handle.as_mut().unwrap() += 1;
//! assert_eq!(handle.as_ref(), Some(&42));
//!
//! let moved = handle;
//! assert_eq!(moved.as_ref(), Some(&42));
//! ```

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use crate::pair::PairStorage;

/// Destruction policy for an [`ExclusiveHandle`].
///
/// `destroy` is handed the pointer the handle owns; what "owns" means is
/// fixed by the constructor that produced the pointer (boxed for
/// [`DefaultDestroy`], raw-allocated for [`RawDestroy`], caller-defined for
/// custom policies built over `from_raw_with`).
pub trait Destroy<T: ?Sized> {
    /// Dispose of the owned allocation.
    fn destroy(&mut self, ptr: NonNull<T>);
}

/// Stateless default policy: the pointer came from `Box::into_raw`.
///
/// Covers single objects, slices, and trait objects alike.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDestroy;

impl<T: ?Sized> Destroy<T> for DefaultDestroy {
    fn destroy(&mut self, ptr: NonNull<T>) {
        // SAFETY: handle constructors using this policy only accept
        // box-originated pointers; `from_raw` shifts that burden to its
        // caller.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

/// Policy for untyped storage: frees raw bytes with the layout they were
/// allocated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDestroy {
    layout: Layout,
}

impl RawDestroy {
    /// Free with the given allocation layout.
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

impl Destroy<u8> for RawDestroy {
    fn destroy(&mut self, ptr: NonNull<u8>) {
        if self.layout.size() > 0 {
            // SAFETY: the handle's construction contract requires the
            // pointer to have been allocated with exactly this layout.
            unsafe { alloc::dealloc(ptr.as_ptr(), self.layout) };
        }
    }
}

/// Exclusive handle over untyped byte storage.
pub type UntypedHandle = ExclusiveHandle<u8, RawDestroy>;

/// A sole-ownership handle with a pluggable destroyer.
///
/// Exactly one handle observes a given pointer at a time; the type system
/// enforces this (no `Clone`, moves invalidate the source). The destructor
/// invokes the destroyer on a non-empty pointer exactly once.
pub struct ExclusiveHandle<T: ?Sized, D: Destroy<T> = DefaultDestroy> {
    data: PairStorage<Option<NonNull<T>>, D>,
}

impl<T> ExclusiveHandle<T> {
    /// Allocate `value` on the heap under exclusive ownership.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> ExclusiveHandle<T> {
    /// Take over an existing boxed allocation.
    pub fn from_box(boxed: Box<T>) -> Self {
        // SAFETY: Box::into_raw never returns null.
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) };
        Self {
            data: PairStorage::new(Some(ptr), DefaultDestroy),
        }
    }

    /// Destroy the current allocation and take over a boxed replacement.
    pub fn reset_boxed(&mut self, boxed: Box<T>) {
        // SAFETY: box-originated pointer matches DefaultDestroy's contract.
        unsafe { self.reset_raw(Box::into_raw(boxed)) };
    }
}

impl<T: ?Sized, D: Destroy<T>> ExclusiveHandle<T, D> {
    /// An empty handle owning nothing.
    pub fn empty() -> Self
    where
        D: Default,
    {
        Self {
            data: PairStorage::new(None, D::default()),
        }
    }

    /// Take over a raw allocation with the policy's default state.
    ///
    /// A null `ptr` yields an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be destroyable by `D`'s default value, and
    /// nothing else may assume ownership of it afterwards.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        D: Default,
    {
        Self {
            data: PairStorage::new(NonNull::new(ptr), D::default()),
        }
    }

    /// Take over a raw allocation together with its destroyer.
    ///
    /// # Safety
    ///
    /// As [`from_raw`](ExclusiveHandle::from_raw), with `destroyer` in place
    /// of the default policy value.
    pub unsafe fn from_raw_with(ptr: *mut T, destroyer: D) -> Self {
        Self {
            data: PairStorage::new(NonNull::new(ptr), destroyer),
        }
    }

    /// The owned pointer, if any.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        *self.data.first()
    }

    /// Borrow the owned object, if any.
    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: a stored pointer is owned and alive until destroyed.
        self.as_ptr().map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Mutably borrow the owned object, if any. Sound because ownership is
    /// exclusive.
    pub fn as_mut(&mut self) -> Option<&mut T> {
        // SAFETY: a stored pointer is owned, alive, and unaliased.
        self.as_ptr().map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// True when the handle owns nothing.
    pub fn is_empty(&self) -> bool {
        self.data.first().is_none()
    }

    /// Hand back the pointer without destroying it, leaving the handle
    /// empty.
    ///
    /// The caller becomes responsible for the allocation; the destroyer
    /// will never run for a released pointer.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.data.first_mut().take()
    }

    /// Destroy the current allocation, leaving the handle empty.
    pub fn reset(&mut self) {
        if let Some(old) = self.data.first_mut().take() {
            self.data.second_mut().destroy(old);
        }
    }

    /// Swap in a raw replacement, then destroy the previous allocation.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be destroyable by the current destroyer, and
    /// nothing else may assume ownership of it afterwards.
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        let old = std::mem::replace(self.data.first_mut(), NonNull::new(ptr));
        if let Some(old) = old {
            self.data.second_mut().destroy(old);
        }
    }

    /// Borrow the destroyer policy.
    pub fn destroyer(&self) -> &D {
        self.data.second()
    }

    /// Mutably borrow the destroyer policy.
    pub fn destroyer_mut(&mut self) -> &mut D {
        self.data.second_mut()
    }

    /// Exchange contents with another handle. No destruction happens.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.data, &mut other.data);
    }
}

impl<T, D: Destroy<[T]>> ExclusiveHandle<[T], D> {
    /// Number of elements in the owned slice, or 0 when empty.
    pub fn len(&self) -> usize {
        self.as_ref().map_or(0, <[T]>::len)
    }
}

impl<T: ?Sized, D: Destroy<T>> Drop for ExclusiveHandle<T, D> {
    fn drop(&mut self) {
        let (ptr, destroyer) = self.data.parts_mut();
        if let Some(ptr) = ptr.take() {
            destroyer.destroy(ptr);
        }
    }
}

impl<T: ?Sized, D: Destroy<T> + Default> Default for ExclusiveHandle<T, D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, D: Destroy<[T]>> Index<usize> for ExclusiveHandle<[T], D> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.as_ref() {
            Some(slice) => &slice[index],
            None => panic!("indexed an empty ExclusiveHandle"),
        }
    }
}

impl<T, D: Destroy<[T]>> IndexMut<usize> for ExclusiveHandle<[T], D> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.as_mut() {
            Some(slice) => &mut slice[index],
            None => panic!("indexed an empty ExclusiveHandle"),
        }
    }
}

impl<T: ?Sized, D: Destroy<T>> fmt::Debug for ExclusiveHandle<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveHandle")
            .field("ptr", self.data.first())
            .finish()
    }
}
