//! Shared Ownership Handles
//!
//! [`SharedHandle`] is the crate's owning reference type: any number of
//! handles jointly own one heap object through a shared control block, and
//! the object dies exactly when the last of them goes.
//!
//! ## Construction paths
//!
//! - [`SharedHandle::new`] embeds the object inside the control block, so
//!   the whole family costs a single heap allocation.
//! - [`SharedHandle::adopt`] wraps an allocation that already exists; the
//!   block is a second, separate allocation.
//! - [`SharedHandle::new_bound`] / [`SharedHandle::adopt_bound`] do the same
//!   for [`SelfAware`] types and additionally wire up the object's
//!   back-reference so it can later hand out handles to itself.
//! - Aliasing ([`project`](SharedHandle::project)) shares ownership of the
//!   whole object while observing a sub-part of it.
//! - Promotion (`TryFrom<&WeakHandle<T>>`) upgrades an observer back into an
//!   owner, failing with [`BrokenWeakError`] once the object is gone.
//!
//! Handles are single-threaded by design: counts are plain integers and the
//! raw-pointer fields make every handle `!Send` and `!Sync` automatically.
//!
//! # Example
//!
//! ```
//! use tether::SharedHandle;
//!
//! let a = SharedHandle::new(vec![1, 2, 3]);
//! let b = a.clone();
//! assert_eq!(a.strong_count(), 2);
//!
//! let first = a.project(|v| &v[0]).unwrap();
//! drop(a);
//! drop(b);
//! // `first` still keeps the whole vector alive.
//! assert_eq!(first.as_ref(), Some(&1));
//! ```

use std::fmt;
use std::ptr::NonNull;

use crate::block::{self, BlockPtr, RefKind};
use crate::self_aware::SelfAware;
use crate::weak::{BrokenWeakError, WeakHandle};

/// A shared-ownership handle to a heap object.
///
/// `observed` is the pointer handed out to callers; `block` governs the
/// lifetime. The two usually refer to the same object, but aliasing lets a
/// handle observe a sub-object while the block keeps the containing
/// allocation alive.
pub struct SharedHandle<T: ?Sized> {
    observed: Option<NonNull<T>>,
    block: Option<BlockPtr>,
}

impl<T: ?Sized> SharedHandle<T> {
    /// An empty handle owning and observing nothing.
    pub fn empty() -> Self {
        Self {
            observed: None,
            block: None,
        }
    }

    /// Wrap an existing heap allocation.
    ///
    /// Allocates a pointer-style control block, so the family costs two
    /// allocations in total. Prefer [`SharedHandle::new`] when the object
    /// does not exist yet.
    pub fn adopt(boxed: Box<T>) -> Self
    where
        T: 'static,
    {
        // SAFETY: the pointer came out of Box::into_raw just now.
        unsafe { Self::from_raw(Box::into_raw(boxed)) }
    }

    /// Wrap a raw heap pointer.
    ///
    /// A null `ptr` yields an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have come from `Box::into_raw` (or an
    /// equivalent allocation deletable through `Box::from_raw`), and nothing
    /// else may assume ownership of it afterwards.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        T: 'static,
    {
        match NonNull::new(ptr) {
            Some(observed) => Self {
                observed: Some(observed),
                block: Some(block::new_pointer(ptr)),
            },
            None => Self::empty(),
        }
    }

    /// Raw pointer to the observed object, if any.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.observed
    }

    /// Borrow the observed object, if any.
    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: while this handle is alive the strong count is at least
        // one, so the observed object has not been destroyed.
        self.observed.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// True when the handle owns and observes nothing.
    pub fn is_empty(&self) -> bool {
        self.observed.is_none() && self.block.is_none()
    }

    /// Number of strong references in this family, or 0 for an empty handle.
    pub fn strong_count(&self) -> usize {
        match self.block {
            // SAFETY: our strong reference keeps the block alive.
            Some(block) => unsafe { block.as_ref().strong() },
            None => 0,
        }
    }

    /// Produce a non-owning observer of the same family.
    pub fn downgrade(&self) -> WeakHandle<T> {
        if let Some(block) = self.block {
            // SAFETY: our strong reference keeps the block alive.
            unsafe { block.as_ref().inc_weak() };
        }
        WeakHandle {
            observed: self.observed,
            block: self.block,
        }
    }

    /// Share ownership of the whole object while observing a sub-part of it.
    ///
    /// The returned handle keeps the containing allocation alive but `get`s
    /// and compares by the projected pointer. Returns `None` on an empty
    /// handle. Upcasting to a trait object is a projection too:
    /// `handle.project(|x| x as &dyn Trait)`.
    pub fn project<U: ?Sized>(&self, f: impl FnOnce(&T) -> &U) -> Option<SharedHandle<U>> {
        let target = NonNull::from(f(self.as_ref()?));
        if let Some(block) = self.block {
            // SAFETY: our strong reference keeps the block alive.
            unsafe { block.as_ref().inc_strong() };
        }
        Some(SharedHandle {
            observed: Some(target),
            block: self.block,
        })
    }

    /// Aliasing constructor over a caller-supplied pointer.
    ///
    /// Shares this handle's block (if any) while observing `observed`, which
    /// may be null. Mirrors the raw aliasing construction of the pointer
    /// layer; [`project`](SharedHandle::project) is the safe form.
    ///
    /// # Safety
    ///
    /// A non-null `observed` must stay valid for as long as this family's
    /// block holds the object alive.
    pub unsafe fn alias_raw<U: ?Sized>(&self, observed: *mut U) -> SharedHandle<U> {
        if let Some(block) = self.block {
            // SAFETY: our strong reference keeps the block alive.
            unsafe { block.as_ref().inc_strong() };
        }
        SharedHandle {
            observed: NonNull::new(observed),
            block: self.block,
        }
    }

    /// Drop the current contents, leaving an empty handle.
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Replace the contents with a freshly adopted allocation.
    ///
    /// The previous reference is released through the normal drop path.
    pub fn reset_adopt(&mut self, boxed: Box<T>)
    where
        T: 'static,
    {
        *self = Self::adopt(boxed);
    }

    /// Exchange contents with another handle. No count changes.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }
}

impl<T: 'static> SharedHandle<T> {
    /// Construct the object in place inside its control block.
    ///
    /// The single-allocation factory: counts and object share one heap
    /// allocation, against two for [`SharedHandle::adopt`].
    pub fn new(value: T) -> Self {
        let (block, object) = block::new_inline(value);
        Self {
            observed: Some(object),
            block: Some(block),
        }
    }
}

impl<T: SelfAware> SharedHandle<T> {
    /// [`SharedHandle::new`] plus back-reference binding for self-aware types.
    ///
    /// Binding happens before the handle is returned, so the object can hand
    /// out handles to itself from that point on. Stable Rust cannot detect
    /// the capability inside the generic constructors, hence the dedicated
    /// entry points; wrapping a [`SelfAware`] type through the plain
    /// constructors leaves its back-reference unbound (and therefore
    /// expired, never dangling).
    pub fn new_bound(value: T) -> Self {
        let handle = Self::new(value);
        handle.bind_self();
        handle
    }

    /// [`SharedHandle::adopt`] plus back-reference binding.
    pub fn adopt_bound(boxed: Box<T>) -> Self {
        let handle = Self::adopt(boxed);
        handle.bind_self();
        handle
    }

    fn bind_self(&self) {
        if let Some(object) = self.as_ref() {
            object.self_ref().bind(self);
        }
    }
}

impl<T: ?Sized> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            // SAFETY: our strong reference keeps the block alive.
            unsafe { block.as_ref().inc_strong() };
        }
        Self {
            observed: self.observed,
            block: self.block,
        }
    }
}

impl<T: ?Sized> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: this handle held exactly one strong reference.
            unsafe { block::release(block, RefKind::Strong) };
        }
    }
}

impl<T: ?Sized> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T: ?Sized> TryFrom<&'a WeakHandle<T>> for SharedHandle<T> {
    type Error = BrokenWeakError;

    /// The fallible promotion path: fails once the object is destroyed.
    ///
    /// [`WeakHandle::lock`] is the total counterpart, returning an empty
    /// result instead of an error.
    fn try_from(weak: &'a WeakHandle<T>) -> Result<Self, BrokenWeakError> {
        match weak.block {
            // SAFETY: the weak reference keeps the block alive.
            Some(block) if unsafe { block.as_ref().strong() } > 0 => {
                // SAFETY: strong count is non-zero, so the object is alive
                // and may gain another owner.
                unsafe { block.as_ref().inc_strong() };
                Ok(Self {
                    observed: weak.observed,
                    block: Some(block),
                })
            }
            _ => Err(BrokenWeakError),
        }
    }
}

/// Equality compares observed pointers, never control blocks: two aliased
/// handles over the same block may compare unequal, and handles from
/// different blocks never observe the same live address.
impl<T: ?Sized, U: ?Sized> PartialEq<SharedHandle<U>> for SharedHandle<T> {
    fn eq(&self, other: &SharedHandle<U>) -> bool {
        match (self.observed, other.observed) {
            (Some(a), Some(b)) => std::ptr::addr_eq(a.as_ptr(), b.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Eq for SharedHandle<T> {}

impl<T: ?Sized> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("observed", &self.observed)
            .field("strong", &self.strong_count())
            .finish()
    }
}
