//! Weak Observer Handles
//!
//! [`WeakHandle`] observes a shared family without keeping the object
//! alive. Its observed pointer may dangle once the last strong reference
//! goes, so the object is only ever reached by promoting back to a
//! [`SharedHandle`] first: [`WeakHandle::lock`] is the total form (empty
//! result when expired), `SharedHandle::try_from(&weak)` is the fallible
//! form ([`BrokenWeakError`] when expired). The two shapes are deliberately
//! distinct and neither is collapsed into the other.
//!
//! # Example
//!
//! ```
//! use tether::{SharedHandle, WeakHandle};
//!
//! let strong = SharedHandle::new(10u32);
//! let weak = strong.downgrade();
//! assert!(!weak.expired());
//! assert_eq!(weak.lock().unwrap().as_ref(), Some(&10));
//!
//! drop(strong);
//! assert!(weak.expired());
//! assert!(weak.lock().is_none());
//! ```

use std::fmt;
use std::ptr::NonNull;

use crate::block::{self, BlockPtr, RefKind};
use crate::shared::SharedHandle;

/// Error from the fallible promotion path: the weak reference no longer
/// leads to a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenWeakError;

impl fmt::Display for BrokenWeakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broken weak reference: the object has already been destroyed")
    }
}

impl std::error::Error for BrokenWeakError {}

/// A non-owning observer of a shared family.
///
/// Holds exactly one weak count unit while non-empty; the control block
/// outlives the object for as long as any observer needs it for count
/// queries.
pub struct WeakHandle<T: ?Sized> {
    pub(crate) observed: Option<NonNull<T>>,
    pub(crate) block: Option<BlockPtr>,
}

impl<T: ?Sized> WeakHandle<T> {
    /// An empty observer; always expired.
    pub fn new() -> Self {
        Self {
            observed: None,
            block: None,
        }
    }

    /// True when the handle observes nothing.
    pub fn is_empty(&self) -> bool {
        self.observed.is_none() && self.block.is_none()
    }

    /// Number of strong references in the observed family, or 0 when empty.
    pub fn strong_count(&self) -> usize {
        match self.block {
            // SAFETY: our weak reference keeps the block alive.
            Some(block) => unsafe { block.as_ref().strong() },
            None => 0,
        }
    }

    /// True when empty or when the observed object has been destroyed.
    pub fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    /// Total promotion: an owning handle while the object is alive, `None`
    /// once it is gone. Never fails.
    pub fn lock(&self) -> Option<SharedHandle<T>> {
        SharedHandle::try_from(self).ok()
    }

    /// Drop the current observation, leaving an empty handle.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Exchange contents with another observer. No count changes.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            // SAFETY: our weak reference keeps the block alive.
            unsafe { block.as_ref().inc_weak() };
        }
        Self {
            observed: self.observed,
            block: self.block,
        }
    }
}

impl<T: ?Sized> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: this handle held exactly one weak reference.
            unsafe { block::release(block, RefKind::Weak) };
        }
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("strong", &self.strong_count())
            .field("expired", &self.expired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_weak_is_expired() {
        let weak: WeakHandle<u32> = WeakHandle::new();
        assert!(weak.is_empty());
        assert!(weak.expired());
        assert!(weak.lock().is_none());
        assert_eq!(
            SharedHandle::try_from(&weak).unwrap_err(),
            BrokenWeakError
        );
    }

    #[test]
    fn test_downgrade_then_lock() {
        let strong = SharedHandle::new(3u32);
        let weak = strong.downgrade();
        assert_eq!(weak.strong_count(), 1);
        let again = weak.lock().unwrap();
        assert_eq!(again, strong);
        assert_eq!(strong.strong_count(), 2);
    }

    #[test]
    fn test_weak_does_not_keep_object_alive() {
        let strong = SharedHandle::new(String::from("gone"));
        let weak = strong.downgrade();
        drop(strong);
        assert!(weak.expired());
        assert!(weak.lock().is_none());
        assert_eq!(SharedHandle::try_from(&weak), Err(BrokenWeakError));
    }

    #[test]
    fn test_weak_clone_counts_independently() {
        let strong = SharedHandle::new(1u8);
        let w1 = strong.downgrade();
        let w2 = w1.clone();
        drop(strong);
        assert!(w1.expired());
        assert!(w2.expired());
        drop(w1);
        // Block must still answer count queries for w2.
        assert_eq!(w2.strong_count(), 0);
    }

    #[test]
    fn test_reset_clears_observation() {
        let strong = SharedHandle::new(1u8);
        let mut weak = strong.downgrade();
        weak.reset();
        assert!(weak.is_empty());
        assert_eq!(strong.strong_count(), 1);
    }

    #[test]
    fn test_error_display() {
        let message = BrokenWeakError.to_string();
        assert!(message.contains("broken weak reference"));
    }
}
