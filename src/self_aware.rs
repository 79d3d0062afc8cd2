//! Self-Aware Objects
//!
//! An object under shared ownership sometimes needs to hand out a new
//! handle to itself, typically to register callbacks or build back-edges.
//! The [`SelfAware`] capability makes that possible: the object embeds a
//! [`SelfRef`] slot, and the binding constructors
//! ([`SharedHandle::new_bound`] and [`SharedHandle::adopt_bound`]) wire the
//! slot to the freshly created family before the handle is returned.
//!
//! An object that was never wrapped through a binding constructor has an
//! unbound slot; [`SelfAware::weak_self`] then returns an already-expired
//! observer and [`SelfAware::shared_self`] fails with [`BrokenWeakError`].
//! Neither path ever dangles or panics.
//!
//! # Example
//!
//! ```
//! use tether::{SelfAware, SelfRef, SharedHandle};
//!
//! struct Node {
//!     self_ref: SelfRef<Node>,
//!     value: u32,
//! }
//!
//! impl SelfAware for Node {
//!     fn self_ref(&self) -> &SelfRef<Node> {
//!         &self.self_ref
//!     }
//! }
//!
//! let node = SharedHandle::new_bound(Node {
//!     self_ref: SelfRef::new(),
//!     value: 4,
//! });
//! let again = node.as_ref().unwrap().shared_self().unwrap();
//! assert_eq!(again, node);
//! assert_eq!(again.as_ref().unwrap().value, 4);
//! ```
//!
//! [`SharedHandle::new_bound`]: crate::shared::SharedHandle::new_bound
//! [`SharedHandle::adopt_bound`]: crate::shared::SharedHandle::adopt_bound

use std::cell::RefCell;
use std::fmt;

use crate::shared::SharedHandle;
use crate::weak::{BrokenWeakError, WeakHandle};

/// The embedded back-reference slot of a self-aware object.
///
/// Bound at most once, by the first binding constructor that wraps the
/// object; read-only thereafter.
pub struct SelfRef<T> {
    slot: RefCell<WeakHandle<T>>,
}

impl<T> SelfRef<T> {
    /// A fresh, unbound slot.
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(WeakHandle::new()),
        }
    }

    /// Wire the slot to `handle`'s family. First binding wins.
    pub(crate) fn bind(&self, handle: &SharedHandle<T>) {
        let mut slot = self.slot.borrow_mut();
        if slot.is_empty() {
            *slot = handle.downgrade();
        }
    }

    /// Clone out the stored observer (expired when unbound).
    pub(crate) fn observer(&self) -> WeakHandle<T> {
        self.slot.borrow().clone()
    }
}

impl<T> Default for SelfRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SelfRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfRef")
            .field("bound", &!self.slot.borrow().is_empty())
            .finish()
    }
}

/// Capability to obtain new handles to oneself while under shared
/// ownership.
///
/// Implementers embed a [`SelfRef`] and return it from
/// [`self_ref`](SelfAware::self_ref); everything else is provided.
pub trait SelfAware: Sized + 'static {
    /// Access the embedded back-reference slot.
    fn self_ref(&self) -> &SelfRef<Self>;

    /// A new owning handle to this object.
    ///
    /// Fails with [`BrokenWeakError`] when the slot was never bound (the
    /// object is not under shared ownership through a binding constructor)
    /// or when called during the object's own destruction.
    fn shared_self(&self) -> Result<SharedHandle<Self>, BrokenWeakError> {
        SharedHandle::try_from(&self.self_ref().observer())
    }

    /// A new observer of this object. Total: an unbound slot yields an
    /// already-expired observer instead of an error.
    fn weak_self(&self) -> WeakHandle<Self> {
        self.self_ref().observer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        self_ref: SelfRef<Widget>,
        id: u32,
    }

    impl Widget {
        fn new(id: u32) -> Self {
            Self {
                self_ref: SelfRef::new(),
                id,
            }
        }
    }

    impl SelfAware for Widget {
        fn self_ref(&self) -> &SelfRef<Widget> {
            &self.self_ref
        }
    }

    #[test]
    fn test_round_trip_via_factory() {
        let handle = SharedHandle::new_bound(Widget::new(1));
        let again = handle.as_ref().unwrap().shared_self().unwrap();
        assert_eq!(again, handle);
        assert_eq!(handle.strong_count(), 2);
    }

    #[test]
    fn test_round_trip_via_adopt() {
        let handle = SharedHandle::adopt_bound(Box::new(Widget::new(2)));
        let again = handle.as_ref().unwrap().shared_self().unwrap();
        assert_eq!(again, handle);
        assert_eq!(again.as_ref().unwrap().id, 2);
    }

    #[test]
    fn test_unbound_is_expired_not_a_crash() {
        let loose = Widget::new(3);
        assert!(loose.weak_self().expired());
        assert_eq!(loose.shared_self(), Err(BrokenWeakError));

        // The plain constructors do not bind.
        let unbound = SharedHandle::new(Widget::new(4));
        let inner = unbound.as_ref().unwrap();
        assert!(inner.weak_self().expired());
        assert_eq!(inner.shared_self(), Err(BrokenWeakError));
    }

    #[test]
    fn test_binding_happens_once() {
        let first = SharedHandle::new_bound(Widget::new(5));
        let weak = first.as_ref().unwrap().weak_self();
        assert_eq!(weak.lock().unwrap(), first);
    }

    #[test]
    fn test_self_ref_does_not_leak_family() {
        // The embedded observer must not keep the object or block alive.
        let handle = SharedHandle::new_bound(Widget::new(6));
        let outside = handle.as_ref().unwrap().weak_self();
        drop(handle);
        assert!(outside.expired());
    }
}
