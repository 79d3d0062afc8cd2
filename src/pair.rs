//! Compressed Pair Storage
//!
//! [`PairStorage`] holds one value of each of two types side by side. It
//! exists so [`ExclusiveHandle`] can store its pointer and destroyer policy
//! as a single field without paying for stateless destroyers: Rust's layout
//! rules already give zero-sized fields no storage, so the one plain
//! definition here covers every combination of stateful and stateless
//! halves (the pointer-layer original needed four layout variants for the
//! same effect).
//!
//! [`ExclusiveHandle`]: crate::exclusive::ExclusiveHandle

/// A two-element container with individually borrowable halves.
///
/// Semantically a plain pair; any compression is purely a footprint matter
/// handled by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairStorage<A, B> {
    first: A,
    second: B,
}

impl<A, B> PairStorage<A, B> {
    /// Store `first` and `second` together.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Borrow the first element.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Mutably borrow the first element.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Borrow the second element.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Mutably borrow the second element.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Mutably borrow both elements at once.
    pub fn parts_mut(&mut self) -> (&mut A, &mut B) {
        (&mut self.first, &mut self.second)
    }

    /// Take both elements apart.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}
