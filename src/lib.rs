//! # Tether
//!
//! A small single-threaded ownership runtime: three handle types over raw
//! heap allocations, with the bookkeeping made explicit instead of
//! borrowed from the standard library.
//!
//! - **[`SharedHandle`]**: shared ownership through a reference-counted
//!   control block, with a single-allocation factory, aliasing, and
//!   promotion from weak observers.
//! - **[`WeakHandle`]**: non-owning observer of a shared family,
//!   promotable while the object is alive.
//! - **[`ExclusiveHandle`]**: sole ownership with a pluggable destroyer
//!   policy, stored without overhead next to the pointer.
//!
//! Objects can opt into the [`SelfAware`] capability to obtain new handles
//! to themselves while under shared ownership.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          TETHER                            │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────┐   │
//! │  │ SharedHandle │   │  WeakHandle  │   │   SelfAware   │   │
//! │  │ (shared.rs)  │   │  (weak.rs)   │   │(self_aware.rs)│   │
//! │  └──────┬───────┘   └──────┬───────┘   └───────┬───────┘   │
//! │         └──────────────────┼───────────────────┘           │
//! │                            │                               │
//! │                  ┌─────────┴─────────┐                     │
//! │                  │  control blocks   │                     │
//! │                  │    (block.rs)     │                     │
//! │                  └───────────────────┘                     │
//! │                                                            │
//! │  ┌───────────────┐  ┌──────────────┐   ┌──────────────┐    │
//! │  │ExclusiveHandle│  │ PairStorage  │   │    stats     │    │
//! │  │(exclusive.rs) │  │  (pair.rs)   │   │  (stats.rs)  │    │
//! │  └───────────────┘  └──────────────┘   └──────────────┘    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! Counts are plain non-atomic integers; every handle is `!Send` and
//! `!Sync` through its raw-pointer fields, so the compiler enforces the
//! single-threaded design instead of documentation. Within one thread,
//! count mutations are strictly ordered by program order, which makes the
//! "last reference" checks race-free by construction.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod block;
pub mod exclusive;
pub mod pair;
pub mod self_aware;
pub mod shared;
pub mod stats;
pub mod weak;

// Re-exports
pub use exclusive::{DefaultDestroy, Destroy, ExclusiveHandle, RawDestroy, UntypedHandle};
pub use pair::PairStorage;
pub use self_aware::{SelfAware, SelfRef};
pub use shared::SharedHandle;
pub use weak::{BrokenWeakError, WeakHandle};
