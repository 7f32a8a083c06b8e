//! Typed atomic cells over every machine width, with the supporting pieces
//! lock-free structures keep reaching for.
//!
//! # Contents
//!
//! - [`Atomic<T>`]: one generic cell covering 8/16/32/64-bit integers
//!   (128-bit on 64-bit targets), `usize`/`isize`, `bool`, and raw pointers,
//!   with load/store/swap/fetch-modify/compare-exchange parameterized by
//!   [`Ordering`]
//! - [`Atomic::update`]: the load + `compare_exchange_weak` retry loop that
//!   stands in for LL/SC on hardware without it
//! - [`TaggedPtr`] / [`AtomicTaggedPtr`]: {pointer, generation tag} in one
//!   double-width atomic word, the ABA guard for lock-free stacks and queues
//! - [`CachePadded`]: 64-byte alignment wrapper against false sharing
//!
//! Everything is wait-free and allocation-free; nothing here blocks or
//! enters the kernel.
//!
//! # Loom Testing
//!
//! Enable the `loom` feature to swap the backing atomics for loom's modeled
//! types:
//!
//! ```text
//! cargo test -p socle-atomic --features loom
//! ```

#![no_std]

#[cfg(any(test, feature = "loom"))]
extern crate std;

pub mod cell;
pub mod pad;
pub mod sync;
pub mod tagged;

pub use cell::{Atomic, Primitive, PrimitiveInteger};
pub use pad::CachePadded;
pub use sync::Ordering;
pub use tagged::{AtomicTaggedPtr, TaggedPtr};

#[cfg(all(test, feature = "loom"))]
mod loom_tests;
