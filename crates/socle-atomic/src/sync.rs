//! Atomic backend selection.
//!
//! Everything in this crate reaches its atomics through here so that the
//! `loom` feature can swap in loom's modeled types for interleaving tests.

#[cfg(not(feature = "loom"))]
pub use core::hint::spin_loop;
#[cfg(feature = "loom")]
pub use loom::hint::spin_loop;

#[cfg(not(feature = "loom"))]
pub use core::sync::atomic::{
    AtomicBool, AtomicI8, AtomicI16, AtomicI32, AtomicI64, AtomicIsize, AtomicPtr, AtomicU8,
    AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};
#[cfg(feature = "loom")]
pub use loom::sync::atomic::{
    AtomicBool, AtomicI8, AtomicI16, AtomicI32, AtomicI64, AtomicIsize, AtomicPtr, AtomicU8,
    AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};

// Stable Rust has no 128-bit atomic; portable-atomic maps these onto
// cmpxchg16b / CASP where the target has them. 64-bit targets only.
#[cfg(all(not(feature = "loom"), target_pointer_width = "64"))]
pub use portable_atomic::{AtomicI128, AtomicU128};

#[cfg(feature = "loom")]
pub use loom::thread;
#[cfg(all(not(feature = "loom"), test))]
pub use std::thread;

/// Double machine-word cell used by the tagged-pointer types.
///
/// loom has no 128-bit atomic, so under the `loom` feature the pair word is
/// emulated with a modeled mutex. Orderings degrade to the mutex's
/// sequential consistency; the protocols layered on top are unchanged and
/// stay explorable.
pub mod pair {
    use super::Ordering;

    /// Raw bit pattern of a {pointer, tag} pair.
    #[cfg(target_pointer_width = "64")]
    pub type RawPair = u128;
    /// Raw bit pattern of a {pointer, tag} pair.
    #[cfg(not(target_pointer_width = "64"))]
    pub type RawPair = u64;

    #[cfg(all(not(feature = "loom"), target_pointer_width = "64"))]
    pub type PairWord = portable_atomic::AtomicU128;
    #[cfg(all(not(feature = "loom"), not(target_pointer_width = "64")))]
    pub type PairWord = core::sync::atomic::AtomicU64;

    #[cfg(feature = "loom")]
    pub struct PairWord {
        inner: loom::sync::Mutex<RawPair>,
    }

    #[cfg(feature = "loom")]
    impl PairWord {
        pub fn new(value: RawPair) -> Self {
            Self {
                inner: loom::sync::Mutex::new(value),
            }
        }

        pub fn load(&self, _order: Ordering) -> RawPair {
            *self.inner.lock().unwrap()
        }

        pub fn store(&self, value: RawPair, _order: Ordering) {
            *self.inner.lock().unwrap() = value;
        }

        pub fn swap(&self, value: RawPair, _order: Ordering) -> RawPair {
            let mut guard = self.inner.lock().unwrap();
            core::mem::replace(&mut *guard, value)
        }

        pub fn compare_exchange(
            &self,
            current: RawPair,
            new: RawPair,
            _success: Ordering,
            _failure: Ordering,
        ) -> Result<RawPair, RawPair> {
            let mut guard = self.inner.lock().unwrap();
            if *guard == current {
                *guard = new;
                Ok(current)
            } else {
                Err(*guard)
            }
        }

        pub fn compare_exchange_weak(
            &self,
            current: RawPair,
            new: RawPair,
            success: Ordering,
            failure: Ordering,
        ) -> Result<RawPair, RawPair> {
            self.compare_exchange(current, new, success, failure)
        }
    }
}
