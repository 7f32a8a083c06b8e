//! Typed atomic cells.
//!
//! One generic [`Atomic<T>`] covers the whole width × operation surface:
//! the widths are the [`Primitive`] impls (8/16/32/64 bits everywhere,
//! 128 bits on 64-bit targets, `usize`/`isize`, `bool`, raw pointers), the
//! orderings are ordinary [`Ordering`] values. Untyped "any bit pattern of
//! width W" use is the unsigned instantiation of the same cell.
//!
//! All operations are wait-free and allocation-free. There are no error
//! paths; an ordering that is illegal for an operation (e.g. `Release` on a
//! load) panics, exactly as the standard atomics do.

use crate::sync::{
    AtomicBool, AtomicI8, AtomicI16, AtomicI32, AtomicI64, AtomicIsize, AtomicPtr, AtomicU8,
    AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};
#[cfg(all(not(feature = "loom"), target_pointer_width = "64"))]
use crate::sync::{AtomicI128, AtomicU128};

use core::fmt;

mod sealed {
    pub trait Sealed {}
}

/// Machine types with a native atomic representation.
///
/// Sealed: the set of widths is fixed by the hardware, not extensible.
pub trait Primitive: Copy + sealed::Sealed {
    #[doc(hidden)]
    type Repr;
    #[doc(hidden)]
    fn atomic_new(self) -> Self::Repr;
    #[doc(hidden)]
    fn atomic_load(repr: &Self::Repr, order: Ordering) -> Self;
    #[doc(hidden)]
    fn atomic_store(repr: &Self::Repr, value: Self, order: Ordering);
    #[doc(hidden)]
    fn atomic_swap(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn atomic_compare_exchange(
        repr: &Self::Repr,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
    #[doc(hidden)]
    fn atomic_compare_exchange_weak(
        repr: &Self::Repr,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
}

/// Integer primitives, which additionally support the fetch-modify ops.
pub trait PrimitiveInteger: Primitive {
    #[doc(hidden)]
    fn atomic_fetch_add(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn atomic_fetch_sub(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn atomic_fetch_and(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn atomic_fetch_or(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn atomic_fetch_xor(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
}

macro_rules! impl_primitive {
    ($ty:ty, $atomic:ty) => {
        impl sealed::Sealed for $ty {}

        impl Primitive for $ty {
            type Repr = $atomic;

            #[inline]
            fn atomic_new(self) -> $atomic {
                <$atomic>::new(self)
            }

            #[inline]
            fn atomic_load(repr: &$atomic, order: Ordering) -> $ty {
                repr.load(order)
            }

            #[inline]
            fn atomic_store(repr: &$atomic, value: $ty, order: Ordering) {
                repr.store(value, order)
            }

            #[inline]
            fn atomic_swap(repr: &$atomic, value: $ty, order: Ordering) -> $ty {
                repr.swap(value, order)
            }

            #[inline]
            fn atomic_compare_exchange(
                repr: &$atomic,
                current: $ty,
                new: $ty,
                success: Ordering,
                failure: Ordering,
            ) -> Result<$ty, $ty> {
                repr.compare_exchange(current, new, success, failure)
            }

            #[inline]
            fn atomic_compare_exchange_weak(
                repr: &$atomic,
                current: $ty,
                new: $ty,
                success: Ordering,
                failure: Ordering,
            ) -> Result<$ty, $ty> {
                repr.compare_exchange_weak(current, new, success, failure)
            }
        }
    };
}

macro_rules! impl_primitive_integer {
    ($ty:ty, $atomic:ty) => {
        impl_primitive!($ty, $atomic);

        impl PrimitiveInteger for $ty {
            #[inline]
            fn atomic_fetch_add(repr: &$atomic, value: $ty, order: Ordering) -> $ty {
                repr.fetch_add(value, order)
            }

            #[inline]
            fn atomic_fetch_sub(repr: &$atomic, value: $ty, order: Ordering) -> $ty {
                repr.fetch_sub(value, order)
            }

            #[inline]
            fn atomic_fetch_and(repr: &$atomic, value: $ty, order: Ordering) -> $ty {
                repr.fetch_and(value, order)
            }

            #[inline]
            fn atomic_fetch_or(repr: &$atomic, value: $ty, order: Ordering) -> $ty {
                repr.fetch_or(value, order)
            }

            #[inline]
            fn atomic_fetch_xor(repr: &$atomic, value: $ty, order: Ordering) -> $ty {
                repr.fetch_xor(value, order)
            }
        }
    };
}

impl_primitive_integer!(u8, AtomicU8);
impl_primitive_integer!(u16, AtomicU16);
impl_primitive_integer!(u32, AtomicU32);
impl_primitive_integer!(u64, AtomicU64);
impl_primitive_integer!(usize, AtomicUsize);
impl_primitive_integer!(i8, AtomicI8);
impl_primitive_integer!(i16, AtomicI16);
impl_primitive_integer!(i32, AtomicI32);
impl_primitive_integer!(i64, AtomicI64);
impl_primitive_integer!(isize, AtomicIsize);

// Double machine-word integers need DCAS hardware; 64-bit targets only.
#[cfg(all(not(feature = "loom"), target_pointer_width = "64"))]
impl_primitive_integer!(u128, AtomicU128);
#[cfg(all(not(feature = "loom"), target_pointer_width = "64"))]
impl_primitive_integer!(i128, AtomicI128);

impl_primitive!(bool, AtomicBool);

impl<U> sealed::Sealed for *mut U {}

impl<U> Primitive for *mut U {
    type Repr = AtomicPtr<U>;

    #[inline]
    fn atomic_new(self) -> AtomicPtr<U> {
        AtomicPtr::new(self)
    }

    #[inline]
    fn atomic_load(repr: &AtomicPtr<U>, order: Ordering) -> *mut U {
        repr.load(order)
    }

    #[inline]
    fn atomic_store(repr: &AtomicPtr<U>, value: *mut U, order: Ordering) {
        repr.store(value, order)
    }

    #[inline]
    fn atomic_swap(repr: &AtomicPtr<U>, value: *mut U, order: Ordering) -> *mut U {
        repr.swap(value, order)
    }

    #[inline]
    fn atomic_compare_exchange(
        repr: &AtomicPtr<U>,
        current: *mut U,
        new: *mut U,
        success: Ordering,
        failure: Ordering,
    ) -> Result<*mut U, *mut U> {
        repr.compare_exchange(current, new, success, failure)
    }

    #[inline]
    fn atomic_compare_exchange_weak(
        repr: &AtomicPtr<U>,
        current: *mut U,
        new: *mut U,
        success: Ordering,
        failure: Ordering,
    ) -> Result<*mut U, *mut U> {
        repr.compare_exchange_weak(current, new, success, failure)
    }
}

/// A typed atomic cell.
///
/// Every access to the underlying memory goes through this API; the cell
/// owns its memory, so mixed plain/atomic access cannot happen.
#[repr(transparent)]
pub struct Atomic<T: Primitive> {
    inner: T::Repr,
}

impl<T: Primitive> Atomic<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: value.atomic_new(),
        }
    }

    /// Loads the value. `order` must be `Relaxed`, `Acquire`, or `SeqCst`.
    #[inline]
    pub fn load(&self, order: Ordering) -> T {
        T::atomic_load(&self.inner, order)
    }

    /// Stores `value`. `order` must be `Relaxed`, `Release`, or `SeqCst`.
    #[inline]
    pub fn store(&self, value: T, order: Ordering) {
        T::atomic_store(&self.inner, value, order)
    }

    /// Swaps in `value`, returning the previous value.
    #[inline]
    pub fn swap(&self, value: T, order: Ordering) -> T {
        T::atomic_swap(&self.inner, value, order)
    }

    /// Stores `new` if the current value equals `current`.
    ///
    /// Fails only on a genuine mismatch; the `Err` carries the observed
    /// value. `failure` must be `Relaxed`, `Acquire`, or `SeqCst`.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: T,
        new: T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<T, T> {
        T::atomic_compare_exchange(&self.inner, current, new, success, failure)
    }

    /// Like [`compare_exchange`](Self::compare_exchange) but may fail
    /// spuriously even when the values are equal, which maps better onto
    /// LL/SC hardware. Call it in a retry loop.
    #[inline]
    pub fn compare_exchange_weak(
        &self,
        current: T,
        new: T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<T, T> {
        T::atomic_compare_exchange_weak(&self.inner, current, new, success, failure)
    }

    /// Retry-loop update: load once, then `compare_exchange_weak` until the
    /// value computed by `f` from the observed value sticks.
    ///
    /// Returns the pre-update value. This is the portable stand-in for an
    /// LL/SC block on hardware that has none.
    #[inline]
    pub fn update<F>(&self, set_order: Ordering, fetch_order: Ordering, mut f: F) -> T
    where
        F: FnMut(T) -> T,
    {
        let mut prev = self.load(fetch_order);
        loop {
            match self.compare_exchange_weak(prev, f(prev), set_order, fetch_order) {
                Ok(prev) => return prev,
                Err(observed) => prev = observed,
            }
        }
    }
}

impl<T: PrimitiveInteger> Atomic<T> {
    /// Adds `value`, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, value: T, order: Ordering) -> T {
        T::atomic_fetch_add(&self.inner, value, order)
    }

    /// Subtracts `value`, returning the previous value.
    #[inline]
    pub fn fetch_sub(&self, value: T, order: Ordering) -> T {
        T::atomic_fetch_sub(&self.inner, value, order)
    }

    /// Bitwise-ands `value`, returning the previous value.
    #[inline]
    pub fn fetch_and(&self, value: T, order: Ordering) -> T {
        T::atomic_fetch_and(&self.inner, value, order)
    }

    /// Bitwise-ors `value`, returning the previous value.
    #[inline]
    pub fn fetch_or(&self, value: T, order: Ordering) -> T {
        T::atomic_fetch_or(&self.inner, value, order)
    }

    /// Bitwise-xors `value`, returning the previous value.
    #[inline]
    pub fn fetch_xor(&self, value: T, order: Ordering) -> T {
        T::atomic_fetch_xor(&self.inner, value, order)
    }
}

impl<T: Primitive + Default> Default for Atomic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Primitive> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Primitive + fmt::Debug> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Atomic").field(&self.load(Ordering::Relaxed)).finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_widths() {
        macro_rules! round_trip {
            ($ty:ty, $value:expr) => {
                for store_order in [Ordering::Relaxed, Ordering::Release, Ordering::SeqCst] {
                    for load_order in [Ordering::Relaxed, Ordering::Acquire, Ordering::SeqCst] {
                        let cell = Atomic::<$ty>::new(<$ty>::default());
                        cell.store($value, store_order);
                        assert_eq!(cell.load(load_order), $value);
                    }
                }
            };
        }

        round_trip!(u8, 0xA5);
        round_trip!(u16, 0xA5A5);
        round_trip!(u32, 0xDEAD_BEEF);
        round_trip!(u64, 0xDEAD_BEEF_CAFE_F00D);
        round_trip!(usize, usize::MAX - 1);
        round_trip!(i8, -5);
        round_trip!(i16, -555);
        round_trip!(i32, -5_000_000);
        round_trip!(i64, i64::MIN + 1);
        round_trip!(isize, -1);
        round_trip!(bool, true);
        #[cfg(target_pointer_width = "64")]
        round_trip!(u128, u128::MAX - 7);
        #[cfg(target_pointer_width = "64")]
        round_trip!(i128, i128::MIN + 7);
    }

    #[test]
    fn test_fetch_ops_return_previous() {
        let cell = Atomic::new(10u32);
        assert_eq!(cell.fetch_add(5, Ordering::AcqRel), 10);
        assert_eq!(cell.fetch_sub(3, Ordering::AcqRel), 15);
        assert_eq!(cell.fetch_and(0b1100, Ordering::AcqRel), 12);
        assert_eq!(cell.fetch_or(0b0001, Ordering::AcqRel), 12);
        assert_eq!(cell.fetch_xor(0b1111, Ordering::AcqRel), 13);
        assert_eq!(cell.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_compare_exchange_success_iff_equal() {
        let cell = Atomic::new(7u64);

        assert_eq!(
            cell.compare_exchange(7, 8, Ordering::AcqRel, Ordering::Acquire),
            Ok(7)
        );
        assert_eq!(cell.load(Ordering::Relaxed), 8);

        // Mismatch: the error carries the observed value, the cell is untouched.
        assert_eq!(
            cell.compare_exchange(7, 9, Ordering::AcqRel, Ordering::Acquire),
            Err(8)
        );
        assert_eq!(cell.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn test_compare_exchange_weak_retry_loop() {
        let cell = Atomic::new(0u32);
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            match cell.compare_exchange_weak(current, 42, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        assert_eq!(cell.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn test_update_returns_previous() {
        let cell = Atomic::new(3u64);
        let prev = cell.update(Ordering::AcqRel, Ordering::Acquire, |v| v * 2);
        assert_eq!(prev, 3);
        assert_eq!(cell.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_pointer_cell() {
        let mut a = 1u32;
        let mut b = 2u32;
        let cell = Atomic::new(&mut a as *mut u32);

        let prev = cell.swap(&mut b as *mut u32, Ordering::AcqRel);
        assert_eq!(prev, &mut a as *mut u32);

        assert!(
            cell.compare_exchange(
                &mut b as *mut u32,
                core::ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        );
        assert!(cell.load(Ordering::Relaxed).is_null());
    }

    #[test]
    fn test_128_bit_fetch_add() {
        #[cfg(target_pointer_width = "64")]
        {
            let cell = Atomic::new(u128::MAX - 1);
            assert_eq!(cell.fetch_add(1, Ordering::AcqRel), u128::MAX - 1);
            assert_eq!(cell.load(Ordering::Relaxed), u128::MAX);
        }
    }
}
