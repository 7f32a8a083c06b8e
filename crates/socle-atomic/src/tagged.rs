//! Tagged double-word pointers.
//!
//! A {pointer, generation tag} pair held in one atomic word. CAS-loop
//! protocols bump the tag on every successful swing, so a node that is
//! popped, recycled by its owner, and pushed back at the same address can
//! never satisfy a stalled compare-exchange from another thread: the ABA
//! defeat for targets without native LL/SC.
//!
//! On 64-bit targets the pair is a 128-bit word (pointer in the low half,
//! tag in the high half) and requires DCAS hardware; 32-bit targets degrade
//! to a single 64-bit word with a 32-bit tag.

use core::fmt;
use core::marker::PhantomData;

use crate::sync::Ordering;
use crate::sync::pair::{PairWord, RawPair};

const TAG_SHIFT: u32 = usize::BITS;

/// A {pointer, tag} value, convertible to and from one machine pair word.
#[repr(transparent)]
pub struct TaggedPtr<T> {
    raw: RawPair,
    _marker: PhantomData<*mut T>,
}

static_assertions::assert_eq_size!(TaggedPtr<u8>, RawPair);

impl<T> TaggedPtr<T> {
    /// The null pointer with tag 0.
    pub const fn null() -> Self {
        Self {
            raw: 0,
            _marker: PhantomData,
        }
    }

    pub fn new(ptr: *mut T, tag: usize) -> Self {
        let raw = ((tag as RawPair) << TAG_SHIFT) | (ptr as usize as RawPair);
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn ptr(self) -> *mut T {
        self.raw as usize as *mut T
    }

    #[inline]
    pub fn tag(self) -> usize {
        (self.raw >> TAG_SHIFT) as usize
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.ptr().is_null()
    }

    /// Same tag, different pointer.
    #[inline]
    pub fn with_ptr(self, ptr: *mut T) -> Self {
        Self::new(ptr, self.tag())
    }

    /// Same pointer, different tag.
    #[inline]
    pub fn with_tag(self, tag: usize) -> Self {
        Self::new(self.ptr(), tag)
    }

    /// Same pointer, tag incremented (wrapping).
    #[inline]
    pub fn bumped(self) -> Self {
        Self::new(self.ptr(), self.tag().wrapping_add(1))
    }

    #[inline]
    fn from_raw(raw: RawPair) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for TaggedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TaggedPtr<T> {}

impl<T> PartialEq for TaggedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for TaggedPtr<T> {}

impl<T> Default for TaggedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for TaggedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedPtr")
            .field("ptr", &self.ptr())
            .field("tag", &self.tag())
            .finish()
    }
}

/// An atomic {pointer, tag} cell.
///
/// Exposes load/store/swap/compare-exchange over [`TaggedPtr`] values; the
/// fetch-modify ops make no sense on a pair and are not provided.
pub struct AtomicTaggedPtr<T> {
    raw: PairWord,
    _marker: PhantomData<*mut T>,
}

// SAFETY: the cell stores the pointer as a bit pattern and never
// dereferences it; dereferencing is the caller's (unsafe) business, as with
// `AtomicPtr`.
unsafe impl<T> Send for AtomicTaggedPtr<T> {}
unsafe impl<T> Sync for AtomicTaggedPtr<T> {}

impl<T> AtomicTaggedPtr<T> {
    pub fn new(value: TaggedPtr<T>) -> Self {
        Self {
            raw: PairWord::new(value.raw),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> TaggedPtr<T> {
        TaggedPtr::from_raw(self.raw.load(order))
    }

    #[inline]
    pub fn store(&self, value: TaggedPtr<T>, order: Ordering) {
        self.raw.store(value.raw, order)
    }

    #[inline]
    pub fn swap(&self, value: TaggedPtr<T>, order: Ordering) -> TaggedPtr<T> {
        TaggedPtr::from_raw(self.raw.swap(value.raw, order))
    }

    #[inline]
    pub fn compare_exchange(
        &self,
        current: TaggedPtr<T>,
        new: TaggedPtr<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedPtr<T>, TaggedPtr<T>> {
        self.raw
            .compare_exchange(current.raw, new.raw, success, failure)
            .map(TaggedPtr::from_raw)
            .map_err(TaggedPtr::from_raw)
    }

    #[inline]
    pub fn compare_exchange_weak(
        &self,
        current: TaggedPtr<T>,
        new: TaggedPtr<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedPtr<T>, TaggedPtr<T>> {
        self.raw
            .compare_exchange_weak(current.raw, new.raw, success, failure)
            .map(TaggedPtr::from_raw)
            .map_err(TaggedPtr::from_raw)
    }
}

impl<T> Default for AtomicTaggedPtr<T> {
    fn default() -> Self {
        Self::new(TaggedPtr::null())
    }
}

impl<T> fmt::Debug for AtomicTaggedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicTaggedPtr")
            .field(&self.load(Ordering::Relaxed))
            .finish()
    }
}
