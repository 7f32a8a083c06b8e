//! Cache-line padding for hot shared cells.

use core::fmt;
use core::ops::{Deref, DerefMut};

/// Pads and aligns `T` to a 64-byte cache line.
///
/// Queue heads and tails, lock words, and other cells hammered by different
/// threads go in separate lines so one thread's writes do not invalidate a
/// neighbor's line (false sharing).
#[derive(Default, Clone, Copy, PartialEq, Eq)]
#[repr(align(64))]
pub struct CachePadded<T> {
    value: T,
}

static_assertions::const_assert_eq!(core::mem::size_of::<CachePadded<u8>>(), 64);
static_assertions::const_assert_eq!(core::mem::align_of::<CachePadded<[u8; 70]>>(), 64);

impl<T> CachePadded<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachePadded").field(&self.value).finish()
    }
}

impl<T> From<T> for CachePadded<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
