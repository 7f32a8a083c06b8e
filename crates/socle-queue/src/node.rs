//! Intrusive node links.

use core::fmt;
use core::ptr;

use socle_atomic::sync::{AtomicPtr, Ordering};

/// The link field an intrusive node embeds.
///
/// Containers own this field while the node is linked; the node's owner must
/// not touch it between push and pop.
pub struct NodeLink<T> {
    next: AtomicPtr<T>,
}

impl<T> NodeLink<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    #[inline]
    pub(crate) fn load_next(&self, order: Ordering) -> *mut T {
        self.next.load(order)
    }

    #[inline]
    pub(crate) fn store_next(&self, next: *mut T, order: Ordering) {
        self.next.store(next, order)
    }
}

impl<T> Default for NodeLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for NodeLink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeLink")
            .field(&self.next.load(Ordering::Relaxed))
            .finish()
    }
}

/// Types that can sit in the intrusive containers.
///
/// # Safety
///
/// `link()` must return a field embedded in `self` (the same one every
/// call), and the implementor must not read or write that link while the
/// node is inside a container.
pub unsafe trait QueueNode: Sized {
    fn link(&self) -> &NodeLink<Self>;
}

/// Chains `nodes` front-to-back through their links, returning (first, last).
///
/// Convenience for bulk insertion via `push_back_many`; the caller still
/// owns every node.
///
/// # Safety
///
/// All pointers must reference live nodes not currently inside a container.
pub unsafe fn chain<T: QueueNode>(
    nodes: impl IntoIterator<Item = core::ptr::NonNull<T>>,
) -> Option<(core::ptr::NonNull<T>, core::ptr::NonNull<T>)> {
    let mut iter = nodes.into_iter();
    let first = iter.next()?;
    let mut last = first;
    for node in iter {
        unsafe { last.as_ref() }
            .link()
            .store_next(node.as_ptr(), Ordering::Relaxed);
        last = node;
    }
    unsafe { last.as_ref() }
        .link()
        .store_next(ptr::null_mut(), Ordering::Relaxed);
    Some((first, last))
}
