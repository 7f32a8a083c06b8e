//! Multi-producer multi-consumer intrusive containers.
//!
//! # Queue protocol
//!
//! ```text
//! push:  back.swap(node)          pop:   front = (node, gen)
//!        prev != null                    next = node.next
//!          prev.next = node              next != null:
//!        prev == null                      CAS front -> (next, gen+1)
//!          front = (node, gen+1)         next == null (sole node?):
//!                                          CAS front -> (BUSY, gen+1)
//!                                          CAS back node -> null
//!                                            ok:   front -> (null, gen+2)
//!                                            race: front -> (node, gen+2), None
//! ```
//!
//! `front` carries a generation tag in a double-width word: every transition
//! bumps it, so a stalled CAS can never mistake a recycled node at the same
//! address for the one it originally observed. `back == null` is the only
//! authoritative empty signal; `try_pop_front` returning `None` may just
//! mean a push is mid-flight.
//!
//! The BUSY marker makes the sole-node dequeue exclusive: other poppers see
//! it and bail out, and the `back` CAS detects a racing push before the
//! push's `next` link is visible (the node is never handed back while a
//! producer still needs to write through it).
//!
//! # Stack protocol
//!
//! Classic Treiber CAS loop over a tagged `top`; the tag bump on every swing
//! is the ABA defeat for pop's `next` read.

use core::ptr::{self, NonNull};

use socle_atomic::sync::{AtomicPtr, Ordering, spin_loop};
use socle_atomic::{AtomicTaggedPtr, CachePadded, TaggedPtr};

use crate::node::QueueNode;

/// Sentinel front value while one popper holds exclusive access to the sole
/// remaining node. Deliberately misaligned so it can never equal a real
/// node address.
#[inline]
fn busy_marker<T>() -> *mut T {
    usize::MAX as *mut T
}

/// Lock-free multi-producer multi-consumer intrusive FIFO.
///
/// The queue never allocates: callers own node memory before push and after
/// pop. Node memory must stay mapped while any thread may still be inside an
/// operation that observed it (recycling is fine, unmapping is not).
pub struct MpmcNodeQueue<T: QueueNode> {
    front: CachePadded<AtomicTaggedPtr<T>>,
    back: CachePadded<AtomicPtr<T>>,
}

impl<T: QueueNode> MpmcNodeQueue<T> {
    pub fn new() -> Self {
        Self {
            front: CachePadded::new(AtomicTaggedPtr::new(TaggedPtr::null())),
            back: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// True iff the queue is empty. This is the authoritative check;
    /// `try_pop_front` returning `None` is not.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.back.load(Ordering::Acquire).is_null()
    }

    /// Appends a node.
    ///
    /// # Safety
    ///
    /// The caller must own `node`, keep its memory valid until it is popped
    /// (and mapped for as long as any thread may be mid-operation), and must
    /// not touch its link while linked.
    pub unsafe fn push_back(&self, node: NonNull<T>) {
        unsafe { node.as_ref() }
            .link()
            .store_next(ptr::null_mut(), Ordering::Relaxed);

        let prev = self.back.swap(node.as_ptr(), Ordering::AcqRel);
        if prev.is_null() {
            // Queue was empty: publish the node as front. Plain store is
            // fine; poppers never write a null front, and a popper
            // finalizing the previous sole-node dequeue uses a CAS from the
            // BUSY marker that loses gracefully to this store.
            let observed = self.front.load(Ordering::Relaxed);
            self.front
                .store(observed.with_ptr(node.as_ptr()).bumped(), Ordering::Release);
        } else {
            // The two-phase pop keeps `prev` inside the queue until this
            // link is written, so the store never targets caller-owned
            // memory.
            unsafe { (*prev).link() }.store_next(node.as_ptr(), Ordering::Release);
        }
    }

    /// Appends a pre-linked chain `first -> .. -> last` in one swap.
    ///
    /// # Safety
    ///
    /// Same contract as [`push_back`](Self::push_back) for every node in the
    /// chain; the chain must already be linked front-to-back (see
    /// [`chain`](crate::node::chain)).
    pub unsafe fn push_back_many(&self, first: NonNull<T>, last: NonNull<T>) {
        unsafe { last.as_ref() }
            .link()
            .store_next(ptr::null_mut(), Ordering::Relaxed);

        let prev = self.back.swap(last.as_ptr(), Ordering::AcqRel);
        if prev.is_null() {
            let observed = self.front.load(Ordering::Relaxed);
            self.front
                .store(observed.with_ptr(first.as_ptr()).bumped(), Ordering::Release);
        } else {
            unsafe { (*prev).link() }.store_next(first.as_ptr(), Ordering::Release);
        }
    }

    /// Removes the front node.
    ///
    /// `None` means "nothing available right now": the queue may be empty,
    /// another popper may hold the sole-node marker, or a push may be
    /// mid-flight. Callers that need a definitive answer check
    /// [`is_empty`](Self::is_empty) and retry.
    pub fn try_pop_front(&self) -> Option<NonNull<T>> {
        loop {
            let observed = self.front.load(Ordering::Acquire);
            let node = observed.ptr();
            if node.is_null() || node == busy_marker() {
                return None;
            }

            // Contract: node memory is still mapped, so this read is safe
            // even if the node was concurrently popped and recycled; the
            // front CAS below rejects the stale generation in that case.
            let next = unsafe { (*node).link() }.load_next(Ordering::Acquire);

            if !next.is_null() {
                match self.front.compare_exchange_weak(
                    observed,
                    observed.with_ptr(next).bumped(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return NonNull::new(node),
                    Err(_) => {
                        spin_loop();
                        continue;
                    }
                }
            }

            // Sole-node candidate (or a push is mid-flight and its next link
            // is not visible yet). Take exclusive access.
            let marker = observed.with_ptr(busy_marker()).bumped();
            if self
                .front
                .compare_exchange(observed, marker, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                spin_loop();
                continue;
            }

            if self
                .back
                .compare_exchange(node, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // Queue is empty. Finalize the front; if an empty-push
                // already replaced the marker, its value wins.
                let _ = self.front.compare_exchange(
                    marker,
                    marker.with_ptr(ptr::null_mut()).bumped(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                return NonNull::new(node);
            }

            // A racing push moved `back`: the node is not sole after all and
            // its next link will become visible shortly. Hand front back.
            self.front
                .store(marker.with_ptr(node).bumped(), Ordering::Release);
            return None;
        }
    }
}

impl<T: QueueNode> Default for MpmcNodeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free multi-producer multi-consumer intrusive LIFO.
///
/// Same ownership contract as [`MpmcNodeQueue`].
pub struct MpmcNodeStack<T: QueueNode> {
    top: CachePadded<AtomicTaggedPtr<T>>,
}

impl<T: QueueNode> MpmcNodeStack<T> {
    pub fn new() -> Self {
        Self {
            top: CachePadded::new(AtomicTaggedPtr::new(TaggedPtr::null())),
        }
    }

    /// True iff the stack is empty. Authoritative, like the queue's.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top.load(Ordering::Acquire).is_null()
    }

    /// Pushes a node.
    ///
    /// # Safety
    ///
    /// Same contract as [`MpmcNodeQueue::push_back`].
    pub unsafe fn push(&self, node: NonNull<T>) {
        let mut observed = self.top.load(Ordering::Relaxed);
        loop {
            unsafe { node.as_ref() }
                .link()
                .store_next(observed.ptr(), Ordering::Relaxed);

            match self.top.compare_exchange_weak(
                observed,
                observed.with_ptr(node.as_ptr()).bumped(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    observed = actual;
                    spin_loop();
                }
            }
        }
    }

    /// Pops the top node, or `None` if the stack looked empty.
    pub fn try_pop(&self) -> Option<NonNull<T>> {
        loop {
            let observed = self.top.load(Ordering::Acquire);
            let node = observed.ptr();
            if node.is_null() {
                return None;
            }

            // Same mapped-memory contract as the queue: a stale read here is
            // rejected by the generation check in the CAS.
            let next = unsafe { (*node).link() }.load_next(Ordering::Acquire);

            match self.top.compare_exchange_weak(
                observed,
                observed.with_ptr(next).bumped(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return NonNull::new(node),
                Err(_) => spin_loop(),
            }
        }
    }
}

impl<T: QueueNode> Default for MpmcNodeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}
