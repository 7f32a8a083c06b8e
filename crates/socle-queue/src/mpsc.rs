//! Multi-producer single-consumer intrusive containers.
//!
//! Producer side is identical to the mpmc containers. The consumer-side CAS
//! loop is replaced by one exclusive-access bit: the thread that wins the
//! bit dequeues with plain loads and stores, everyone else gets `None`
//! immediately. There is no wake primitive here; these are for polling
//! consumers, and a `None` caused by a lost bit race resolves itself on the
//! caller's next poll.
//!
//! With a single consumer inside the critical section, `front`/`top` need no
//! generation tag: a node can only re-enter the container after the consumer
//! hands it back, so the ABA window of the mpmc pop does not exist.

use core::ptr::{self, NonNull};

use socle_atomic::sync::{AtomicBool, AtomicPtr, Ordering};
use socle_atomic::CachePadded;

use crate::node::QueueNode;

/// Lock-free multi-producer single-consumer intrusive FIFO.
///
/// Same node-ownership contract as
/// [`MpmcNodeQueue`](crate::mpmc::MpmcNodeQueue).
pub struct MpscNodeQueue<T: QueueNode> {
    front: CachePadded<AtomicPtr<T>>,
    back: CachePadded<AtomicPtr<T>>,
    consumer: CachePadded<AtomicBool>,
}

impl<T: QueueNode> MpscNodeQueue<T> {
    pub fn new() -> Self {
        Self {
            front: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            back: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            consumer: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// True iff the queue is empty; authoritative.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.back.load(Ordering::Acquire).is_null()
    }

    /// Appends a node. Safe to call from any number of threads.
    ///
    /// # Safety
    ///
    /// Same contract as
    /// [`MpmcNodeQueue::push_back`](crate::mpmc::MpmcNodeQueue::push_back).
    pub unsafe fn push_back(&self, node: NonNull<T>) {
        unsafe { node.as_ref() }
            .link()
            .store_next(ptr::null_mut(), Ordering::Relaxed);

        let prev = self.back.swap(node.as_ptr(), Ordering::AcqRel);
        if prev.is_null() {
            self.front.store(node.as_ptr(), Ordering::Release);
        } else {
            unsafe { (*prev).link() }.store_next(node.as_ptr(), Ordering::Release);
        }
    }

    /// Appends a pre-linked chain `first -> .. -> last` in one swap.
    ///
    /// # Safety
    ///
    /// Same contract as
    /// [`MpmcNodeQueue::push_back_many`](crate::mpmc::MpmcNodeQueue::push_back_many).
    pub unsafe fn push_back_many(&self, first: NonNull<T>, last: NonNull<T>) {
        unsafe { last.as_ref() }
            .link()
            .store_next(ptr::null_mut(), Ordering::Relaxed);

        let prev = self.back.swap(last.as_ptr(), Ordering::AcqRel);
        if prev.is_null() {
            self.front.store(first.as_ptr(), Ordering::Release);
        } else {
            unsafe { (*prev).link() }.store_next(first.as_ptr(), Ordering::Release);
        }
    }

    /// Removes the front node.
    ///
    /// `None` can mean empty, a push mid-flight, or another thread holding
    /// the consumer bit; only [`is_empty`](Self::is_empty) is authoritative.
    pub fn try_pop_front(&self) -> Option<NonNull<T>> {
        if self
            .consumer
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        let result = self.pop_exclusive();
        self.consumer.store(false, Ordering::Release);
        result
    }

    /// Dequeue with the consumer bit held.
    fn pop_exclusive(&self) -> Option<NonNull<T>> {
        let node = self.front.load(Ordering::Acquire);
        if node.is_null() {
            // Empty, or an empty-publish is still in flight.
            return None;
        }

        let next = unsafe { (*node).link() }.load_next(Ordering::Acquire);
        if !next.is_null() {
            // We are the only front writer while the queue is non-empty.
            self.front.store(next, Ordering::Release);
            return NonNull::new(node);
        }

        // Sole-node candidate.
        if self
            .back
            .compare_exchange(node, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Empty now. Clear front unless a producer already re-published;
            // its store wins the race by design.
            let _ = self.front.compare_exchange(
                node,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            return NonNull::new(node);
        }

        // A push landed behind this node but its link is not visible yet.
        None
    }
}

impl<T: QueueNode> Default for MpscNodeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free multi-producer single-consumer intrusive LIFO.
pub struct MpscNodeStack<T: QueueNode> {
    top: CachePadded<AtomicPtr<T>>,
    consumer: CachePadded<AtomicBool>,
}

impl<T: QueueNode> MpscNodeStack<T> {
    pub fn new() -> Self {
        Self {
            top: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            consumer: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// True iff the stack is empty; authoritative.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top.load(Ordering::Acquire).is_null()
    }

    /// Pushes a node. An untagged Treiber push is ABA-clean: the CAS only
    /// requires that `top` still equals the observed node, and whatever
    /// chain hangs off that node is current by definition.
    ///
    /// # Safety
    ///
    /// Same contract as
    /// [`MpmcNodeQueue::push_back`](crate::mpmc::MpmcNodeQueue::push_back).
    pub unsafe fn push(&self, node: NonNull<T>) {
        let mut observed = self.top.load(Ordering::Relaxed);
        loop {
            unsafe { node.as_ref() }
                .link()
                .store_next(observed, Ordering::Relaxed);

            match self.top.compare_exchange_weak(
                observed,
                node.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => observed = actual,
            }
        }
    }

    /// Pops the top node; `None` if empty-looking or the consumer bit is
    /// held elsewhere.
    pub fn try_pop(&self) -> Option<NonNull<T>> {
        if self
            .consumer
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        let result = self.pop_exclusive();
        self.consumer.store(false, Ordering::Release);
        result
    }

    fn pop_exclusive(&self) -> Option<NonNull<T>> {
        loop {
            let node = self.top.load(Ordering::Acquire);
            if node.is_null() {
                return None;
            }

            // Sole popper: `node` cannot be recycled under us, so its link
            // is stable and the CAS below only contends with pushers.
            let next = unsafe { (*node).link() }.load_next(Ordering::Acquire);

            if self
                .top
                .compare_exchange_weak(node, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return NonNull::new(node);
            }
        }
    }
}

impl<T: QueueNode> Default for MpscNodeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}
