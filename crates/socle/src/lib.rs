//! Lock-free foundations for systems code.
//!
//! `socle` is the facade over four layered crates, re-exported here both as
//! modules and as flat types:
//!
//! - [`atomic`]: typed atomic cells over every machine width (8 through 128
//!   bits plus pointers), tagged double-word pointers, cache-line padding
//! - [`queue`]: intrusive lock-free node queues and stacks, mpmc and mpsc
//! - [`sync`]: futex-backed lock, semaphores, event, condition variable,
//!   and barrier with strictly userspace uncontended paths
//! - [`alloc`]: segregated-fit block allocator with lock-free
//!   allocate/deallocate hot paths
//!
//! The layers only depend downward: `queue` and `sync` sit on `atomic`,
//! `alloc` sits on all three. Pull in a member crate directly when you only
//! need one layer.

#![forbid(unsafe_op_in_unsafe_fn)]

pub use socle_alloc as alloc;
pub use socle_atomic as atomic;
pub use socle_queue as queue;
pub use socle_sync as sync;

// Atomic layer
pub use socle_atomic::{Atomic, AtomicTaggedPtr, CachePadded, TaggedPtr};

// Intrusive containers
pub use socle_queue::{
    MpmcNodeQueue, MpmcNodeStack, MpscNodeQueue, MpscNodeStack, NodeLink, QueueNode,
};

// Thread synchronization
pub use socle_sync::{
    Barrier, CappedSemaphore, ConditionVariable, Deadline, EventSemaphore,
    HighCapacitySemaphore, Lock, LockGuard,
};

// Block allocation
pub use socle_alloc::{
    AllocError, BackingAllocator, BucketConfig, ConfigError, HeapBacking, SegregatedAllocator,
};
