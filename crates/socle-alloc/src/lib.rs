//! Segregated-fit block allocator with lock-free fast paths.
//!
//! A [`BucketConfig`] carves the size range into power-of-two ranges, each
//! split into a fixed number of linear sub-buckets. Every bucket gets its
//! own pool of same-size blocks kept on an intrusive lock-free free list,
//! so allocate and deallocate on a warmed-up bucket never take a lock and
//! never touch other buckets. Pools grow by carving segments out of a
//! pluggable [`BackingAllocator`], roughly doubling per expansion.
//!
//! Blocks are never split or coalesced. That makes deallocation O(1) and
//! contention-free, at the cost of per-bucket fragmentation; size the
//! catalog to the workload with [`BucketConfig::optimal_size`].
//!
//! ```
//! use socle_alloc::{BucketConfig, SegregatedAllocator};
//!
//! let alloc = SegregatedAllocator::new(BucketConfig::new(64, 4096, 4)?);
//! let block = alloc.allocate(100)?;
//! // ... block is good for alloc.optimal_size(100) == 112 bytes ...
//! unsafe { alloc.deallocate(block, 100) };
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod backing;
mod error;
mod pool;
mod segregated;
mod size_class;

pub use backing::{BACKING_ALIGN, BackingAllocator, HeapBacking};
#[cfg(unix)]
pub use backing::PageBacking;
pub use error::{AllocError, ConfigError};
pub use pool::PoolStatus;
pub use segregated::{AllocatorStatus, SegregatedAllocator};
pub use size_class::BucketConfig;
