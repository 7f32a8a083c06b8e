use std::ptr::NonNull;

use crate::backing::{BackingAllocator, HeapBacking};
use crate::error::AllocError;
use crate::pool::{BlockPool, PoolStatus};
use crate::size_class::BucketConfig;

/// Segregated-fit block allocator.
///
/// One [`BucketConfig`] bucket maps to one independent block pool, so
/// allocate and deallocate on a warmed-up bucket are lock-free and O(1).
/// Blocks are never split or merged: freeing returns a block to its own
/// bucket and nothing else, trading fragmentation for contention-free
/// deallocation. Capacity grows per bucket in segments drawn from the
/// backing allocator, roughly doubling each time.
///
/// Dropping the allocator (or calling
/// [`deallocate_all`](Self::deallocate_all)) returns whole segments to the
/// backing and invalidates every block it ever handed out.
pub struct SegregatedAllocator<B: BackingAllocator = HeapBacking> {
    config: BucketConfig,
    pools: Box<[BlockPool]>,
    backing: B,
}

impl SegregatedAllocator<HeapBacking> {
    /// Heap-backed allocator for `config`.
    pub fn new(config: BucketConfig) -> Self {
        Self::with_backing(config, HeapBacking::new())
    }
}

impl<B: BackingAllocator> SegregatedAllocator<B> {
    /// Allocator drawing segments from an injected backing.
    pub fn with_backing(config: BucketConfig, backing: B) -> Self {
        let pools = (0..config.bucket_count())
            .map(|bucket| BlockPool::new(config.block_size(bucket)))
            .collect();
        Self {
            config,
            pools,
            backing,
        }
    }

    /// Allocates a block of at least `size` bytes (exactly
    /// [`optimal_size`](Self::optimal_size) of it).
    ///
    /// Lock-free when the bucket has a free block; otherwise expands the
    /// bucket under its expansion lock. Requests above the configured
    /// maximum fail with [`AllocError::Oversize`] and never reach the
    /// backing allocator.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size > self.config.max_block_size() {
            return Err(AllocError::Oversize {
                size,
                max_block_size: self.config.max_block_size(),
            });
        }
        self.pools[self.config.bucket_of(size)].allocate(&self.backing)
    }

    /// Returns a block to its bucket. Never coalesces, never blocks.
    ///
    /// # Safety
    ///
    /// `block` must come from [`allocate`](Self::allocate) on this
    /// allocator with a request that maps to the same bucket as `size`,
    /// must not have been deallocated already, and must no longer be read
    /// or written by the caller.
    pub unsafe fn deallocate(&self, block: NonNull<u8>, size: usize) {
        debug_assert!(size <= self.config.max_block_size());
        let bucket = self.config.bucket_of(size);
        unsafe { self.pools[bucket].deallocate(block) };
    }

    /// Rounds `size` up to the block size [`allocate`](Self::allocate)
    /// would serve it with. Pure function of the catalog configuration.
    #[inline]
    pub fn optimal_size(&self, size: usize) -> usize {
        self.config.optimal_size(size)
    }

    #[inline]
    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    #[inline]
    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// Returns every segment of every bucket to the backing allocator.
    ///
    /// Uses the backing's bulk [`release_all`] when it has one instead of
    /// walking segment lists. All outstanding blocks are invalidated.
    ///
    /// [`release_all`]: BackingAllocator::release_all
    pub fn deallocate_all(&mut self) {
        let reclaimed = self.backing.release_all();
        for pool in self.pools.iter_mut() {
            pool.release_segments(&self.backing, reclaimed);
        }
        tracing::debug!(bulk = reclaimed, "released all segments");
    }

    /// Point-in-time diagnostics across all buckets. Free counts are
    /// relaxed estimates and may lag concurrent traffic.
    pub fn status(&self) -> AllocatorStatus {
        let buckets: Vec<PoolStatus> = self.pools.iter().map(BlockPool::status).collect();
        let mut status = AllocatorStatus {
            capacity: 0,
            free: 0,
            segments: 0,
            buckets,
        };
        for bucket in &status.buckets {
            status.capacity += bucket.capacity;
            status.free += bucket.free;
            status.segments += bucket.segments;
        }
        status
    }
}

impl<B: BackingAllocator> Drop for SegregatedAllocator<B> {
    fn drop(&mut self) {
        self.deallocate_all();
    }
}

impl<B: BackingAllocator> std::fmt::Debug for SegregatedAllocator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegregatedAllocator")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Snapshot of every bucket plus totals, from
/// [`SegregatedAllocator::status`].
#[derive(Debug, Clone, Default)]
pub struct AllocatorStatus {
    /// Per-bucket snapshots, indexed by bucket.
    pub buckets: Vec<PoolStatus>,
    /// Total blocks carved.
    pub capacity: usize,
    /// Total free-block estimate.
    pub free: usize,
    /// Total backing segments held.
    pub segments: usize,
}

impl std::fmt::Display for AllocatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "SegregatedAllocator blocks: {} total, {} free, {} segments",
            self.capacity, self.free, self.segments
        )?;
        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.capacity > 0 {
                writeln!(
                    f,
                    "  bucket[{}] ({:>7}B): {:>5} total, {:>5} free, {:>3} segments",
                    i, bucket.block_size, bucket.capacity, bucket.free, bucket.segments
                )?;
            }
        }
        Ok(())
    }
}
