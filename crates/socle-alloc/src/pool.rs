//! Single-size block pools.
//!
//! One pool serves exactly one block size. Free blocks live in a lock-free
//! mpmc node queue, with the link written intrusively into the block memory
//! itself. Capacity expansion is the only locked path: a new segment is
//! carved into blocks and the whole batch lands in the free queue with one
//! publish.

use std::hint;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

use socle_atomic::Atomic;
use socle_queue::{self as queue, MpmcNodeQueue, NodeLink, QueueNode};
use socle_sync::Lock;

use crate::backing::BackingAllocator;
use crate::error::AllocError;

/// View of a free block: the first machine words hold the intrusive link
/// while the block sits in the pool. Catalog validation guarantees every
/// block size and offset is aligned for this.
#[repr(C)]
struct FreeBlock {
    link: NodeLink<FreeBlock>,
}

unsafe impl QueueNode for FreeBlock {
    fn link(&self) -> &NodeLink<Self> {
        &self.link
    }
}

/// Header at the base of every backing segment, linking segments into a
/// per-pool list for teardown. Blocks start at [`SEGMENT_HEADER_BYTES`] so
/// they inherit the backing's alignment.
#[repr(C)]
struct SegmentHeader {
    next: *mut SegmentHeader,
    bytes: usize,
}

const SEGMENT_HEADER_BYTES: usize = 64;
const _: () = assert!(mem::size_of::<SegmentHeader>() <= SEGMENT_HEADER_BYTES);

/// Point-in-time view of one pool, for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStatus {
    /// Block size served by this pool.
    pub block_size: usize,
    /// Blocks carved so far.
    pub capacity: usize,
    /// Free-block estimate. Relaxed counter, may lag concurrent traffic.
    pub free: usize,
    /// Backing segments held.
    pub segments: usize,
}

/// Lock-free pool of same-size blocks.
pub(crate) struct BlockPool {
    block_size: usize,
    free: MpmcNodeQueue<FreeBlock>,
    expansion: Lock,
    // Written under `expansion` (or exclusively at teardown).
    segments: Atomic<*mut SegmentHeader>,
    segment_count: Atomic<usize>,
    capacity_bytes: Atomic<usize>,
    capacity_blocks: Atomic<usize>,
    free_blocks: Atomic<usize>,
}

impl BlockPool {
    pub(crate) fn new(block_size: usize) -> Self {
        debug_assert!(block_size >= mem::size_of::<FreeBlock>());
        Self {
            block_size,
            free: MpmcNodeQueue::new(),
            expansion: Lock::new(),
            segments: Atomic::new(ptr::null_mut()),
            segment_count: Atomic::new(0),
            capacity_bytes: Atomic::new(0),
            capacity_blocks: Atomic::new(0),
            free_blocks: Atomic::new(0),
        }
    }

    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    /// Pops a free block, expanding capacity when the pool is truly empty.
    pub(crate) fn allocate<B: BackingAllocator>(
        &self,
        backing: &B,
    ) -> Result<NonNull<u8>, AllocError> {
        loop {
            if let Some(block) = self.free.try_pop_front() {
                self.free_blocks.fetch_sub(1, Ordering::Relaxed);
                return Ok(block.cast());
            }
            if !self.free.is_empty() {
                // In-flight push or racing pop, not real exhaustion.
                hint::spin_loop();
                continue;
            }
            self.expand(backing)?;
        }
    }

    /// Returns a block to the pool.
    ///
    /// # Safety
    ///
    /// `block` must have come from [`allocate`](Self::allocate) on this pool
    /// and must not be in the pool already.
    pub(crate) unsafe fn deallocate(&self, block: NonNull<u8>) {
        let node = block.cast::<FreeBlock>();
        // Reclaim the first words of the block for the free link.
        unsafe {
            ptr::write(node.as_ptr(), FreeBlock {
                link: NodeLink::new(),
            });
        }
        self.free_blocks.fetch_add(1, Ordering::Relaxed);
        unsafe { self.free.push_back(node) };
    }

    /// Slow path: adds one segment under the expansion lock.
    ///
    /// Each expansion requests at least the pool's current block capacity in
    /// bytes, so capacity roughly doubles every time.
    fn expand<B: BackingAllocator>(&self, backing: &B) -> Result<(), AllocError> {
        let _held = self.expansion.guard();
        if !self.free.is_empty() {
            // Somebody expanded while we waited for the lock.
            return Ok(());
        }

        let want = SEGMENT_HEADER_BYTES
            + self
                .block_size
                .max(self.capacity_bytes.load(Ordering::Relaxed));
        let segment_bytes = backing.optimal_size(want);
        let base = backing.allocate(segment_bytes)?;
        let count = (segment_bytes - SEGMENT_HEADER_BYTES) / self.block_size;
        debug_assert!(count > 0);

        // SAFETY: the segment is fresh exclusive memory of segment_bytes
        // bytes, large enough for the header plus count blocks.
        unsafe {
            let header = base.as_ptr().cast::<SegmentHeader>();
            ptr::write(header, SegmentHeader {
                next: self.segments.load(Ordering::Relaxed),
                bytes: segment_bytes,
            });
            self.segments.store(header, Ordering::Relaxed);

            // Counters move before the blocks become poppable so the free
            // estimate never underflows.
            self.segment_count.fetch_add(1, Ordering::Relaxed);
            self.capacity_bytes
                .fetch_add(count * self.block_size, Ordering::Relaxed);
            self.capacity_blocks.fetch_add(count, Ordering::Relaxed);
            self.free_blocks.fetch_add(count, Ordering::Relaxed);

            let first_block = base.as_ptr().add(SEGMENT_HEADER_BYTES);
            let blocks = (0..count).map(|i| {
                let block = first_block.add(i * self.block_size).cast::<FreeBlock>();
                ptr::write(block, FreeBlock {
                    link: NodeLink::new(),
                });
                NonNull::new_unchecked(block)
            });
            if let Some((first, last)) = queue::chain(blocks) {
                self.free.push_back_many(first, last);
            }
        }

        tracing::debug!(
            block_size = self.block_size,
            segment_bytes,
            blocks = count,
            capacity = self.capacity_blocks.load(Ordering::Relaxed),
            "expanded block pool"
        );
        Ok(())
    }

    /// Returns every segment to the backing and empties the pool.
    ///
    /// With `backing_reclaimed` set the segment memory is already gone (the
    /// backing released everything in bulk) and must not be touched.
    ///
    /// All blocks, allocated or free, are invalidated.
    pub(crate) fn release_segments<B: BackingAllocator>(
        &mut self,
        backing: &B,
        backing_reclaimed: bool,
    ) {
        let mut segment = self.segments.swap(ptr::null_mut(), Ordering::Relaxed);
        if !backing_reclaimed {
            while !segment.is_null() {
                // SAFETY: headers are only reachable once through the list,
                // and the pool is borrowed exclusively.
                unsafe {
                    let header = ptr::read(segment);
                    backing.deallocate(NonNull::new_unchecked(segment.cast()), header.bytes);
                    segment = header.next;
                }
            }
        }
        self.free = MpmcNodeQueue::new();
        self.segment_count.store(0, Ordering::Relaxed);
        self.capacity_bytes.store(0, Ordering::Relaxed);
        self.capacity_blocks.store(0, Ordering::Relaxed);
        self.free_blocks.store(0, Ordering::Relaxed);
    }

    pub(crate) fn status(&self) -> PoolStatus {
        PoolStatus {
            block_size: self.block_size,
            capacity: self.capacity_blocks.load(Ordering::Relaxed),
            free: self.free_blocks.load(Ordering::Relaxed),
            segments: self.segment_count.load(Ordering::Relaxed),
        }
    }
}
