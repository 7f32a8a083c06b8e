//! Coarse allocators that provide segment memory to the block pools.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::error::AllocError;

/// Minimum alignment every backing allocator must provide.
pub const BACKING_ALIGN: usize = 64;

/// Source of segment memory for capacity expansion.
///
/// Implementations hand out raw regions of at least [`BACKING_ALIGN`]
/// alignment. The pools inject the backing explicitly, so tests can swap in
/// counting or arena implementations without touching the allocator.
pub trait BackingAllocator {
    /// Allocates `size` bytes. `size` is always nonzero and already rounded
    /// through [`optimal_size`](Self::optimal_size).
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError>;

    /// Returns a region obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(size)` on this same backing and must
    /// not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);

    /// Rounds a request up to the size this backing would actually reserve.
    /// Pure, and idempotent: `optimal_size(optimal_size(x)) == optimal_size(x)`.
    fn optimal_size(&self, size: usize) -> usize;

    /// Bulk-release hook: returns `true` if the backing reclaimed every
    /// outstanding region at once, in which case the caller must not
    /// release them individually (nor touch them again).
    fn release_all(&self) -> bool {
        false
    }
}

/// Process-heap backing via `std::alloc`, 64-byte aligned.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapBacking;

impl HeapBacking {
    pub const fn new() -> Self {
        Self
    }
}

impl BackingAllocator for HeapBacking {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(size > 0);
        let layout = Layout::from_size_align(size, BACKING_ALIGN)
            .map_err(|_| AllocError::BackingExhausted { bytes: size })?;
        // SAFETY: layout has nonzero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::BackingExhausted { bytes: size })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: caller guarantees ptr came from allocate(size), which used
        // this exact layout.
        unsafe {
            std::alloc::dealloc(
                ptr.as_ptr(),
                Layout::from_size_align_unchecked(size, BACKING_ALIGN),
            );
        }
    }

    fn optimal_size(&self, size: usize) -> usize {
        size.saturating_add(BACKING_ALIGN - 1) & !(BACKING_ALIGN - 1)
    }
}

/// Anonymous-page backing via `mmap(2)`; segments come in whole pages.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PageBacking;

#[cfg(unix)]
impl PageBacking {
    pub const fn new() -> Self {
        Self
    }

    /// The system page size, queried once.
    pub fn page_size() -> usize {
        static PAGE_SIZE: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
        *PAGE_SIZE.get_or_init(|| {
            // SAFETY: sysconf has no memory preconditions.
            let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if raw > 0 { raw as usize } else { 4096 }
        })
    }
}

#[cfg(unix)]
impl BackingAllocator for PageBacking {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(size > 0);
        // SAFETY: anonymous private mapping, no fd, no address hint.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(AllocError::BackingExhausted { bytes: size });
        }
        NonNull::new(ptr.cast()).ok_or(AllocError::BackingExhausted { bytes: size })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: caller guarantees this is a whole mapping from allocate.
        unsafe {
            libc::munmap(ptr.as_ptr().cast(), size);
        }
    }

    fn optimal_size(&self, size: usize) -> usize {
        let page = Self::page_size();
        size.saturating_add(page - 1) & !(page - 1)
    }
}
