//! The two-level size-class catalog.
//!
//! First level: power-of-two ranges. Second level: each range split into
//! `subdivisions` equal slices. For a request of `size` bytes:
//!
//! ```text
//! bucket     = highest_set_bit(size - 1)
//! sub        = ((size - 1) & ((1 << bucket) - 1)) >> (bucket - log2(subdivisions))
//! block_size = (1 << bucket) + ((sub + 1) << (bucket - log2(subdivisions)))
//! ```
//!
//! [`optimal_size`](BucketConfig::optimal_size) is a pure function of the
//! request and the three configuration constants, so callers can precompute
//! buffer sizes externally and rely on getting exactly these values back.

use crate::error::ConfigError;

/// Every block must be able to hold the intrusive free-list link while it
/// sits in a pool, so the slice granularity of the smallest range cannot
/// drop below this.
const LINK_ALIGN: usize = 8;

/// Validated size-class catalog: `min_block_size`, `max_block_size`, and
/// the per-range subdivision count, all powers of two.
///
/// Requests at or below the minimum share bucket 0; requests above the
/// maximum are rejected by the allocator (and mapped to identity by
/// [`optimal_size`](Self::optimal_size)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    min_block_size: usize,
    max_block_size: usize,
    subdivisions: usize,
    min_shift: u32,
    sub_shift: u32,
}

impl BucketConfig {
    /// Validates and builds a catalog.
    pub const fn new(
        min_block_size: usize,
        max_block_size: usize,
        subdivisions: usize,
    ) -> Result<Self, ConfigError> {
        if !min_block_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                name: "min_block_size",
                value: min_block_size,
            });
        }
        if !max_block_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                name: "max_block_size",
                value: max_block_size,
            });
        }
        if !subdivisions.is_power_of_two() {
            return Err(ConfigError::SubdivisionsNotPowerOfTwo {
                value: subdivisions,
            });
        }
        // Keeps the slice granularity of every range at LINK_ALIGN or more,
        // which makes every block size a multiple of LINK_ALIGN.
        if min_block_size < LINK_ALIGN * subdivisions {
            return Err(ConfigError::MinBlockTooSmall {
                min: min_block_size,
                required: LINK_ALIGN * subdivisions,
            });
        }
        if min_block_size > max_block_size {
            return Err(ConfigError::MinAboveMax {
                min: min_block_size,
                max: max_block_size,
            });
        }
        Ok(Self {
            min_block_size,
            max_block_size,
            subdivisions,
            min_shift: min_block_size.trailing_zeros(),
            sub_shift: subdivisions.trailing_zeros(),
        })
    }

    #[inline]
    pub const fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    #[inline]
    pub const fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    #[inline]
    pub const fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    /// Number of distinct block sizes in the catalog.
    pub const fn bucket_count(&self) -> usize {
        let max_shift = self.max_block_size.trailing_zeros();
        (max_shift - self.min_shift) as usize * self.subdivisions + 1
    }

    /// Maps a request to its bucket index.
    ///
    /// Callers must reject sizes above `max_block_size` first.
    pub const fn bucket_of(&self, size: usize) -> usize {
        debug_assert!(size <= self.max_block_size);
        if size <= self.min_block_size {
            return 0;
        }
        let n = size - 1;
        let range = (usize::BITS - 1 - n.leading_zeros()) as usize;
        let sub = (n & ((1 << range) - 1)) >> (range as u32 - self.sub_shift);
        (range - self.min_shift as usize) * self.subdivisions + sub + 1
    }

    /// The block size served by `bucket`.
    pub const fn block_size(&self, bucket: usize) -> usize {
        debug_assert!(bucket < self.bucket_count());
        if bucket == 0 {
            return self.min_block_size;
        }
        let range = self.min_shift as usize + (bucket - 1) / self.subdivisions;
        let sub = (bucket - 1) % self.subdivisions;
        (1 << range) + ((sub + 1) << (range as u32 - self.sub_shift))
    }

    /// Rounds `size` up to the block size that would serve it.
    ///
    /// Total over all inputs: sizes at or below the minimum round up to
    /// `min_block_size`, sizes above the maximum map to themselves.
    pub const fn optimal_size(&self, size: usize) -> usize {
        if size > self.max_block_size {
            return size;
        }
        self.block_size(self.bucket_of(size))
    }
}
