/// Errors from block allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The requested size exceeds the largest configured block size.
    /// Oversize requests never fall through to the backing allocator.
    Oversize { size: usize, max_block_size: usize },
    /// The backing allocator could not provide a new segment.
    BackingExhausted { bytes: usize },
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversize {
                size,
                max_block_size,
            } => {
                write!(
                    f,
                    "requested {} bytes but the largest block size is {}",
                    size, max_block_size
                )
            }
            Self::BackingExhausted { bytes } => {
                write!(f, "backing allocator failed to provide {} bytes", bytes)
            }
        }
    }
}

impl std::error::Error for AllocError {}

/// Errors from bucket catalog validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A size parameter must be a power of two.
    NotPowerOfTwo { name: &'static str, value: usize },
    /// Subdivisions must be a power of two.
    SubdivisionsNotPowerOfTwo { value: usize },
    /// The minimum block size cannot represent the intrusive free link for
    /// this many subdivisions.
    MinBlockTooSmall { min: usize, required: usize },
    /// min_block_size must not exceed max_block_size.
    MinAboveMax { min: usize, max: usize },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPowerOfTwo { name, value } => {
                write!(f, "{} must be a power of two, got {}", name, value)
            }
            Self::SubdivisionsNotPowerOfTwo { value } => {
                write!(f, "subdivisions must be a power of two, got {}", value)
            }
            Self::MinBlockTooSmall { min, required } => {
                write!(
                    f,
                    "min_block_size {} too small: need at least {} to keep \
                     every block size link-aligned",
                    min, required
                )
            }
            Self::MinAboveMax { min, max } => {
                write!(f, "min_block_size {} exceeds max_block_size {}", min, max)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
