//! Error types. Allocation failures are reported to callers as `None` (the
//! null pointer of `malloc`), but internally every fallible step returns one
//! of these so that the reason can be logged.

use thiserror::Error;

/// Reasons why the heap could not produce memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Growing the arena by `requested` bytes would exceed its `limit`.
    #[error("arena exhausted: cannot grow by {requested} bytes (limit {limit})")]
    ArenaExhausted { requested: usize, limit: usize },

    /// The platform refused to reserve the backing address range.
    #[error("failed to reserve {length} bytes of address space")]
    Reserve { length: usize },

    /// Request size arithmetic overflowed.
    #[error("requested size overflows")]
    SizeOverflow,

    /// The heap was built with an invalid [`crate::Config`].
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Rejected [`crate::Config`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("size class limit {limit} at index {index} must be larger than the minimum block size and a multiple of the alignment")]
    InvalidSizeClass { index: usize, limit: usize },

    #[error("size class limits must be strictly increasing (index {index})")]
    UnorderedSizeClasses { index: usize },

    #[error("fit_candidates must be at least 1")]
    ZeroFitCandidates,

    #[error("chunk_size {0} must be a non-zero multiple of the alignment")]
    InvalidChunkSize(usize),

    #[error("arena_limit {limit} cannot hold the sentinels plus one chunk of {chunk_size} bytes")]
    ArenaTooSmall { limit: usize, chunk_size: usize },
}

/// Heap invariant violations found by [`crate::Heap::verify`]. Offsets are
/// relative to the arena base. These always point to a caller bug such as a
/// buffer overrun through a payload; the heap cannot repair itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("prologue header is not an allocated zero-sized block")]
    Prologue,

    #[error("epilogue header at offset {offset} is not an allocated zero-sized block")]
    Epilogue { offset: usize },

    #[error("block at offset {offset} is not aligned")]
    Misaligned { offset: usize },

    #[error("block at offset {offset} has invalid size {size}")]
    BadSize { offset: usize, size: usize },

    #[error("block at offset {offset} with size {size} runs past the arena end")]
    OutOfBounds { offset: usize, size: usize },

    #[error("free block at offset {offset}: footer does not match header")]
    FooterMismatch { offset: usize },

    #[error("free blocks at offsets {first} and {second} are adjacent")]
    AdjacentFree { first: usize, second: usize },

    #[error("block at offset {offset} records wrong status for its predecessor")]
    PrevBits { offset: usize },

    #[error("free list {bucket} links to offset {link} which is not a block")]
    ListLink { bucket: usize, link: usize },

    #[error("free list {bucket} contains allocated block at offset {offset}")]
    ListedAllocated { bucket: usize, offset: usize },

    #[error("block at offset {offset} is in free list {bucket}, expected {expected}")]
    WrongBucket {
        bucket: usize,
        expected: usize,
        offset: usize,
    },

    #[error("free list {bucket}: back link of block at offset {offset} is broken")]
    BrokenBackLink { bucket: usize, offset: usize },

    #[error("free list {bucket} contains a cycle")]
    ListCycle { bucket: usize },

    #[error("{listed} blocks in free lists but {walked} free blocks in the arena")]
    FreeCount { listed: usize, walked: usize },
}
