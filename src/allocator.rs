use std::ptr::NonNull;

use crate::{
    align::{adjusted_size, ALIGNMENT, WORD_SIZE},
    arena::Arena,
    block::{Block, FIRST_BLOCK, PROLOGUE},
    config::{Config, DEFAULT_SIZE_CLASSES},
    error::AllocError,
    freelist::FreeLists,
    header::Header,
};

/// This is the allocator. Once you've read [`crate::header`],
/// [`crate::block`] and [`crate::freelist`], this is where everything comes
/// together:
///
/// ```text
///                         Arena
/// +----------+---------+------+---------+------+-----+----------+
/// | Prologue |  Alloc  | Free |  Alloc  | Free | ... | Epilogue |
/// +----------+---------+------+---------+------+-----+----------+
///                         ^                 ^
///                         |                 |
/// lists[0]  --------------+                 |
/// lists[1]                                  |
/// ...                                       |
/// lists[k]  --------------------------------+
/// ...
/// lists[N + 1]
/// ```
///
/// Blocks tile the arena from the prologue to the epilogue with no gaps.
/// Every free block is linked into the list of its size class, and no two
/// free blocks are ever next to each other because we merge them as soon as
/// one of them is freed. When nothing fits a request the arena grows at the
/// end and the new space becomes one more free block, merged with the last
/// block if that one was free too.
///
/// The heap is a plain value without internal locking. Every operation that
/// mutates it takes `&mut self`, so sharing one between threads requires
/// wrapping it in something like [`std::sync::Mutex`].
///
/// # Examples
///
/// ```rust
/// use segalloc::Heap;
///
/// let mut heap = Heap::new().unwrap();
///
/// let address = heap.allocate(40).unwrap();
/// assert_eq!(address.as_ptr() as usize % 16, 0);
///
/// unsafe {
///     address.as_ptr().write_bytes(7, 40);
///     heap.deallocate(Some(address));
/// }
///
/// assert!(heap.check_consistency(0));
/// ```
pub struct Heap<const N: usize = DEFAULT_SIZE_CLASSES> {
    pub(crate) arena: Arena,
    pub(crate) lists: FreeLists<N>,
    pub(crate) config: Config<N>,
}

impl Heap {
    /// Builds a heap with [`Config::default`].
    pub fn new() -> Result<Self, AllocError> {
        Self::with_config(Config::default())
    }
}

impl<const N: usize> Heap<N> {
    /// Builds a heap with the given configuration. The arena starts with the
    /// prologue, one free block of `config.chunk_size` bytes and the
    /// epilogue.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use segalloc::{Config, Heap};
    ///
    /// // Lists for 16, [32, 128), [128, 1024) and [1024, ∞).
    /// let config = Config::with_size_classes([128, 1024])
    ///     .fit_candidates(4)
    ///     .arena_limit(1 << 20);
    ///
    /// let mut heap = Heap::with_config(config).unwrap();
    /// assert!(heap.allocate(100).is_some());
    /// ```
    pub fn with_config(config: Config<N>) -> Result<Self, AllocError> {
        config.validate()?;

        let mut arena = Arena::reserve(config.arena_limit)?;
        arena.grow(2 * WORD_SIZE)?;

        // The first real block is preceded by the prologue, which counts as
        // allocated. The epilogue inherits that until the first extension.
        arena.write_word(PROLOGUE, Header::sentinel(false, true).word());
        arena.write_word(FIRST_BLOCK, Header::sentinel(false, true).word());

        let mut heap = Self {
            arena,
            lists: FreeLists::new(config.size_classes),
            config,
        };

        heap.extend(config.chunk_size)?;

        log::debug!(
            "heap ready: {} lists, chunk size {}, arena limit {}",
            FreeLists::<N>::COUNT,
            config.chunk_size,
            heap.arena.limit()
        );

        Ok(heap)
    }

    /// Returns the address of at least `size` writable bytes aligned to 16,
    /// or `None` if `size` is zero or the arena can't grow any further. On
    /// failure the heap is left exactly as it was.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        match self.allocate_block(size) {
            Ok(block) => {
                let address = self.arena.address_of(block.payload());
                log::trace!("allocate({size}) -> {address:?}");
                Some(address)
            }
            Err(err) => {
                log::warn!("allocate({size}) failed: {err}");
                None
            }
        }
    }

    /// Frees an address previously returned by this heap. `None` is a no-op.
    /// Addresses outside the arena and blocks that are not currently
    /// allocated are ignored.
    ///
    /// # Safety
    ///
    /// `address` must come from [`Self::allocate`], [`Self::reallocate`] or
    /// [`Self::zero_allocate`] on this same heap, and the caller must not use
    /// it after this call.
    pub unsafe fn deallocate(&mut self, address: Option<NonNull<u8>>) {
        let Some(address) = address else {
            return;
        };

        let Some(block) = self.live_block(address) else {
            log::warn!("deallocate({address:?}) ignored, not an allocated block");
            return;
        };

        log::trace!("deallocate({address:?}) size {}", block.header(&self.arena).size());
        self.free_block(block);
    }

    /// Number of bytes that can be written at `address`, which might be more
    /// than what was requested because of rounding. Returns `0` for `None`
    /// or addresses that don't belong to an allocated block.
    ///
    /// # Safety
    ///
    /// Same as [`Self::deallocate`], except that `address` stays valid.
    pub unsafe fn usable_size(&self, address: Option<NonNull<u8>>) -> usize {
        address
            .and_then(|address| self.live_block(address))
            .map_or(0, |block| block.payload_size(&self.arena))
    }

    /// Lowest address of the arena.
    #[inline]
    pub fn low(&self) -> NonNull<u8> {
        self.arena.low()
    }

    /// One past the highest address of the arena.
    #[inline]
    pub fn high(&self) -> NonNull<u8> {
        self.arena.high()
    }

    /// Current arena size in bytes, sentinels included.
    #[inline]
    pub fn arena_size(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn config(&self) -> &Config<N> {
        &self.config
    }

    /// Finds or makes room for `size` bytes and marks the block allocated.
    pub(crate) fn allocate_block(&mut self, size: usize) -> Result<Block, AllocError> {
        let asize = adjusted_size(size).ok_or(AllocError::SizeOverflow)?;

        let block = match self.find_fit(asize) {
            Some(block) => block,
            None => self.extend(asize.max(self.config.chunk_size))?,
        };

        self.place(block, asize);

        Ok(block)
    }

    /// Marks an allocated block free and merges it with its neighbours.
    pub(crate) fn free_block(&mut self, block: Block) {
        let header = block.header(&self.arena);
        block.write(&mut self.arena, header.with_block(header.size(), false));
        self.coalesce(block);
    }

    /// Maps a payload address back to its block, if the address is the
    /// payload of a block that is currently allocated.
    pub(crate) fn live_block(&self, address: NonNull<u8>) -> Option<Block> {
        let payload = self.arena.offset_of(address)?;

        if payload % ALIGNMENT != 0 || payload <= FIRST_BLOCK {
            return None;
        }

        let block = Block::from_payload(payload)?;
        let header = block.header(&self.arena);

        (header.is_allocated() && !header.is_sentinel()).then_some(block)
    }
}
