use crate::{align::WORD_SIZE, arena::Arena, header::Header};

/// Minimum block size in bytes: one header word plus one free list link.
/// Blocks of this size can't fit a footer or a second link, so while free
/// they live in a singly linked list of their own. See [`crate::freelist`].
pub(crate) const MIN_BLOCK_SIZE: usize = 2 * WORD_SIZE;

/// Offset of the prologue word. Nothing can ever link to the prologue, so we
/// reuse its offset as the null free list link.
pub(crate) const PROLOGUE: usize = 0;

/// Offset of the first real block header, right after the prologue.
pub(crate) const FIRST_BLOCK: usize = PROLOGUE + WORD_SIZE;

/// Handle to a block, which is just the arena offset of its header. All the
/// block metadata lives in the arena itself, this type only knows where to
/// look. Here's how the different kinds of blocks look like in memory:
///
/// ```text
/// Allocated block:
///
/// +--------+--------------------------------------------+
/// | header |                  payload                   |
/// +--------+--------------------------------------------+
///          ^
///          +-- Address returned to the caller.
///
/// Minimum size free block (16 bytes):
///
/// +--------+--------+
/// | header |  next  |
/// +--------+--------+
///
/// Larger free block:
///
/// +--------+--------+--------+------------------+--------+
/// | header |  next  |  prev  |     (unused)     | footer |
/// +--------+--------+--------+------------------+--------+
/// ```
///
/// `next` and `prev` are free list links stored as arena offsets of other
/// free block headers, [`PROLOGUE`] meaning "no block". They overlap the
/// payload, which is fine because nobody owns the payload of a free block.
/// The footer is a copy of the header so that the next block can find where
/// this one starts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub(crate) struct Block(usize);

impl Block {
    #[inline]
    pub fn at(offset: usize) -> Self {
        Self(offset)
    }

    /// Block that owns the payload starting at `payload`.
    #[inline]
    pub fn from_payload(payload: usize) -> Option<Self> {
        payload.checked_sub(WORD_SIZE).map(Self)
    }

    /// Arena offset of the header.
    #[inline]
    pub fn offset(self) -> usize {
        self.0
    }

    /// Arena offset of the first payload byte.
    #[inline]
    pub fn payload(self) -> usize {
        self.0 + WORD_SIZE
    }

    #[inline]
    pub fn header(self, arena: &Arena) -> Header {
        Header::from_word(arena.read_word(self.0))
    }

    /// Reads the footer of a free block. Only meaningful if the block is free
    /// and larger than [`MIN_BLOCK_SIZE`].
    #[inline]
    pub fn footer(self, arena: &Arena) -> Header {
        let size = self.header(arena).size();
        Header::from_word(arena.read_word(self.0 + size - WORD_SIZE))
    }

    /// Writes only the header word.
    #[inline]
    pub fn set_header(self, arena: &mut Arena, header: Header) {
        arena.write_word(self.0, header.word());
    }

    /// Writes `header`, plus the footer if `header` describes a free block
    /// that has room for one. Allocated blocks and minimum size free blocks
    /// never get footers.
    pub fn write(self, arena: &mut Arena, header: Header) {
        self.set_header(arena, header);

        if !header.is_allocated() && header.size() > MIN_BLOCK_SIZE {
            arena.write_word(self.0 + header.size() - WORD_SIZE, header.word());
        }
    }

    /// Rewrites the bits that describe the physically previous block. The
    /// footer is kept identical to the header for free blocks.
    #[inline]
    pub fn set_prev_status(self, arena: &mut Arena, prev_is_min: bool, prev_allocated: bool) {
        let header = self.header(arena).with_prev(prev_is_min, prev_allocated);
        self.write(arena, header);
    }

    /// Physically next block. For the last block this is the epilogue.
    #[inline]
    pub fn next(self, arena: &Arena) -> Self {
        Self(self.0 + self.header(arena).size())
    }

    /// Physically previous block. Only valid when the header says that the
    /// previous block is free, otherwise there might be no footer to read.
    ///
    /// ```text
    ///                  prev_is_min = true             prev_is_min = false
    ///
    ///                  +--------+--------+            +--------+- ... -+--------+
    ///                  | header |  next  |            | header |       | footer |
    ///                  +--------+--------+            +--------+- ... -+--------+
    /// self - 16 ---->  ^                  self ---->  ^        self - footer.size
    /// ```
    pub fn prev(self, arena: &Arena) -> Self {
        let header = self.header(arena);
        debug_assert!(!header.prev_allocated());

        if header.prev_is_min() {
            Self(self.0 - MIN_BLOCK_SIZE)
        } else {
            let footer = Header::from_word(arena.read_word(self.0 - WORD_SIZE));
            Self(self.0 - footer.size())
        }
    }

    /// Bytes the caller can use when this block is allocated.
    #[inline]
    pub fn payload_size(self, arena: &Arena) -> usize {
        self.header(arena).size() - WORD_SIZE
    }

    #[inline]
    fn link(arena: &Arena, offset: usize) -> Option<Self> {
        match arena.read_word(offset) as usize {
            PROLOGUE => None,
            block => Some(Self(block)),
        }
    }

    #[inline]
    fn set_link(arena: &mut Arena, offset: usize, block: Option<Self>) {
        arena.write_word(offset, block.map_or(PROLOGUE, Self::offset) as u64);
    }

    /// Next block in the same free list.
    #[inline]
    pub fn next_free(self, arena: &Arena) -> Option<Self> {
        Self::link(arena, self.0 + WORD_SIZE)
    }

    #[inline]
    pub fn set_next_free(self, arena: &mut Arena, next: Option<Self>) {
        Self::set_link(arena, self.0 + WORD_SIZE, next);
    }

    /// Previous block in the same free list. Minimum size blocks don't have
    /// this link.
    #[inline]
    pub fn prev_free(self, arena: &Arena) -> Option<Self> {
        Self::link(arena, self.0 + 2 * WORD_SIZE)
    }

    #[inline]
    pub fn set_prev_free(self, arena: &mut Arena, prev: Option<Self>) {
        Self::set_link(arena, self.0 + 2 * WORD_SIZE, prev);
    }
}
