/// Mask for the allocation status of the block itself.
const ALLOCATED: u64 = 0b001;

/// Mask for the allocation status of the physically previous block.
const PREV_ALLOCATED: u64 = 0b010;

/// Mask telling whether the physically previous block has the minimum block
/// size. Minimum size blocks have no footer, so this is how we find their
/// start when walking backwards.
const PREV_IS_MIN: u64 = 0b100;

/// Block sizes are multiples of 16, so the low 4 bits are free for flags.
const SIZE_MASK: u64 = !0b1111;

/// Header word stored in front of every block, and duplicated at the end of
/// free blocks larger than the minimum size (the footer or boundary tag).
///
/// ```text
///  63                                     4   3   2   1   0
/// +----------------------------------------+---+---+---+---+
/// |              block size                | 0 | M | P | A |
/// +----------------------------------------+---+---+---+---+
///
/// A = this block is allocated
/// P = previous block is allocated
/// M = previous block has the minimum size
/// ```
///
/// Storing `P` in this header means allocated blocks don't need a footer: the
/// only reason to look at the footer of the previous block is to merge with
/// it, and we only do that when `P` says it's free.
///
/// A size of `0` with `A` set is reserved for the prologue and epilogue
/// sentinels and never appears in the middle of the arena.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header(u64);

impl Header {
    /// Builds a header word. `size` must be a multiple of 16.
    #[inline]
    pub fn pack(size: usize, prev_is_min: bool, prev_allocated: bool, allocated: bool) -> Self {
        debug_assert_eq!(size as u64 & !SIZE_MASK, 0);

        let mut word = size as u64;
        if prev_is_min {
            word |= PREV_IS_MIN;
        }
        if prev_allocated {
            word |= PREV_ALLOCATED;
        }
        if allocated {
            word |= ALLOCATED;
        }

        Self(word)
    }

    /// Header of the prologue and epilogue sentinels.
    #[inline]
    pub fn sentinel(prev_is_min: bool, prev_allocated: bool) -> Self {
        Self::pack(0, prev_is_min, prev_allocated, true)
    }

    #[inline]
    pub fn from_word(word: u64) -> Self {
        Self(word)
    }

    #[inline]
    pub fn word(self) -> u64 {
        self.0
    }

    /// Total block size, header and footer included.
    #[inline]
    pub fn size(self) -> usize {
        (self.0 & SIZE_MASK) as usize
    }

    #[inline]
    pub fn is_allocated(self) -> bool {
        self.0 & ALLOCATED != 0
    }

    #[inline]
    pub fn prev_allocated(self) -> bool {
        self.0 & PREV_ALLOCATED != 0
    }

    #[inline]
    pub fn prev_is_min(self) -> bool {
        self.0 & PREV_IS_MIN != 0
    }

    #[inline]
    pub fn is_sentinel(self) -> bool {
        self.size() == 0 && self.is_allocated()
    }

    /// Same header with the bits describing the previous block replaced.
    #[inline]
    pub fn with_prev(self, prev_is_min: bool, prev_allocated: bool) -> Self {
        Self::pack(self.size(), prev_is_min, prev_allocated, self.is_allocated())
    }

    /// Same header with a different size and allocation status, keeping the
    /// bits that describe the previous block.
    #[inline]
    pub fn with_block(self, size: usize, allocated: bool) -> Self {
        Self::pack(size, self.prev_is_min(), self.prev_allocated(), allocated)
    }
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Header")
            .field("size", &self.size())
            .field("allocated", &self.is_allocated())
            .field("prev_allocated", &self.prev_allocated())
            .field("prev_is_min", &self.prev_is_min())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(16, false, false, false, 0x10 ; "minimum free")]
    #[test_case(16, false, false, true, 0x11 ; "minimum allocated")]
    #[test_case(48, false, true, false, 0x32 ; "prev allocated")]
    #[test_case(4096, true, true, true, 0x1007 ; "all flags")]
    #[test_case(0, false, true, true, 0x03 ; "sentinel")]
    fn pack_layout(size: usize, prev_is_min: bool, prev_allocated: bool, allocated: bool, word: u64) {
        let header = Header::pack(size, prev_is_min, prev_allocated, allocated);
        assert_eq!(header.word(), word);
        assert_eq!(header.size(), size);
        assert_eq!(header.prev_is_min(), prev_is_min);
        assert_eq!(header.prev_allocated(), prev_allocated);
        assert_eq!(header.is_allocated(), allocated);
    }

    #[test]
    fn derived_headers_keep_other_fields() {
        let header = Header::pack(96, true, false, false);

        let moved = header.with_prev(false, true);
        assert_eq!(moved.size(), 96);
        assert!(!moved.is_allocated());
        assert!(moved.prev_allocated());
        assert!(!moved.prev_is_min());

        let resized = header.with_block(32, true);
        assert_eq!(resized.size(), 32);
        assert!(resized.is_allocated());
        assert!(resized.prev_is_min());
        assert!(!resized.prev_allocated());
    }

    #[test]
    fn sentinels() {
        assert!(Header::sentinel(false, true).is_sentinel());
        assert!(!Header::pack(16, false, true, true).is_sentinel());
        assert!(!Header::pack(0, false, true, false).is_sentinel());
    }
}
