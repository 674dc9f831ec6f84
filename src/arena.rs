use std::ptr::{self, NonNull};

use crate::{
    align::{round_up, WORD_SIZE},
    error::AllocError,
    platform,
};

/// The single contiguous region managed by the heap. We reserve `limit` bytes
/// of address space when the arena is created and then move a break forward
/// inside that reservation, the same way `sbrk` moves the program break:
///
/// ```text
/// base                         base + brk                  base + limit
///  |                               |                             |
///  v                               v                             v
///  +-------------------------------+-----------------------------+
///  |      Managed by the heap      |     Reserved, not in use    |
///  +-------------------------------+-----------------------------+
///  <----------- grow() ------------>
/// ```
///
/// Since the reservation never moves, addresses we hand out stay valid for
/// the whole lifetime of the arena. The arena never shrinks.
///
/// This is the only place where raw memory is read or written. Everything
/// else in the crate works with byte offsets from `base` and goes through the
/// bounds checked accessors below.
pub(crate) struct Arena {
    /// First byte of the reservation.
    base: NonNull<u8>,
    /// Number of bytes currently in use, starting at `base`.
    brk: usize,
    /// Size of the reservation in bytes.
    limit: usize,
}

impl Arena {
    /// Reserves an arena that can grow up to `limit` bytes (rounded up to the
    /// page size). The arena starts empty.
    pub fn reserve(limit: usize) -> Result<Self, AllocError> {
        let length = round_up(limit, platform::page_size()).ok_or(AllocError::SizeOverflow)?;

        let base = unsafe { platform::reserve(length) }
            .ok_or(AllocError::Reserve { length })?;

        log::debug!("reserved arena of {length} bytes at {base:?}");

        Ok(Self {
            base,
            brk: 0,
            limit: length,
        })
    }

    /// Extends the arena by exactly `delta` bytes and returns the previous end
    /// offset. Either the whole extension succeeds or nothing changes.
    pub fn grow(&mut self, delta: usize) -> Result<usize, AllocError> {
        let exhausted = AllocError::ArenaExhausted {
            requested: delta,
            limit: self.limit,
        };

        let new_brk = self
            .brk
            .checked_add(delta)
            .filter(|new_brk| *new_brk <= self.limit)
            .ok_or(exhausted)?;

        let previous = self.brk;
        self.brk = new_brk;

        Ok(previous)
    }

    /// Lowest address of the arena.
    #[inline]
    pub fn low(&self) -> NonNull<u8> {
        self.base
    }

    /// One past the last address currently managed.
    #[inline]
    pub fn high(&self) -> NonNull<u8> {
        self.address_of(self.brk)
    }

    /// Bytes currently managed.
    #[inline]
    pub fn len(&self) -> usize {
        self.brk
    }

    /// Maximum number of bytes the arena can grow to.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether a full word can be read at `offset`.
    #[inline]
    pub fn contains_word(&self, offset: usize) -> bool {
        offset % WORD_SIZE == 0
            && offset
                .checked_add(WORD_SIZE)
                .is_some_and(|end| end <= self.brk)
    }

    /// Reads the word at `offset`.
    ///
    /// # Panics
    ///
    /// If `offset` is not word aligned or the word is not inside the arena.
    #[inline]
    pub fn read_word(&self, offset: usize) -> u64 {
        assert!(self.contains_word(offset), "word read at {offset} outside arena");
        // SAFETY: bounds checked above, the base is page aligned so `offset`
        // being a multiple of the word size makes the read aligned.
        unsafe { self.base.as_ptr().add(offset).cast::<u64>().read() }
    }

    /// Writes `word` at `offset`.
    ///
    /// # Panics
    ///
    /// If `offset` is not word aligned or the word is not inside the arena.
    #[inline]
    pub fn write_word(&mut self, offset: usize, word: u64) {
        assert!(self.contains_word(offset), "word write at {offset} outside arena");
        // SAFETY: see `read_word`.
        unsafe { self.base.as_ptr().add(offset).cast::<u64>().write(word) }
    }

    /// Address of the byte at `offset`. `offset` may equal the current length
    /// (one past the end) but not exceed it.
    #[inline]
    pub fn address_of(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.brk, "offset {offset} outside arena");
        // SAFETY: `offset` is inside the reservation so the result is
        // derived from `base` and non-null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Inverse of [`Self::address_of`]. Returns `None` if `address` doesn't
    /// point inside the managed part of the arena.
    #[inline]
    pub fn offset_of(&self, address: NonNull<u8>) -> Option<usize> {
        (address.as_ptr() as usize)
            .checked_sub(self.base.as_ptr() as usize)
            .filter(|offset| *offset < self.brk)
    }

    /// Copies `len` bytes from `src` to `dst`. Ranges may overlap.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) {
        assert!(self.contains_range(src, len) && self.contains_range(dst, len));
        unsafe {
            let base = self.base.as_ptr();
            ptr::copy(base.add(src), base.add(dst), len);
        }
    }

    /// Sets `len` bytes starting at `offset` to `byte`.
    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) {
        assert!(self.contains_range(offset, len));
        unsafe { self.base.as_ptr().add(offset).write_bytes(byte, len) }
    }

    #[inline]
    fn contains_range(&self, offset: usize, len: usize) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.brk)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { platform::release(self.base, self.limit) }
    }
}
