use std::ptr::NonNull;

use crate::allocator::Heap;

impl<const N: usize> Heap<N> {
    /// Resizes an allocation by moving it to a new block:
    ///
    /// - `address == None` is the same as [`Self::allocate`].
    /// - `size == 0` is the same as [`Self::deallocate`] and returns `None`.
    /// - Otherwise a new block is allocated, `min(size, old payload)` bytes
    ///   are copied over and the old block is freed.
    ///
    /// If the new block can't be allocated the old one is left untouched and
    /// `None` is returned, so the caller still owns `address`.
    ///
    /// # Safety
    ///
    /// Same as [`Self::deallocate`]. After a successful call `address` must
    /// not be used anymore.
    pub unsafe fn reallocate(
        &mut self,
        address: Option<NonNull<u8>>,
        size: usize,
    ) -> Option<NonNull<u8>> {
        let Some(address) = address else {
            return self.allocate(size);
        };

        if size == 0 {
            self.deallocate(Some(address));
            return None;
        }

        let Some(old) = self.live_block(address) else {
            log::warn!("reallocate({address:?}, {size}) ignored, not an allocated block");
            return None;
        };

        let new = match self.allocate_block(size) {
            Ok(block) => block,
            Err(err) => {
                log::warn!("reallocate({address:?}, {size}) failed: {err}");
                return None;
            }
        };

        let count = size.min(old.payload_size(&self.arena));
        self.arena.copy(old.payload(), new.payload(), count);
        self.free_block(old);

        let new_address = self.arena.address_of(new.payload());
        log::trace!("reallocate({address:?}, {size}) -> {new_address:?}, copied {count} bytes");

        Some(new_address)
    }

    /// Allocates room for `count` elements of `size` bytes each and zeroes
    /// it. Returns `None` if `count * size` overflows, if it is zero, or if
    /// the arena can't grow.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Option<NonNull<u8>> {
        let Some(total) = count.checked_mul(size) else {
            log::warn!("zero_allocate({count}, {size}) overflows");
            return None;
        };

        let address = self.allocate(total)?;

        // Recycled blocks still hold whatever the previous owner wrote.
        if let Some(payload) = self.arena.offset_of(address) {
            self.arena.fill(payload, total, 0);
        }

        Some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, error::AllocError};

    fn heap() -> Heap<3> {
        Heap::with_config(Config::with_size_classes([64, 128, 256]).arena_limit(1 << 20)).unwrap()
    }

    unsafe fn fill(address: NonNull<u8>, len: usize) {
        for i in 0..len {
            *address.as_ptr().add(i) = (i % 251) as u8;
        }
    }

    unsafe fn check(address: NonNull<u8>, len: usize) {
        for i in 0..len {
            assert_eq!(*address.as_ptr().add(i), (i % 251) as u8);
        }
    }

    #[test]
    fn grow_preserves_contents() {
        let mut heap = heap();
        unsafe {
            let address = heap.allocate(100).unwrap();
            fill(address, 100);

            let grown = heap.reallocate(Some(address), 3000).unwrap();
            check(grown, 100);
            assert!(heap.usable_size(Some(grown)) >= 3000);

            let grown = heap.reallocate(Some(grown), 9000).unwrap();
            check(grown, 100);
        }
        assert!(heap.check_consistency(0));
    }

    #[test]
    fn shrink_preserves_prefix() {
        let mut heap = heap();
        unsafe {
            let address = heap.allocate(500).unwrap();
            fill(address, 500);

            let shrunk = heap.reallocate(Some(address), 20).unwrap();
            check(shrunk, 20);
            assert!(heap.usable_size(Some(shrunk)) < 500);
        }
        assert!(heap.check_consistency(0));
    }

    #[test]
    fn null_and_zero_edge_cases() {
        let mut heap = heap();
        unsafe {
            let address = heap.reallocate(None, 32).unwrap();
            assert!(heap.usable_size(Some(address)) >= 32);

            let free_before = heap.blocks().filter(|block| !block.allocated).count();
            assert_eq!(heap.reallocate(Some(address), 0), None);
            assert_eq!(heap.usable_size(Some(address)), 0);

            // The freed block merged back into the trailing free block.
            let free_after = heap.blocks().filter(|block| !block.allocated).count();
            assert_eq!(free_before, free_after);
            assert_eq!(heap.reallocate(None, 0), None);
        }
        assert!(heap.check_consistency(0));
    }

    #[test]
    fn failed_reallocation_keeps_old_block() {
        let config = Config::with_size_classes([64, 128, 256]).arena_limit(1 << 16);
        let mut heap = Heap::with_config(config).unwrap();
        assert_eq!(heap.config().arena_limit, 1 << 16);

        unsafe {
            let address = heap.allocate(64).unwrap();
            fill(address, 64);

            assert_eq!(heap.reallocate(Some(address), 1 << 20), None);
            check(address, 64);
            assert_eq!(heap.usable_size(Some(address)), 64 + 8);

            heap.deallocate(Some(address));
        }
        assert!(heap.check_consistency(0));
        assert_eq!(
            heap.extend(1 << 20).err(),
            Some(AllocError::ArenaExhausted {
                requested: 1 << 20,
                limit: heap.arena.limit()
            })
        );
    }

    #[test]
    fn zero_allocate_clears_recycled_memory() {
        let mut heap = heap();
        unsafe {
            let dirty = heap.allocate(256).unwrap();
            dirty.as_ptr().write_bytes(0xFF, 256);
            heap.deallocate(Some(dirty));

            let clean = heap.zero_allocate(32, 8).unwrap();
            assert_eq!(clean, dirty);
            for i in 0..256 {
                assert_eq!(*clean.as_ptr().add(i), 0);
            }
        }
        assert!(heap.check_consistency(0));
    }

    #[test]
    fn zero_allocate_overflow() {
        let mut heap = heap();
        let size_before = heap.arena_size();

        #[cfg(target_pointer_width = "64")]
        assert_eq!(heap.zero_allocate(1 << 40, 1 << 40), None);
        assert_eq!(heap.zero_allocate(usize::MAX, 2), None);
        assert_eq!(heap.zero_allocate(0, 8), None);
        assert_eq!(heap.arena_size(), size_before);
    }
}
