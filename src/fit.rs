use crate::{
    allocator::Heap,
    block::{Block, MIN_BLOCK_SIZE},
    freelist::{FreeLists, MINIMUM},
    header::Header,
};

impl<const N: usize> Heap<N> {
    /// Looks for a free block of at least `asize` bytes using a find-N-fit
    /// policy. First fit wastes space and best fit has to look at every free
    /// block, so instead we stop at the first list that can serve the request
    /// and return the smallest of the first `fit_candidates` blocks in it
    /// that are big enough:
    ///
    /// ```text
    /// asize = 48, fit_candidates = 3
    ///
    /// lists[1] -> [32] -> [32]                       nothing fits, next list
    /// lists[2] -> [96] -> [80] -> [64] -> [72]
    ///              1st     2nd     3rd
    ///                              ^
    ///                              +-- Returned, [72] is never inspected.
    /// ```
    ///
    /// An exact match is returned right away. Minimum size blocks are all
    /// the same, so a minimum size request just takes the head of that list.
    pub(crate) fn find_fit(&self, asize: usize) -> Option<Block> {
        let first = self.lists.bucket_for(asize);

        if first == MINIMUM {
            if let Some(block) = self.lists.head(MINIMUM) {
                return Some(block);
            }
        }

        for index in first.max(MINIMUM + 1)..FreeLists::<N>::COUNT {
            let mut best: Option<(Block, usize)> = None;
            let mut candidates = 0;

            for block in self.lists.iter(&self.arena, index) {
                let size = block.header(&self.arena).size();

                if size == asize {
                    return Some(block);
                }

                if size > asize {
                    candidates += 1;

                    if best.map_or(true, |(_, best_size)| size < best_size) {
                        best = Some((block, size));
                    }

                    if candidates == self.config.fit_candidates {
                        break;
                    }
                }
            }

            if let Some((block, _)) = best {
                return Some(block);
            }
        }

        None
    }

    /// Allocates `asize` bytes of the free `block`, which must be at least
    /// that big. If what's left is enough for another block we split:
    ///
    /// **Before**:
    ///
    /// ```text
    /// +--------+---------------------------------------+--------+
    /// | header |               Free block              | footer |
    /// +--------+---------------------------------------+--------+
    /// ```
    ///
    /// **After**:
    ///
    /// ```text
    /// +--------+--------------+--------+---------------+--------+
    /// | header |    asize     | header |   remainder   | footer |
    /// +--------+--------------+--------+---------------+--------+
    ///    Allocated, removed       Free, inserted in its list
    /// ```
    ///
    /// Otherwise the whole block is handed out and the extra bytes are
    /// internal fragmentation. Either way the header of the block that
    /// follows has to learn about its new predecessor.
    pub(crate) fn place(&mut self, block: Block, asize: usize) {
        let arena = &mut self.arena;
        let header = block.header(arena);
        let csize = header.size();

        debug_assert!(!header.is_allocated() && csize >= asize);

        self.lists.remove(arena, block);

        let remainder = csize - asize;

        if remainder >= MIN_BLOCK_SIZE {
            block.write(arena, header.with_block(asize, true));

            let rest = block.next(arena);
            rest.write(arena, Header::pack(remainder, asize == MIN_BLOCK_SIZE, true, false));
            rest.next(arena)
                .set_prev_status(arena, remainder == MIN_BLOCK_SIZE, false);

            self.lists.insert(arena, rest);
        } else {
            block.write(arena, header.with_block(csize, true));
            block
                .next(arena)
                .set_prev_status(arena, csize == MIN_BLOCK_SIZE, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{align::WORD_SIZE, config::Config};

    fn heap(fit_candidates: usize) -> Heap<3> {
        let config = Config::with_size_classes([64, 128, 256])
            .fit_candidates(fit_candidates)
            .arena_limit(1 << 20);
        Heap::with_config(config).unwrap()
    }

    /// Allocates blocks of the given payload sizes separated by small
    /// guards, then frees every one of them except the guards. The guards
    /// keep the freed blocks from merging. Returns the freed blocks in
    /// allocation order.
    fn free_blocks_of(heap: &mut Heap<3>, payloads: &[usize]) -> Vec<Block> {
        let mut freed = Vec::new();
        for payload in payloads {
            let address = heap.allocate(*payload).unwrap();
            heap.allocate(1).unwrap();
            freed.push(address);
        }

        let mut blocks = Vec::new();
        for address in freed {
            let block = heap.live_block(address).unwrap();
            unsafe { heap.deallocate(Some(address)) };
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn minimum_request_takes_minimum_list_head() {
        let mut heap = heap(9);
        let blocks = free_blocks_of(&mut heap, &[8, 8]);

        // Inserted at the head, so the last freed block comes first.
        assert_eq!(heap.find_fit(MIN_BLOCK_SIZE), Some(blocks[1]));
    }

    #[test]
    fn exact_match_wins() {
        let mut heap = heap(9);
        // Block sizes 96, 80, 112 in list 2.
        let blocks = free_blocks_of(&mut heap, &[88, 72, 104]);

        assert_eq!(heap.find_fit(80), Some(blocks[1]));
    }

    #[test]
    fn smallest_of_candidates() {
        let mut heap = heap(9);
        // Block sizes 112, 80, 96. List order is 96, 80, 112.
        let blocks = free_blocks_of(&mut heap, &[104, 72, 88]);

        assert_eq!(heap.find_fit(72), Some(blocks[1]));
    }

    #[test]
    fn candidate_limit_bounds_the_search() {
        let mut heap = heap(2);
        // Block sizes 80, 112, 96. List order is 96, 112, 80.
        let blocks = free_blocks_of(&mut heap, &[72, 104, 88]);

        // Only 96 and 112 are inspected.
        assert_eq!(heap.find_fit(72), Some(blocks[2]));
    }

    #[test]
    fn moves_to_larger_lists() {
        let mut heap = heap(9);
        // A 32 byte block in list 1 and a 96 byte block in list 2.
        let blocks = free_blocks_of(&mut heap, &[24, 88]);

        assert_eq!(heap.find_fit(48), Some(blocks[1]));
        assert_eq!(heap.find_fit(32), Some(blocks[0]));
    }

    #[test]
    fn no_fit() {
        let heap = heap(9);
        assert_eq!(heap.find_fit(8192), None);
    }

    #[test]
    fn place_without_split_updates_successor() {
        let mut heap = heap(9);
        let blocks = free_blocks_of(&mut heap, &[24]);
        let block = blocks[0];

        // 32 byte block, a 16 byte remainder would be a valid block but a
        // request of 32 leaves nothing.
        heap.place(block, 32);

        let header = block.header(&heap.arena);
        assert!(header.is_allocated());
        assert_eq!(header.size(), 32);

        let next = block.next(&heap.arena).header(&heap.arena);
        assert!(next.prev_allocated());
        assert!(!next.prev_is_min());
        assert!(heap.check_consistency(0));
    }

    #[test]
    fn place_splits_into_minimum_remainder() {
        let mut heap = heap(9);
        let blocks = free_blocks_of(&mut heap, &[24]);
        let block = blocks[0];

        heap.place(block, MIN_BLOCK_SIZE);

        let rest = block.next(&heap.arena);
        let rest_header = rest.header(&heap.arena);
        assert_eq!(rest_header.size(), MIN_BLOCK_SIZE);
        assert!(!rest_header.is_allocated());
        assert!(rest_header.prev_is_min());
        assert!(rest_header.prev_allocated());

        let after = rest.next(&heap.arena).header(&heap.arena);
        assert!(after.prev_is_min());
        assert!(!after.prev_allocated());

        assert_eq!(heap.lists.head(MINIMUM), Some(rest));
        assert_eq!(rest.offset(), block.offset() + MIN_BLOCK_SIZE);
        assert_eq!(block.payload(), block.offset() + WORD_SIZE);
        assert!(heap.check_consistency(0));
    }
}
