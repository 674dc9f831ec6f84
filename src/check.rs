//! Heap consistency checking. Nothing here runs during normal operation, it's
//! meant for tests and for hunting down callers that write past the end of
//! their payloads.

use crate::{
    align::{ALIGNMENT, WORD_SIZE},
    allocator::Heap,
    arena::Arena,
    block::{Block, FIRST_BLOCK, MIN_BLOCK_SIZE, PROLOGUE},
    error::Corruption,
    freelist::{FreeLists, MINIMUM},
    header::Header,
};

/// Snapshot of one block, as seen when walking the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block header from [`Heap::low`].
    pub offset: usize,
    /// Total block size, header included.
    pub size: usize,
    pub allocated: bool,
}

/// Iterator over the blocks of the arena in address order. See
/// [`Heap::blocks`].
pub struct Blocks<'a> {
    arena: &'a Arena,
    offset: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        if !self.arena.contains_word(self.offset) {
            return None;
        }

        let header = Header::from_word(self.arena.read_word(self.offset));
        let size = header.size();

        // Stops at the epilogue, and at anything that would send us outside
        // the arena if the heap is corrupted.
        if size == 0 || size > self.arena.len() - self.offset {
            return None;
        }

        let info = BlockInfo {
            offset: self.offset,
            size,
            allocated: header.is_allocated(),
        };
        self.offset += size;

        Some(info)
    }
}

impl<const N: usize> Heap<N> {
    /// Walks the arena from the first block to the epilogue.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            arena: &self.arena,
            offset: FIRST_BLOCK,
        }
    }

    /// Checks every heap invariant and returns `true` if all of them hold.
    /// Failures are logged at `error` level. With `verbosity > 0` the whole
    /// block layout is logged at `debug` level too.
    pub fn check_consistency(&self, verbosity: u32) -> bool {
        let result = self.verify();

        if let Err(corruption) = result {
            log::error!("heap check failed: {corruption}");
        }

        if verbosity > 0 {
            self.dump(result.is_ok());
        }

        result.is_ok()
    }

    /// Same as [`Self::check_consistency`] but returns the first violation
    /// found instead of logging it.
    pub fn verify(&self) -> Result<(), Corruption> {
        let blocks = self.verify_blocks()?;
        self.verify_lists(&blocks)
    }

    /// Walks the arena block by block. Returns the offsets of all blocks in
    /// address order together with their allocation status.
    fn verify_blocks(&self) -> Result<Vec<(usize, bool)>, Corruption> {
        let arena = &self.arena;

        if !Header::from_word(arena.read_word(PROLOGUE)).is_sentinel() {
            return Err(Corruption::Prologue);
        }

        let epilogue = arena.len() - WORD_SIZE;
        let mut blocks = Vec::new();
        let mut offset = FIRST_BLOCK;
        // Status of the previous block: (size is minimum, allocated). The
        // prologue counts as an allocated block.
        let mut prev = (false, true);

        loop {
            let header = Header::from_word(arena.read_word(offset));

            if (header.prev_is_min(), header.prev_allocated()) != prev {
                return Err(Corruption::PrevBits { offset });
            }

            if offset == epilogue {
                if !header.is_sentinel() {
                    return Err(Corruption::Epilogue { offset });
                }
                break;
            }

            let size = header.size();

            if (offset + WORD_SIZE) % ALIGNMENT != 0 {
                return Err(Corruption::Misaligned { offset });
            }

            if size < MIN_BLOCK_SIZE || size % ALIGNMENT != 0 {
                return Err(Corruption::BadSize { offset, size });
            }

            if size > epilogue - offset {
                return Err(Corruption::OutOfBounds { offset, size });
            }

            if !header.is_allocated() {
                if size > MIN_BLOCK_SIZE && Block::at(offset).footer(arena) != header {
                    return Err(Corruption::FooterMismatch { offset });
                }

                if let Some((first, false)) = blocks.last().copied() {
                    return Err(Corruption::AdjacentFree {
                        first,
                        second: offset,
                    });
                }
            }

            blocks.push((offset, header.is_allocated()));
            prev = (size == MIN_BLOCK_SIZE, header.is_allocated());
            offset += size;
        }

        Ok(blocks)
    }

    /// Follows every free list and cross checks it against the arena walk.
    fn verify_lists(&self, blocks: &[(usize, bool)]) -> Result<(), Corruption> {
        let arena = &self.arena;
        let walked = blocks.iter().filter(|(_, allocated)| !allocated).count();
        let mut listed = 0;

        for bucket in 0..FreeLists::<N>::COUNT {
            let mut current = self.lists.head(bucket);
            let mut previous = None;
            let mut length = 0;

            while let Some(block) = current {
                let offset = block.offset();

                let allocated = match blocks.binary_search_by_key(&offset, |(offset, _)| *offset) {
                    Ok(index) => blocks[index].1,
                    Err(_) => return Err(Corruption::ListLink { bucket, link: offset }),
                };

                if allocated {
                    return Err(Corruption::ListedAllocated { bucket, offset });
                }

                let expected = self.lists.bucket_for(block.header(arena).size());
                if expected != bucket {
                    return Err(Corruption::WrongBucket {
                        bucket,
                        expected,
                        offset,
                    });
                }

                if bucket != MINIMUM && block.prev_free(arena) != previous {
                    return Err(Corruption::BrokenBackLink { bucket, offset });
                }

                length += 1;
                if length > walked {
                    return Err(Corruption::ListCycle { bucket });
                }

                previous = Some(block);
                current = block.next_free(arena);
            }

            listed += length;
        }

        if listed != walked {
            return Err(Corruption::FreeCount { listed, walked });
        }

        Ok(())
    }

    /// Logs the block layout. List links are only followed when `lists_ok`,
    /// a corrupted link could point anywhere.
    fn dump(&self, lists_ok: bool) {
        log::debug!(
            "arena {:?}..{:?} ({} bytes)",
            self.low(),
            self.high(),
            self.arena_size()
        );

        for block in self.blocks() {
            log::debug!(
                "  {:>8} {:>8} {}",
                block.offset,
                block.size,
                if block.allocated { "allocated" } else { "free" }
            );
        }

        if !lists_ok {
            return;
        }

        for bucket in 0..FreeLists::<N>::COUNT {
            let length = self.lists.iter(&self.arena, bucket).count();
            if length > 0 {
                log::debug!("  list {bucket}: {length} blocks");
            }
        }
    }
}
