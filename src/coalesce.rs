use crate::{
    align::{round_up, ALIGNMENT, WORD_SIZE},
    allocator::Heap,
    block::{Block, MIN_BLOCK_SIZE},
    error::AllocError,
    header::Header,
};

impl<const N: usize> Heap<N> {
    /// Merges the free `block` with its physical neighbours if they are free
    /// too, inserts the result in its list and returns it. `block` must have
    /// a free header (and footer) and must not be in any list yet.
    ///
    /// ```text
    ///              prev_allocated    next allocated    Result
    ///
    /// Case 1       yes               yes               [ block ]
    /// Case 2       yes               no                [ block + next ]
    /// Case 3       no                yes               [ prev + block ]
    /// Case 4       no                no                [ prev + block + next ]
    /// ```
    ///
    /// The previous block status comes from our own header, so we only read
    /// its footer (or rely on its minimum size bit) when we actually merge
    /// with it. Blocks swallowed by the merge leave their lists before the
    /// merged header is written, because removing a block needs its original
    /// size.
    pub(crate) fn coalesce(&mut self, block: Block) -> Block {
        let arena = &mut self.arena;
        let header = block.header(arena);
        let next = block.next(arena);
        let next_header = next.header(arena);

        let mut merged = block;
        let mut size = header.size();

        if !next_header.is_allocated() {
            self.lists.remove(arena, next);
            size += next_header.size();
        }

        if !header.prev_allocated() {
            let prev = block.prev(arena);
            self.lists.remove(arena, prev);
            size += prev.header(arena).size();
            merged = prev;
        }

        let merged_header = merged.header(arena).with_block(size, false);
        merged.write(arena, merged_header);
        merged
            .next(arena)
            .set_prev_status(arena, size == MIN_BLOCK_SIZE, false);

        self.lists.insert(arena, merged);

        merged
    }

    /// Grows the arena by at least `bytes` and returns the resulting free
    /// block, already merged with the last block if that one was free. The
    /// old epilogue header becomes the header of the new block and a new
    /// epilogue is written at the end:
    ///
    /// ```text
    /// Before:  | ... | Last block | Epilogue |
    ///
    /// After:   | ... | Last block | New free block ........ | Epilogue |
    ///                             ^                         ^
    ///                             +-- Old epilogue          +-- New epilogue
    /// ```
    ///
    /// If the arena can't grow nothing is modified.
    pub(crate) fn extend(&mut self, bytes: usize) -> Result<Block, AllocError> {
        let size = round_up(bytes, ALIGNMENT).ok_or(AllocError::SizeOverflow)?;
        let previous_end = self.arena.grow(size)?;

        let block = Block::at(previous_end - WORD_SIZE);
        let epilogue = block.header(&self.arena);

        block.write(&mut self.arena, epilogue.with_block(size, false));
        block.next(&self.arena).set_header(
            &mut self.arena,
            Header::sentinel(size == MIN_BLOCK_SIZE, false),
        );

        log::debug!("arena grew by {size} bytes to {}", self.arena.len());

        Ok(self.coalesce(block))
    }
}
