use crate::{
    arena::Arena,
    block::{Block, MIN_BLOCK_SIZE},
};

/// Index of the list that holds blocks of exactly [`MIN_BLOCK_SIZE`].
pub(crate) const MINIMUM: usize = 0;

/// Segregated free lists. Every free block in the arena is a member of
/// exactly one list, picked by its size, and allocated blocks are never in
/// any list. The links are stored inside the free blocks themselves, see
/// [`Block`], so this struct only holds the list heads:
///
/// ```text
///              +------+     +------+     +------+
/// minimum ---> |  16  | --> |  16  | --> |  16  |               (singly linked)
///              +------+     +------+     +------+
///
///              +------+     +------+
/// classes[0]   |  32  | <-> |  48  |                            (doubly linked)
///              +------+     +------+
///
/// .............................................................................
///
///              +----------+     +-------------+
/// overflow --> |  200 KiB | <-> |    1 MiB    |
///              +----------+     +-------------+
/// ```
///
/// Lists are numbered in that order: `0` is the minimum size list, `1..=N`
/// are `classes` and `N + 1` is `overflow`. Blocks are always inserted at
/// the head, so there's no order among blocks in the same list.
///
/// Minimum size blocks only have room for one link. Removing one of them
/// from the middle of its list means walking the list from the head to find
/// its predecessor. Those blocks are all the same size, so the fit finder
/// always takes the head and the walk only happens when coalescing.
pub(crate) struct FreeLists<const N: usize> {
    /// Exclusive upper bound of each list in `classes`.
    limits: [usize; N],
    /// Blocks of exactly [`MIN_BLOCK_SIZE`] bytes.
    minimum: Option<Block>,
    /// Blocks in `[limits[i - 1], limits[i])`, the first class starting right
    /// above [`MIN_BLOCK_SIZE`].
    classes: [Option<Block>; N],
    /// Blocks of `limits[N - 1]` bytes or more.
    overflow: Option<Block>,
}

impl<const N: usize> FreeLists<N> {
    /// Total number of lists.
    pub const COUNT: usize = N + 2;

    /// Empty lists with the given class limits. See [`crate::Config`].
    pub fn new(limits: [usize; N]) -> Self {
        Self {
            limits,
            minimum: None,
            classes: [None; N],
            overflow: None,
        }
    }

    /// Returns the index of the list where blocks of `size` bytes belong.
    pub fn bucket_for(&self, size: usize) -> usize {
        if size <= MIN_BLOCK_SIZE {
            return MINIMUM;
        }

        for (i, limit) in self.limits.iter().enumerate() {
            if size < *limit {
                return i + 1;
            }
        }

        N + 1
    }

    /// First block of list `index`.
    #[inline]
    pub fn head(&self, index: usize) -> Option<Block> {
        match index {
            MINIMUM => self.minimum,
            i if i <= N => self.classes[i - 1],
            _ => self.overflow,
        }
    }

    #[inline]
    fn head_mut(&mut self, index: usize) -> &mut Option<Block> {
        match index {
            MINIMUM => &mut self.minimum,
            i if i <= N => &mut self.classes[i - 1],
            _ => &mut self.overflow,
        }
    }

    /// Pushes a free block at the head of its list. The header must already
    /// describe the block as free with its final size.
    pub fn insert(&mut self, arena: &mut Arena, block: Block) {
        let index = self.bucket_for(block.header(arena).size());
        let head = self.head_mut(index);

        block.set_next_free(arena, *head);

        if index != MINIMUM {
            block.set_prev_free(arena, None);
            if let Some(old_head) = *head {
                old_head.set_prev_free(arena, Some(block));
            }
        }

        *head = Some(block);
    }

    /// Unlinks a free block from its list. The header must still hold the size
    /// the block had when it was inserted. Links of `block` are garbage after
    /// this returns.
    pub fn remove(&mut self, arena: &mut Arena, block: Block) {
        let index = self.bucket_for(block.header(arena).size());
        let next = block.next_free(arena);

        if index == MINIMUM {
            return self.remove_minimum(arena, block, next);
        }

        let prev = block.prev_free(arena);

        match prev {
            Some(prev) => prev.set_next_free(arena, next),
            None => *self.head_mut(index) = next,
        }

        if let Some(next) = next {
            next.set_prev_free(arena, prev);
        }
    }

    /// No back link, so walk from the head until we find the predecessor.
    fn remove_minimum(&mut self, arena: &mut Arena, block: Block, next: Option<Block>) {
        if self.minimum == Some(block) {
            self.minimum = next;
            return;
        }

        let mut current = self.minimum;

        while let Some(node) = current {
            let after = node.next_free(arena);
            if after == Some(block) {
                node.set_next_free(arena, next);
                return;
            }
            current = after;
        }

        debug_assert!(false, "block {block:?} not found in minimum size list");
    }

    /// Iterates over the blocks of list `index` in list order.
    pub fn iter<'a>(&self, arena: &'a Arena, index: usize) -> Iter<'a> {
        Iter {
            arena,
            current: self.head(index),
        }
    }
}

/// See [`FreeLists::iter`].
pub(crate) struct Iter<'a> {
    arena: &'a Arena,
    current: Option<Block>,
}

impl Iterator for Iter<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let block = self.current?;
        self.current = block.next_free(self.arena);
        Some(block)
    }
}
