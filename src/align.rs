/// Size of a header, footer or free list link in bytes. Fixed at 8 on every
/// target so the block layout doesn't depend on the pointer width.
pub(crate) const WORD_SIZE: usize = 8;

/// Every payload we hand out is aligned to this many bytes, and every block
/// size is a multiple of it.
pub(crate) const ALIGNMENT: usize = 2 * WORD_SIZE;

/// Rounds `size` up to the next multiple of `n`. `n` must be a power of two.
/// Returns `None` if the result doesn't fit in [`usize`].
///
/// # Examples
///
/// ```text
/// round_up(1, 16)  == Some(16)
/// round_up(16, 16) == Some(16)
/// round_up(17, 16) == Some(32)
/// ```
#[inline]
pub(crate) fn round_up(size: usize, n: usize) -> Option<usize> {
    debug_assert!(n.is_power_of_two());
    Some(size.checked_add(n - 1)? & !(n - 1))
}

/// Size of the block needed to serve a request of `size` payload bytes: the
/// payload plus one header word, rounded up to [`ALIGNMENT`].
#[inline]
pub(crate) fn adjusted_size(size: usize) -> Option<usize> {
    round_up(size.checked_add(WORD_SIZE)?, ALIGNMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up() {
        let mut alignments = Vec::new();

        for i in 0..10 {
            // (1..=16), (17..=32), (33..=48) and so on.
            let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));
            // Matching the sizes above, this would be: 16, 32, 48 and so on.
            let expected = ALIGNMENT * (i + 1);
            alignments.push((sizes, expected));
        }

        for (sizes, expected) in alignments {
            for size in sizes {
                assert_eq!(Some(expected), round_up(size, ALIGNMENT));
            }
        }

        assert_eq!(round_up(0, ALIGNMENT), Some(0));
        assert_eq!(round_up(usize::MAX, ALIGNMENT), None);
    }

    #[test]
    fn adjusted_size_includes_header() {
        assert_eq!(adjusted_size(1), Some(16));
        assert_eq!(adjusted_size(8), Some(16));
        assert_eq!(adjusted_size(9), Some(32));
        assert_eq!(adjusted_size(24), Some(32));
        assert_eq!(adjusted_size(40), Some(48));
        assert_eq!(adjusted_size(usize::MAX - 4), None);
    }
}
