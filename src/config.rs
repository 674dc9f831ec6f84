use crate::{
    align::{ALIGNMENT, WORD_SIZE},
    block::MIN_BLOCK_SIZE,
    error::ConfigError,
};

/// Default number of configurable size classes.
pub const DEFAULT_SIZE_CLASSES: usize = 12;

/// Tuning knobs of a [`crate::Heap`]. None of these values affect
/// correctness, only fragmentation and throughput.
///
/// # Size classes
///
/// `size_classes` holds the exclusive upper bounds of the free lists, in
/// bytes of total block size. Blocks of exactly the minimum size (16 bytes)
/// always get a list of their own, so with the default limits the free lists
/// look like this:
///
/// ```text
/// list 0  -> 16
/// list 1  -> [32, 64)
/// list 2  -> [64, 128)
/// ...
/// list 12 -> [65536, 131072)
/// list 13 -> [131072, ∞)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config<const N: usize = DEFAULT_SIZE_CLASSES> {
    /// Strictly increasing, each one larger than 16 and a multiple of 16.
    pub size_classes: [usize; N],
    /// How many sufficient blocks to inspect in one list before settling for
    /// the smallest of them. `1` is first fit.
    pub fit_candidates: usize,
    /// Minimum number of bytes to grow the arena by when nothing fits.
    pub chunk_size: usize,
    /// Maximum size of the arena in bytes. Allocations fail once it's full.
    pub arena_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_size_classes([
            64,
            128,
            256,
            512,
            1 << 10,
            2 << 10,
            4 << 10,
            8 << 10,
            16 << 10,
            32 << 10,
            64 << 10,
            128 << 10,
        ])
    }
}

impl<const N: usize> Config<N> {
    /// Default policy with custom size class limits.
    pub const fn with_size_classes(size_classes: [usize; N]) -> Self {
        Self {
            size_classes,
            fit_candidates: 9,
            chunk_size: 1 << 12,
            arena_limit: 256 << 20,
        }
    }

    pub const fn fit_candidates(mut self, fit_candidates: usize) -> Self {
        self.fit_candidates = fit_candidates;
        self
    }

    pub const fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub const fn arena_limit(mut self, arena_limit: usize) -> Self {
        self.arena_limit = arena_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, limit) in self.size_classes.iter().copied().enumerate() {
            if limit <= MIN_BLOCK_SIZE || limit % ALIGNMENT != 0 {
                return Err(ConfigError::InvalidSizeClass { index, limit });
            }
            if index > 0 && limit <= self.size_classes[index - 1] {
                return Err(ConfigError::UnorderedSizeClasses { index });
            }
        }

        if self.fit_candidates == 0 {
            return Err(ConfigError::ZeroFitCandidates);
        }

        if self.chunk_size == 0 || self.chunk_size % ALIGNMENT != 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        // Prologue and epilogue words plus the first chunk.
        let required = self.chunk_size.checked_add(2 * WORD_SIZE);
        if required.map_or(true, |required| self.arena_limit < required) {
            return Err(ConfigError::ArenaTooSmall {
                limit: self.arena_limit,
                chunk_size: self.chunk_size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config: Config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.fit_candidates, 9);
        assert_eq!(config.chunk_size, 4096);
    }

    #[test]
    fn rejects_bad_size_classes() {
        assert_eq!(
            Config::with_size_classes([16, 64]).validate(),
            Err(ConfigError::InvalidSizeClass { index: 0, limit: 16 })
        );
        assert_eq!(
            Config::with_size_classes([64, 100]).validate(),
            Err(ConfigError::InvalidSizeClass { index: 1, limit: 100 })
        );
        assert_eq!(
            Config::with_size_classes([128, 64]).validate(),
            Err(ConfigError::UnorderedSizeClasses { index: 1 })
        );
        assert_eq!(Config::<0>::with_size_classes([]).validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_policy() {
        let config: Config = Config::default();

        assert_eq!(
            config.fit_candidates(0).validate(),
            Err(ConfigError::ZeroFitCandidates)
        );
        assert_eq!(
            config.chunk_size(100).validate(),
            Err(ConfigError::InvalidChunkSize(100))
        );
        assert_eq!(
            config.arena_limit(4096).validate(),
            Err(ConfigError::ArenaTooSmall {
                limit: 4096,
                chunk_size: 4096
            })
        );
    }
}
