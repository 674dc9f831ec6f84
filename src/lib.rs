//! Dynamic memory allocator built on top of one contiguous, growable arena.
//!
//! Free blocks are kept in segregated free lists indexed by size class,
//! allocation uses a bounded best fit search ("find N fit") and freed blocks
//! are merged with their free neighbours right away using boundary tags. The
//! arena only grows, at the end, when no free block can serve a request.
//!
//! Start at [`Heap`]. The lower level pieces are documented in reading order:
//! `header`, `block`, `freelist`, then `fit` and `coalesce`.

use std::ptr::NonNull;

mod align;
mod allocator;
mod arena;
mod block;
mod check;
mod coalesce;
mod config;
mod error;
mod fit;
mod freelist;
mod header;
mod platform;
mod realloc;

/// Non-null pointer to `T`. We use this in most cases instead of `*mut T`
/// because the compiler will yell at us if we don't write code for the `None`
/// case.
pub(crate) type Pointer<T> = Option<NonNull<T>>;

pub use allocator::Heap;
pub use check::{BlockInfo, Blocks};
pub use config::{Config, DEFAULT_SIZE_CLASSES};
pub use error::{AllocError, ConfigError, Corruption};
