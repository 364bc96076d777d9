//! A persistent, reference-counted, adaptively-represented ordered set of
//! `u32` ids.
//!
//! The public handle ([`IdSet`]) is a 9-byte value -- a tag byte and an
//! 8-byte payload -- that is either packed data (small sets) or a pointer
//! to a heap block shared, copy-on-write, across any number of handles.
//! Representation is chosen automatically from the set's size and maximum
//! member as it grows and shrinks: inline packing for a handful of ids, a
//! sorted array for small dense or sparse leaves, a fixed bitmap for a
//! dense 4096-value window, and a 16-way trie node once a leaf would
//! otherwise overflow.
//!
//! Memory is managed explicitly through the [`Allocator`] trait passed to
//! every mutating call; nothing is stored globally and no managed-memory
//! scanner needs to see these blocks.

mod alloc;
mod block;
mod build;
mod error;
mod handle;
mod inline;
mod lifecycle;
mod reader;
mod tag;

pub use alloc::{Allocator, CountingAllocator, SystemAllocator};
pub use error::{AllocError, Result};
pub use handle::IdSet;
pub use reader::StreamReader;
