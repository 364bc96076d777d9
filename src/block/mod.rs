//! Shared raw-memory plumbing for the four pointer-backed heap block kinds
//! (Array16, Array32, BitSet, Node). Each block's payload is the raw address
//! handed back by the [`crate::alloc::Allocator`]; everything here is
//! `unsafe` pointer arithmetic over that address, grounded in the
//! tagged-pointer/`NonNull` allocation idiom (no managed-memory scanner can
//! see these blocks, so the refcount is the only thing keeping them alive).

pub mod array16;
pub mod array32;
pub mod bitset;
pub mod node;

use std::sync::atomic::{AtomicU32, Ordering};

/// Every array/bitset block starts with a plain `u32` refcount at offset 0.
/// (Node packs its refcount differently; see `node::refcount_word`.)
///
/// # Safety
/// `addr` must point at a live block of one of those three kinds.
#[inline]
pub(crate) unsafe fn refcount_at(addr: usize) -> &'static AtomicU32 {
    &*(addr as *const AtomicU32)
}

/// Increment the plain refcount at offset 0. Returns the refcount *before*
/// the increment.
///
/// # Safety
/// `addr` must point at a live array/bitset block.
#[inline]
pub(crate) unsafe fn acquire_plain(addr: usize) -> u32 {
    refcount_at(addr).fetch_add(1, Ordering::AcqRel)
}

/// Decrement the plain refcount at offset 0. Returns the refcount *after*
/// the decrement; callers free the block when this reaches 0.
///
/// # Safety
/// `addr` must point at a live array/bitset block.
#[inline]
pub(crate) unsafe fn release_plain(addr: usize) -> u32 {
    refcount_at(addr).fetch_sub(1, Ordering::AcqRel) - 1
}

//-------------------------------------------------------------------------
