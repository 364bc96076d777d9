//! Trie Node: `[level: u8, refcount: u24][totalCount: u32][childTags: u8 x
//! 16][childPayloads: u64 x 16]`, 152 bytes, always (spec §3). Children are
//! stored structure-of-arrays (all 16 tags, then all 16 payloads) rather
//! than as an array of (tag, payload) pairs, which keeps the payload table
//! 8-byte aligned and lets a caller scan all 16 tags with one cache line.
//!
//! This module knows nothing about representation kinds or dispatch; it is
//! pure byte-block plumbing. Recursive acquire/release/clone across
//! children lives in [`crate::lifecycle`], which is the layer that
//! understands what a child's tag means.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::alloc::Allocator;

pub const NR_CHILDREN: usize = 16;
const TAGS_OFFSET: usize = 8;
const PAYLOADS_OFFSET: usize = 8 + NR_CHILDREN;
pub const BYTE_SIZE: usize = PAYLOADS_OFFSET + NR_CHILDREN * 8;

const REFCOUNT_UNIT: u32 = 1 << 8;

/// # Safety
/// `addr` must point at a live Node block.
#[inline]
unsafe fn word0(addr: usize) -> &'static AtomicU32 {
    &*(addr as *const AtomicU32)
}

/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn level(addr: usize) -> u8 {
    (word0(addr).load(Ordering::Relaxed) & 0xFF) as u8
}

/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn refcount(addr: usize) -> u32 {
    word0(addr).load(Ordering::Acquire) >> 8
}

/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn acquire(addr: usize) -> u32 {
    word0(addr).fetch_add(REFCOUNT_UNIT, Ordering::AcqRel) >> 8
}

/// Returns the refcount *after* decrementing.
///
/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn release(addr: usize) -> u32 {
    (word0(addr).fetch_sub(REFCOUNT_UNIT, Ordering::AcqRel) - REFCOUNT_UNIT) >> 8
}

/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn total_count(addr: usize) -> u32 {
    *((addr + 4) as *const u32)
}

/// # Safety
/// `addr` must point at a live, exclusively-owned Node block.
pub unsafe fn set_total_count(addr: usize, count: u32) {
    *((addr + 4) as *mut u32) = count;
}

/// # Safety
/// `addr` must point at a live Node block; `slot` < 16.
pub unsafe fn child_tag(addr: usize, slot: usize) -> u8 {
    debug_assert!(slot < NR_CHILDREN);
    *((addr + TAGS_OFFSET + slot) as *const u8)
}

/// # Safety
/// `addr` must point at a live, exclusively-owned Node block; `slot` < 16.
pub unsafe fn set_child_tag(addr: usize, slot: usize, tag: u8) {
    debug_assert!(slot < NR_CHILDREN);
    *((addr + TAGS_OFFSET + slot) as *mut u8) = tag;
}

/// # Safety
/// `addr` must point at a live Node block; `slot` < 16.
pub unsafe fn child_payload(addr: usize, slot: usize) -> u64 {
    debug_assert!(slot < NR_CHILDREN);
    *((addr + PAYLOADS_OFFSET + slot * 8) as *const u64)
}

/// # Safety
/// `addr` must point at a live, exclusively-owned Node block; `slot` < 16.
pub unsafe fn set_child_payload(addr: usize, slot: usize, payload: u64) {
    debug_assert!(slot < NR_CHILDREN);
    *((addr + PAYLOADS_OFFSET + slot * 8) as *mut u64) = payload;
}

/// Allocate a fresh Node at `level`, refcount 1, totalCount 0, every slot
/// tagged Empty.
pub fn alloc_empty<A: Allocator>(alloc: &A, level: u8) -> crate::error::Result<usize> {
    let addr = alloc.allocate(BYTE_SIZE)?;
    // SAFETY: freshly allocated block of exactly BYTE_SIZE bytes.
    unsafe {
        word0(addr).store((1u32 << 8) | level as u32, Ordering::Release);
        set_total_count(addr, 0);
        for slot in 0..NR_CHILDREN {
            set_child_tag(addr, slot, 0); // Kind::Empty
            set_child_payload(addr, slot, 0);
        }
    }
    Ok(addr)
}

/// Byte-for-byte duplicate of a Node block (header, totalCount, all 16
/// child tags/payloads), with a fresh refcount of 1. Does **not** acquire
/// the children -- that is the caller's responsibility (see
/// `crate::lifecycle::clone_node_and_acquire_children`), since only that
/// layer knows how to acquire a child of arbitrary kind.
///
/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn shallow_copy<A: Allocator>(alloc: &A, addr: usize) -> crate::error::Result<usize> {
    let new_addr = alloc.allocate(BYTE_SIZE)?;
    std::ptr::copy_nonoverlapping(addr as *const u8, new_addr as *mut u8, BYTE_SIZE);
    word0(new_addr).store((1u32 << 8) | level(addr) as u32, Ordering::Release);
    Ok(new_addr)
}

/// # Safety
/// `addr` must point at a live Node block and not be used again. Does not
/// touch children; the caller must have already released them.
pub unsafe fn free<A: Allocator>(alloc: &A, addr: usize) {
    alloc.free(addr, BYTE_SIZE);
}

//-------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SystemAllocator;

    #[test]
    fn alloc_and_fields() {
        let a = SystemAllocator;
        let addr = alloc_empty(&a, 2).unwrap();
        unsafe {
            assert_eq!(level(addr), 2);
            assert_eq!(refcount(addr), 1);
            assert_eq!(total_count(addr), 0);
            for slot in 0..NR_CHILDREN {
                assert_eq!(child_tag(addr, slot), 0);
            }
            set_child_tag(addr, 3, 7);
            set_child_payload(addr, 3, 0xdead_beef);
            assert_eq!(child_tag(addr, 3), 7);
            assert_eq!(child_payload(addr, 3), 0xdead_beef);
            set_total_count(addr, 5);
            assert_eq!(total_count(addr), 5);
            free(&a, addr);
        }
    }

    #[test]
    fn refcount_roundtrip_preserves_level() {
        let a = SystemAllocator;
        let addr = alloc_empty(&a, 4).unwrap();
        unsafe {
            acquire(addr);
            assert_eq!(level(addr), 4);
            assert_eq!(refcount(addr), 2);
            assert_eq!(release(addr), 1);
            assert_eq!(level(addr), 4);
            free(&a, addr);
        }
    }

    #[test]
    fn shallow_copy_is_independent() {
        let a = SystemAllocator;
        let addr = alloc_empty(&a, 1).unwrap();
        unsafe {
            set_child_tag(addr, 0, 9);
            set_child_payload(addr, 0, 42);
            set_total_count(addr, 1);
            let copy = shallow_copy(&a, addr).unwrap();
            assert_eq!(refcount(copy), 1);
            assert_eq!(child_tag(copy, 0), 9);
            assert_eq!(child_payload(copy, 0), 42);
            assert_eq!(total_count(copy), 1);

            set_child_tag(copy, 0, 1);
            assert_eq!(child_tag(addr, 0), 9, "original must be unaffected");

            free(&a, addr);
            free(&a, copy);
        }
    }
}

//-------------------------------------------------------------------------
