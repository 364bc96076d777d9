//! Array32 leaf: `[refcount: u32][count: u32][items: u32 x count]`, strictly
//! ascending (spec invariant 1). Unlike Array16, any u32 value is
//! representable, so Array32 is never promoted to Node purely for id
//! magnitude -- only for count overflowing `MAX_ARRAY_ITEM_COUNT`.

use std::mem::size_of;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::alloc::Allocator;

const HEADER: usize = 8; // refcount(4) + count(4)

#[inline]
pub fn byte_size(count: usize) -> usize {
    HEADER + count * size_of::<u32>()
}

/// # Safety
/// `addr` must point at a live Array32 block.
#[inline]
unsafe fn count_ptr(addr: usize) -> *mut u32 {
    (addr + 4) as *mut u32
}

/// # Safety
/// `addr` must point at a live Array32 block.
#[inline]
unsafe fn items_ptr(addr: usize) -> *mut u32 {
    (addr + HEADER) as *mut u32
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn count(addr: usize) -> usize {
    *count_ptr(addr) as usize
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn items(addr: usize) -> &'static [u32] {
    std::slice::from_raw_parts(items_ptr(addr), count(addr))
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn last(addr: usize) -> u32 {
    let c = count(addr);
    debug_assert!(c > 0);
    *items_ptr(addr).add(c - 1)
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn find(addr: usize, id: u32) -> std::result::Result<usize, usize> {
    items(addr).binary_search(&id)
}

/// Allocate a fresh block holding exactly `sorted` (must already be strictly
/// ascending; debug-asserted, not checked in release).
pub fn build<A: Allocator>(alloc: &A, sorted: &[u32]) -> crate::error::Result<usize> {
    debug_assert!(sorted.windows(2).all(|w| w[0] < w[1]));
    let addr = alloc.allocate(byte_size(sorted.len()))?;
    // SAFETY: `addr` is a freshly allocated block of exactly this size.
    unsafe {
        (addr as *mut AtomicU32).write(AtomicU32::new(1));
        *count_ptr(addr) = sorted.len() as u32;
        std::ptr::copy_nonoverlapping(sorted.as_ptr(), items_ptr(addr), sorted.len());
    }
    Ok(addr)
}

/// # Safety
/// `addr` must point at a live Array32 block and not be used again.
pub unsafe fn free<A: Allocator>(alloc: &A, addr: usize) {
    let bytes = byte_size(count(addr));
    alloc.free(addr, bytes);
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn acquire(addr: usize) -> u32 {
    crate::block::acquire_plain(addr)
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn release(addr: usize) -> u32 {
    crate::block::release_plain(addr)
}

/// # Safety
/// `addr` must point at a live Array32 block.
pub unsafe fn refcount(addr: usize) -> u32 {
    (*(addr as *const AtomicU32)).load(Ordering::Acquire)
}

//-------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SystemAllocator;

    #[test]
    fn build_and_read() {
        let a = SystemAllocator;
        let addr = build(&a, &[3, 9, 200, 5_000_000]).unwrap();
        unsafe {
            assert_eq!(count(addr), 4);
            assert_eq!(items(addr), &[3, 9, 200, 5_000_000]);
            assert_eq!(last(addr), 5_000_000);
            assert_eq!(find(addr, 200), Ok(2));
            free(&a, addr);
        }
    }
}

//-------------------------------------------------------------------------
