//! Whole-tree operations that need to know what a (tag, payload) pair means:
//! recursive acquire/release across a Node's children, copy-on-write
//! cloning, and immutability propagation (spec §3 invariant 11, §4.8).
//!
//! The block modules (`crate::block::*`) only know their own byte layout;
//! this module is where dispatch on [`Kind`] happens.

use tracing::trace;

use crate::alloc::Allocator;
use crate::block::{array16, array32, bitset, node};
use crate::error::Result;
use crate::tag::{is_immutable, Kind, IMMUTABLE_BIT};

/// Increment the refcount of a pointer-backed handle. No-op for
/// inline/Empty handles, matching the spec's "acquire/release are no-ops
/// for inline/empty variants".
///
/// # Safety
/// `payload` must be a live block address whenever `tag`'s kind is
/// pointer-backed.
pub unsafe fn acquire(tag: u8, payload: u64) {
    match Kind::from_tag(tag) {
        Kind::Array16 => {
            array16::acquire(payload as usize);
        }
        Kind::Array32 => {
            array32::acquire(payload as usize);
        }
        Kind::BitSet => {
            bitset::acquire(payload as usize);
        }
        Kind::Node => {
            node::acquire(payload as usize);
        }
        _ => {}
    }
}

/// Decrement the refcount of a pointer-backed handle, freeing (and, for a
/// Node, recursively releasing every child) when it reaches zero. No-op for
/// inline/Empty handles.
///
/// # Safety
/// `payload` must be a live block address whenever `tag`'s kind is
/// pointer-backed, and must not be used again if this call frees it.
pub unsafe fn release<A: Allocator>(alloc: &A, tag: u8, payload: u64) {
    let addr = payload as usize;
    match Kind::from_tag(tag) {
        Kind::Array16 => {
            if array16::release(addr) == 0 {
                array16::free(alloc, addr);
            }
        }
        Kind::Array32 => {
            if array32::release(addr) == 0 {
                array32::free(alloc, addr);
            }
        }
        Kind::BitSet => {
            if bitset::release(addr) == 0 {
                bitset::free(alloc, addr);
            }
        }
        Kind::Node => {
            if node::release(addr) == 0 {
                trace!(level = node::level(addr), "freeing node, releasing children");
                for slot in 0..node::NR_CHILDREN {
                    let child_tag = node::child_tag(addr, slot);
                    let child_payload = node::child_payload(addr, slot);
                    release(alloc, child_tag, child_payload);
                }
                node::free(alloc, addr);
            }
        }
        _ => {}
    }
}

/// Copy-on-write clone of a Node: duplicates the 152-byte block and
/// acquires every child (spec 4.4: "if the parent is immutable,
/// deep-shallow-copy it — duplicate the block AND acquire every child").
///
/// # Safety
/// `addr` must point at a live Node block.
pub unsafe fn clone_node_and_acquire_children<A: Allocator>(
    alloc: &A,
    addr: usize,
) -> Result<usize> {
    let new_addr = node::shallow_copy(alloc, addr)?;
    for slot in 0..node::NR_CHILDREN {
        let child_tag = node::child_tag(new_addr, slot);
        let child_payload = node::child_payload(new_addr, slot);
        acquire(child_tag, child_payload);
    }
    Ok(new_addr)
}

/// Sets the immutability bit on every descendant Node's child-tag entry,
/// recursively. The top handle's own tag bit is set by the caller; this
/// only needs to walk *inside* a Node, since leaves need no propagation
/// (spec invariant 11) -- a leaf's mutability is entirely determined by the
/// tag byte under which it is reached.
///
/// # Safety
/// `addr` must point at a live, exclusively-reachable-for-marking Node
/// block (concurrent readers may observe the tag byte mid-write; spec §5
/// permits this since the flag is consulted only on mutation).
pub unsafe fn mark_immutable_recursive(addr: usize) {
    for slot in 0..node::NR_CHILDREN {
        let tag = node::child_tag(addr, slot);
        if tag == 0 || is_immutable(tag) {
            continue; // Empty slot, or already marked (and therefore already walked).
        }
        if Kind::from_tag(tag) == Kind::Node {
            node::set_child_tag(addr, slot, tag | IMMUTABLE_BIT);
            mark_immutable_recursive(node::child_payload(addr, slot) as usize);
        }
    }
}

//-------------------------------------------------------------------------


//-------------------------------------------------------------------------
