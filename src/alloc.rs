use std::alloc::{alloc, dealloc, Layout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::error::{AllocError, Result};

//-------------------------------------------------------------------------

/// The memory-allocator collaborator.  Every mutating operation on an
/// [`crate::IdSet`] takes one of these explicitly; none is stored inside a
/// tree, so a tree built against one allocator instance may be released
/// against any behaviourally-equivalent instance.
///
/// `free` is given the same byte count that was passed to the matching
/// `allocate` call.  The source contract only specifies `free(addr)`, but
/// Rust's global allocator needs a `Layout` (size *and* alignment) to
/// deallocate safely, so the size travels alongside the address.  An
/// allocator backed by a real malloc is free to ignore it.
pub trait Allocator {
    /// Allocate exactly `bytes` bytes, aligned enough for 64-bit words.
    /// Returns the raw address of the block.
    fn allocate(&self, bytes: usize) -> Result<usize>;

    /// Free a block previously returned by `allocate(bytes)`.
    fn free(&self, addr: usize, bytes: usize);
}

fn layout_for(bytes: usize) -> Layout {
    // Every heap block begins with a refcount (or level+refcount) word, so
    // 8-byte alignment covers every variant's header and payload.
    Layout::from_size_align(bytes, 8).expect("block size overflows isize")
}

/// Production allocator backed by the process global allocator.
#[derive(Clone, Copy, Default, Debug)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, bytes: usize) -> Result<usize> {
        let layout = layout_for(bytes);
        // SAFETY: layout has non-zero size (all callers request real blocks)
        // and the returned pointer is only ever freed through `free` below
        // with the same layout.
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            warn!(bytes, "system allocator exhausted");
            return Err(AllocError::OutOfSpace(bytes));
        }
        Ok(ptr as usize)
    }

    fn free(&self, addr: usize, bytes: usize) {
        let layout = layout_for(bytes);
        // SAFETY: `addr` was returned by `allocate(bytes)` above and has not
        // been freed yet; caller (the refcount-release path) guarantees this.
        unsafe { dealloc(addr as *mut u8, layout) };
    }
}

//-------------------------------------------------------------------------

/// Test double that forwards to [`SystemAllocator`] while tracking the
/// number and total size of outstanding blocks, so property tests can
/// assert that a balanced `create`/`add`/`remove`/`release` sequence leaves
/// the allocator's book-keeping back at its starting point (spec property 8).
#[derive(Debug, Default)]
pub struct CountingAllocator {
    inner: SystemAllocator,
    live: Mutex<HashMap<usize, usize>>,
    outstanding_bytes: AtomicUsize,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks currently allocated through this instance.
    pub fn outstanding_blocks(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Total bytes currently allocated through this instance.
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding_bytes.load(Ordering::SeqCst)
    }
}

impl Allocator for CountingAllocator {
    fn allocate(&self, bytes: usize) -> Result<usize> {
        let addr = self.inner.allocate(bytes)?;
        self.live.lock().unwrap().insert(addr, bytes);
        self.outstanding_bytes.fetch_add(bytes, Ordering::SeqCst);
        Ok(addr)
    }

    fn free(&self, addr: usize, bytes: usize) {
        let recorded = self.live.lock().unwrap().remove(&addr);
        match recorded {
            Some(recorded_bytes) => {
                debug_assert_eq!(recorded_bytes, bytes, "free() size mismatch");
                self.outstanding_bytes.fetch_sub(bytes, Ordering::SeqCst);
            }
            None => {
                debug_assert!(false, "double free or free of unknown block at {addr:#x}");
            }
        }
        self.inner.free(addr, bytes);
    }
}

//-------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_roundtrip() {
        let a = SystemAllocator;
        let addr = a.allocate(64).unwrap();
        assert_ne!(addr, 0);
        a.free(addr, 64);
    }

    #[test]
    fn counting_allocator_tracks_balance() {
        let a = CountingAllocator::new();
        let x = a.allocate(32).unwrap();
        let y = a.allocate(96).unwrap();
        assert_eq!(a.outstanding_blocks(), 2);
        assert_eq!(a.outstanding_bytes(), 128);
        a.free(x, 32);
        assert_eq!(a.outstanding_blocks(), 1);
        a.free(y, 96);
        assert_eq!(a.outstanding_blocks(), 0);
        assert_eq!(a.outstanding_bytes(), 0);
    }
}

//-------------------------------------------------------------------------
