//! The public handle type and its dispatch logic (spec 4.3, 4.4, 4.5, 4.6,
//! 4.8, external interfaces). This is where the tag byte is decoded and
//! routed to the right representation's algorithm; the representations
//! themselves live in [`crate::block`], [`crate::inline`], and their
//! lifecycle in [`crate::lifecycle`].

use tracing::trace;

use crate::alloc::Allocator;
use crate::block::{array16, array32, bitset, node};
use crate::build;
use crate::error::Result;
use crate::inline;
use crate::lifecycle;
use crate::reader::{self, StreamReader};
use crate::tag::{self, make_tag, Kind};

const PER_BLOCK_OVERHEAD: usize = 32;

/// A persistent, reference-counted, adaptively-represented ordered set of
/// `u32` ids. Copyable (it is just a tag byte and an 8-byte payload); the
/// allocator that produced a pointer-backed instance must be passed to
/// every mutating or lifecycle-affecting call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IdSet {
    tag: u8,
    payload: u64,
}

impl IdSet {
    /// The empty set. No allocation, no lifecycle cost.
    pub const fn empty() -> IdSet {
        IdSet { tag: 0, payload: 0 }
    }

    /// Builds a fresh set holding exactly `sorted_ids`.
    ///
    /// `sorted_ids` must be strictly ascending; only checked in debug
    /// builds (spec 7: precondition violations are a debug assertion, not a
    /// runtime error, matching this library's performance-sensitive
    /// inner-loop role).
    pub fn create<A: Allocator>(alloc: &A, sorted_ids: &[u32]) -> Result<IdSet> {
        debug_assert!(
            sorted_ids.windows(2).all(|w| w[0] < w[1]),
            "ids must be strictly ascending"
        );
        let (tag, payload) = build::build_from_slice(alloc, sorted_ids)?;
        Ok(IdSet { tag, payload })
    }

    /// `true` if `id` is a member.
    pub fn contains(&self, id: u32) -> bool {
        match Kind::from_tag(self.tag) {
            Kind::Empty => false,
            Kind::Inline1 => inline::unpack1(self.payload) == id,
            Kind::Inline2 => inline::unpack2(self.payload).contains(&id),
            Kind::Inline3 => inline::unpack3(self.payload).contains(&id),
            Kind::Inline4 => inline::contains4(self.payload, id),
            Kind::Array16 => {
                if id > u16::MAX as u32 {
                    return false;
                }
                // SAFETY: a live Array16 handle's payload is a live block.
                unsafe { array16::find(self.payload as usize, id as u16).is_ok() }
            }
            Kind::Array32 => {
                // SAFETY: a live Array32 handle's payload is a live block.
                unsafe { array32::find(self.payload as usize, id).is_ok() }
            }
            Kind::BitSet => {
                id <= tag::BITSET_MAX_ID
                    // SAFETY: a live BitSet handle's payload is a live block.
                    && unsafe { bitset::is_set(self.payload as usize, id) }
            }
            Kind::Node => {
                let addr = self.payload as usize;
                // SAFETY: a live Node handle's payload is a live block.
                let level = unsafe { node::level(addr) };
                let w = tag::width(level);
                let slot = (id as u64 / w) as usize;
                if slot >= node::NR_CHILDREN {
                    return false;
                }
                let relative = id - (slot as u64 * w) as u32;
                // SAFETY: same block.
                let child = unsafe {
                    IdSet { tag: node::child_tag(addr, slot), payload: node::child_payload(addr, slot) }
                };
                child.contains(relative)
            }
        }
    }

    /// Number of distinct ids this set holds.
    pub fn count(&self) -> u32 {
        match Kind::from_tag(self.tag) {
            Kind::Empty => 0,
            Kind::Inline1 => 1,
            Kind::Inline2 => 2,
            Kind::Inline3 => 3,
            Kind::Inline4 => 4,
            // SAFETY: a live handle's payload is a live block of the matching kind.
            Kind::Array16 => unsafe { array16::count(self.payload as usize) as u32 },
            Kind::Array32 => unsafe { array32::count(self.payload as usize) as u32 },
            Kind::BitSet => unsafe { bitset::count(self.payload as usize) },
            Kind::Node => unsafe { node::total_count(self.payload as usize) },
        }
    }

    /// Inserts `id`, always returning a handle the caller owns. If `id` was
    /// already present, the returned handle is an acquired copy of `self`
    /// (an additional owned reference to the same structure); otherwise it
    /// is a freshly built handle with its own reference.
    pub fn add<A: Allocator>(&self, alloc: &A, id: u32) -> Result<IdSet> {
        let (h, changed) = self.try_add(alloc, id)?;
        if !changed {
            // SAFETY: `h` (== *self when unchanged) is a live handle.
            unsafe { lifecycle::acquire(h.tag, h.payload) };
        }
        Ok(h)
    }

    /// Inserts `id`. Returns `(handle, changed)`; `changed` is false (and
    /// no allocation occurred) if `id` was already present.
    pub fn try_add<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        match Kind::from_tag(self.tag) {
            Kind::Empty => Ok((IdSet { tag: make_tag(Kind::Inline1, false), payload: inline::pack1(id) }, true)),
            Kind::Inline1 => {
                let existing = inline::unpack1(self.payload);
                if existing == id {
                    return Ok((*self, false));
                }
                let mut ids = [existing, id];
                ids.sort_unstable();
                self.rebuild_small(alloc, &ids)
            }
            Kind::Inline2 => {
                let existing = inline::unpack2(self.payload);
                if existing.contains(&id) {
                    return Ok((*self, false));
                }
                let mut ids = [existing[0], existing[1], id];
                ids.sort_unstable();
                self.rebuild_small(alloc, &ids)
            }
            Kind::Inline3 => {
                let existing = inline::unpack3(self.payload);
                if existing.contains(&id) {
                    return Ok((*self, false));
                }
                let mut ids = [existing[0], existing[1], existing[2], id];
                ids.sort_unstable();
                self.rebuild_small(alloc, &ids)
            }
            Kind::Inline4 => {
                let existing = inline::unpack4(self.payload);
                if existing.contains(&id) {
                    return Ok((*self, false));
                }
                let mut ids: Vec<u32> = existing.to_vec();
                ids.push(id);
                ids.sort_unstable();
                self.rebuild_small(alloc, &ids)
            }
            Kind::Array16 => self.try_add_array16(alloc, id),
            Kind::Array32 => self.try_add_array32(alloc, id),
            Kind::BitSet => self.try_add_bitset(alloc, id),
            Kind::Node => self.try_add_node(alloc, id),
        }
    }

    /// Removes `id`, always returning a handle the caller owns (see [`add`](Self::add)).
    pub fn remove<A: Allocator>(&self, alloc: &A, id: u32) -> Result<IdSet> {
        let (h, changed) = self.try_remove(alloc, id)?;
        if !changed {
            // SAFETY: `h` (== *self when unchanged) is a live handle.
            unsafe { lifecycle::acquire(h.tag, h.payload) };
        }
        Ok(h)
    }

    /// Removes `id`. Returns `(handle, changed)`; `changed` is false (and
    /// no allocation occurred) if `id` was not present.
    pub fn try_remove<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        match Kind::from_tag(self.tag) {
            Kind::Empty => Ok((*self, false)),
            Kind::Inline1 => {
                if inline::unpack1(self.payload) == id {
                    Ok((IdSet::empty(), true))
                } else {
                    Ok((*self, false))
                }
            }
            Kind::Inline2 => {
                let ids = inline::unpack2(self.payload);
                match ids.iter().position(|&x| x == id) {
                    None => Ok((*self, false)),
                    Some(pos) => Ok((
                        IdSet { tag: make_tag(Kind::Inline1, false), payload: inline::pack1(ids[1 - pos]) },
                        true,
                    )),
                }
            }
            Kind::Inline3 => {
                let ids = inline::unpack3(self.payload);
                match ids.iter().position(|&x| x == id) {
                    None => Ok((*self, false)),
                    Some(pos) => {
                        let mut remaining = ids.to_vec();
                        remaining.remove(pos);
                        self.rebuild_small(alloc, &remaining)
                    }
                }
            }
            Kind::Inline4 => {
                let ids = inline::unpack4(self.payload);
                match ids.iter().position(|&x| x == id) {
                    None => Ok((*self, false)),
                    Some(pos) => {
                        let mut remaining = ids.to_vec();
                        remaining.remove(pos);
                        self.rebuild_small(alloc, &remaining)
                    }
                }
            }
            Kind::Array16 => self.try_remove_array16(alloc, id),
            Kind::Array32 => self.try_remove_array32(alloc, id),
            Kind::BitSet => self.try_remove_bitset(alloc, id),
            Kind::Node => self.try_remove_node(alloc, id),
        }
    }

    /// Sets the immutability bit. For a Node, also walks every descendant
    /// Node and marks it (spec invariant 11, spec 4.8); leaves need no
    /// propagation since they carry no interior structure to share.
    pub fn make_immutable(&self) -> IdSet {
        if tag::is_immutable(self.tag) {
            return *self;
        }
        if Kind::from_tag(self.tag) == Kind::Node {
            // SAFETY: a live Node handle's payload is a live block.
            unsafe { lifecycle::mark_immutable_recursive(self.payload as usize) };
        }
        IdSet { tag: self.tag | tag::IMMUTABLE_BIT, payload: self.payload }
    }

    /// Increments the refcount of a pointer-backed handle (no-op for
    /// inline/Empty) and returns the same handle value.
    pub fn acquire(&self) -> IdSet {
        // SAFETY: `self` is a live handle.
        unsafe { lifecycle::acquire(self.tag, self.payload) };
        *self
    }

    /// Decrements the refcount of a pointer-backed handle, freeing it (and
    /// recursively releasing children, for a Node) if it reaches zero.
    /// No-op for inline/Empty. `self` must not be used again afterward if
    /// this was the last reference.
    pub fn release<A: Allocator>(&self, alloc: &A) {
        // SAFETY: `self` is a live handle; caller is giving up their reference.
        unsafe { lifecycle::release(alloc, self.tag, self.payload) };
    }

    /// A pull-based ascending reader over every id this set contains.
    pub fn stream_reader(&self) -> Box<dyn StreamReader> {
        // SAFETY: `self` is a live handle for as long as the reader is used.
        unsafe { reader::for_handle(self.tag, self.payload) }
    }

    /// Approximate bytes occupied by this tree's heap blocks, including a
    /// fixed per-block overhead for allocator bookkeeping.
    pub fn estimate_memory_consumption(&self) -> usize {
        estimate_bytes(self.tag, self.payload)
    }

    //---------------------------------------------------------------------
    // Debug/test introspection -- not part of the stable surface.

    #[doc(hidden)]
    pub fn debug_kind(&self) -> &'static str {
        match Kind::from_tag(self.tag) {
            Kind::Empty => "Empty",
            Kind::Inline1 => "Inline1",
            Kind::Inline2 => "Inline2",
            Kind::Inline3 => "Inline3",
            Kind::Inline4 => "Inline4",
            Kind::Array16 => "Array16",
            Kind::Array32 => "Array32",
            Kind::BitSet => "BitSet",
            Kind::Node => "Node",
        }
    }

    #[doc(hidden)]
    pub fn debug_node_child(&self, slot: usize) -> Option<(u8, u64)> {
        if Kind::from_tag(self.tag) != Kind::Node {
            return None;
        }
        let addr = self.payload as usize;
        // SAFETY: a live Node handle's payload is a live block.
        unsafe { Some((node::child_tag(addr, slot), node::child_payload(addr, slot))) }
    }

    //---------------------------------------------------------------------
    // Private dispatch helpers.

    fn rebuild_small<A: Allocator>(&self, alloc: &A, sorted: &[u32]) -> Result<(IdSet, bool)> {
        let (tag, payload) = build::build_from_slice(alloc, sorted)?;
        Ok((IdSet { tag, payload }, true))
    }

    fn create_parent_and_add<A: Allocator>(
        &self,
        alloc: &A,
        bound_exclusive: u64,
        new_id: u32,
    ) -> Result<(IdSet, bool)> {
        let level = tag::parent_level_for(bound_exclusive, new_id);
        let node_addr = node::alloc_empty(alloc, level)?;
        let w = tag::width(level);
        let slot = (new_id as u64 / w) as usize;
        debug_assert!(slot > 0, "new id must never land in slot 0 (see tag::parent_level_for)");
        let relative = new_id - (slot as u64 * w) as u32;
        // SAFETY: `node_addr` was just allocated and is exclusively owned here.
        unsafe {
            node::set_child_tag(node_addr, 0, self.tag);
            node::set_child_payload(node_addr, 0, self.payload);
            node::set_child_tag(node_addr, slot, make_tag(Kind::Inline1, false));
            node::set_child_payload(node_addr, slot, inline::pack1(relative));
            node::set_total_count(node_addr, self.count() + 1);
        }
        trace!(level, slot, "created parent node via create-parent-and-add");
        Ok((IdSet { tag: make_tag(Kind::Node, false), payload: node_addr as u64 }, true))
    }

    fn try_add_array16<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        // SAFETY: a live Array16 handle's payload is a live block.
        let items = unsafe { array16::items(addr) };
        let idx = if id > u16::MAX as u32 {
            items.len()
        } else {
            match items.binary_search(&(id as u16)) {
                Ok(_) => return Ok((*self, false)),
                Err(idx) => idx,
            }
        };
        let count = items.len() as u32 + 1;
        let last = items.last().copied().unwrap_or(0) as u32;
        let local_max = last.max(id);
        match tag::choose(count, local_max) {
            Kind::BitSet => {
                let mut ids: Vec<u32> = items.iter().map(|&x| x as u32).collect();
                ids.insert(idx, id);
                let addr2 = bitset::build(alloc, ids)?;
                Ok((IdSet { tag: make_tag(Kind::BitSet, false), payload: addr2 as u64 }, true))
            }
            Kind::Array16 => {
                let mut ids: Vec<u16> = items.to_vec();
                ids.insert(idx, id as u16);
                let addr2 = array16::build(alloc, &ids)?;
                Ok((IdSet { tag: make_tag(Kind::Array16, false), payload: addr2 as u64 }, true))
            }
            Kind::Array32 => {
                let mut ids: Vec<u32> = items.iter().map(|&x| x as u32).collect();
                ids.insert(idx, id);
                let addr2 = array32::build(alloc, &ids)?;
                Ok((IdSet { tag: make_tag(Kind::Array32, false), payload: addr2 as u64 }, true))
            }
            Kind::Node => {
                let before: Vec<u32> = items[..idx].iter().map(|&x| x as u32).collect();
                let after: Vec<u32> = items[idx..].iter().map(|&x| x as u32).collect();
                let mut seq = reader::SequenceReader::new(before, Some(id), after);
                let (t, p) = build::build_from_reader(alloc, &mut seq)?;
                Ok((IdSet { tag: t, payload: p }, true))
            }
            other => unreachable!("chooser returned {other:?} for Array16 insertion, count {count}"),
        }
    }

    fn try_add_array32<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        // SAFETY: a live Array32 handle's payload is a live block.
        let items = unsafe { array32::items(addr) };
        let idx = match items.binary_search(&id) {
            Ok(_) => return Ok((*self, false)),
            Err(idx) => idx,
        };
        let count = items.len() as u32 + 1;
        let local_max = items.last().copied().unwrap_or(0).max(id);
        match tag::choose(count, local_max) {
            Kind::Array32 => {
                let mut ids = items.to_vec();
                ids.insert(idx, id);
                let addr2 = array32::build(alloc, &ids)?;
                Ok((IdSet { tag: make_tag(Kind::Array32, false), payload: addr2 as u64 }, true))
            }
            Kind::Node => {
                let before = items[..idx].to_vec();
                let after = items[idx..].to_vec();
                let mut seq = reader::SequenceReader::new(before, Some(id), after);
                let (t, p) = build::build_from_reader(alloc, &mut seq)?;
                Ok((IdSet { tag: t, payload: p }, true))
            }
            other => unreachable!("chooser returned {other:?} for Array32 insertion, count {count}"),
        }
    }

    fn try_add_bitset<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        if id > tag::BITSET_MAX_ID {
            return self.create_parent_and_add(alloc, tag::WINDOW, id);
        }
        // SAFETY: a live BitSet handle's payload is a live block.
        if unsafe { bitset::is_set(addr, id) } {
            return Ok((*self, false));
        }
        if tag::is_immutable(self.tag) {
            // SAFETY: same.
            let new_addr = unsafe { bitset::clone_block(alloc, addr)? };
            unsafe { bitset::insert_in_place(new_addr, id) };
            Ok((IdSet { tag: make_tag(Kind::BitSet, false), payload: new_addr as u64 }, true))
        } else {
            // SAFETY: mutable handle implies exclusive ownership of this block.
            unsafe {
                bitset::insert_in_place(addr, id);
                bitset::acquire(addr);
            }
            Ok((IdSet { tag: self.tag, payload: self.payload }, true))
        }
    }

    fn try_add_node<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        // SAFETY: a live Node handle's payload is a live block.
        let level = unsafe { node::level(addr) };
        let w = tag::width(level);
        let slot = (id as u64 / w) as usize;
        if slot >= node::NR_CHILDREN {
            let bound = tag::span(level);
            return self.create_parent_and_add(alloc, bound, id);
        }
        let relative = id - (slot as u64 * w) as u32;
        // SAFETY: same block. The parent's immutability bit is OR'd onto the
        // child's own tag: `mark_immutable_recursive` only walks and flags
        // descendant Nodes, never leaf tags, so a leaf child read straight
        // off the block would otherwise look mutable even under an immutable
        // parent and take the in-place mutation path on a block this tree
        // still shares (spec invariant 11).
        let child = unsafe {
            IdSet {
                tag: node::child_tag(addr, slot) | (self.tag & tag::IMMUTABLE_BIT),
                payload: node::child_payload(addr, slot),
            }
        };
        let (new_child, changed) = child.try_add(alloc, relative)?;
        if !changed {
            return Ok((*self, false));
        }

        let target_addr = if tag::is_immutable(self.tag) {
            // SAFETY: `addr` is a live Node block.
            unsafe { lifecycle::clone_node_and_acquire_children(alloc, addr)? }
        } else {
            // SAFETY: same.
            unsafe { node::acquire(addr) };
            addr
        };

        // SAFETY: `target_addr` is exclusively owned by this call (either
        // freshly cloned, or the original reused under the mutable rule).
        unsafe {
            let old_tag = node::child_tag(target_addr, slot);
            let old_payload = node::child_payload(target_addr, slot);
            lifecycle::release(alloc, old_tag, old_payload);
            node::set_child_tag(target_addr, slot, new_child.tag);
            node::set_child_payload(target_addr, slot, new_child.payload);
            let total = node::total_count(target_addr) + 1;
            node::set_total_count(target_addr, total);
        }

        Ok((IdSet { tag: make_tag(Kind::Node, false), payload: target_addr as u64 }, true))
    }

    fn try_remove_array16<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        if id > u16::MAX as u32 {
            return Ok((*self, false));
        }
        // SAFETY: a live Array16 handle's payload is a live block.
        let items = unsafe { array16::items(addr) };
        let idx = match items.binary_search(&(id as u16)) {
            Ok(idx) => idx,
            Err(_) => return Ok((*self, false)),
        };
        let mut remaining: Vec<u16> = items.to_vec();
        remaining.remove(idx);
        if remaining.len() <= 5 {
            let widened: Vec<u32> = remaining.iter().map(|&x| x as u32).collect();
            return self.rebuild_small(alloc, &widened);
        }
        let addr2 = array16::build(alloc, &remaining)?;
        Ok((IdSet { tag: make_tag(Kind::Array16, false), payload: addr2 as u64 }, true))
    }

    fn try_remove_array32<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        // SAFETY: a live Array32 handle's payload is a live block.
        let items = unsafe { array32::items(addr) };
        let idx = match items.binary_search(&id) {
            Ok(idx) => idx,
            Err(_) => return Ok((*self, false)),
        };
        let mut remaining = items.to_vec();
        remaining.remove(idx);
        if remaining.len() <= 5 {
            return self.rebuild_small(alloc, &remaining);
        }
        let addr2 = array32::build(alloc, &remaining)?;
        Ok((IdSet { tag: make_tag(Kind::Array32, false), payload: addr2 as u64 }, true))
    }

    fn try_remove_bitset<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        // SAFETY: a live BitSet handle's payload is a live block.
        if id > tag::BITSET_MAX_ID || !unsafe { bitset::is_set(addr, id) } {
            return Ok((*self, false));
        }
        let new_count = unsafe { bitset::count(addr) } - 1;
        if new_count <= 5 {
            let mut remaining = Vec::with_capacity(new_count as usize + 1);
            let mut bits = unsafe { reader::BitSetReader::new(addr) };
            let mut buf = [0u32; 16];
            loop {
                let n = bits.read(&mut buf);
                if n == 0 {
                    break;
                }
                remaining.extend_from_slice(&buf[..n]);
            }
            remaining.retain(|&x| x != id);
            return self.rebuild_small(alloc, &remaining);
        }
        if tag::is_immutable(self.tag) {
            let new_addr = unsafe { bitset::clone_block(alloc, addr)? };
            unsafe { bitset::remove_in_place(new_addr, id) };
            Ok((IdSet { tag: make_tag(Kind::BitSet, false), payload: new_addr as u64 }, true))
        } else {
            unsafe {
                bitset::remove_in_place(addr, id);
                bitset::acquire(addr);
            }
            Ok((IdSet { tag: self.tag, payload: self.payload }, true))
        }
    }

    fn try_remove_node<A: Allocator>(&self, alloc: &A, id: u32) -> Result<(IdSet, bool)> {
        let addr = self.payload as usize;
        // SAFETY: a live Node handle's payload is a live block.
        let level = unsafe { node::level(addr) };
        let w = tag::width(level);
        let slot = (id as u64 / w) as usize;
        if slot >= node::NR_CHILDREN {
            return Ok((*self, false));
        }
        let relative = id - (slot as u64 * w) as u32;
        // SAFETY: same block; see the matching comment in `try_add_node` for
        // why the parent's immutability bit must be OR'd onto the child tag.
        let child = unsafe {
            IdSet {
                tag: node::child_tag(addr, slot) | (self.tag & tag::IMMUTABLE_BIT),
                payload: node::child_payload(addr, slot),
            }
        };
        let (new_child, changed) = child.try_remove(alloc, relative)?;
        if !changed {
            return Ok((*self, false));
        }

        let target_addr = if tag::is_immutable(self.tag) {
            unsafe { lifecycle::clone_node_and_acquire_children(alloc, addr)? }
        } else {
            unsafe { node::acquire(addr) };
            addr
        };

        unsafe {
            let old_tag = node::child_tag(target_addr, slot);
            let old_payload = node::child_payload(target_addr, slot);
            lifecycle::release(alloc, old_tag, old_payload);
            node::set_child_tag(target_addr, slot, new_child.tag);
            node::set_child_payload(target_addr, slot, new_child.payload);
        }
        let total = unsafe { node::total_count(target_addr) } - 1;
        unsafe { node::set_total_count(target_addr, total) };

        if total as usize <= tag::MAX_ARRAY_ITEM_COUNT {
            let collapsed = IdSet { tag: make_tag(Kind::Node, false), payload: target_addr as u64 };
            let mut drain = unsafe { reader::NodeReader::new(target_addr) };
            let (leaf_tag, leaf_payload) = build::build_from_reader(alloc, &mut drain)?;
            trace!(total, "collapsing node back to a leaf");
            collapsed.release(alloc);
            return Ok((IdSet { tag: leaf_tag, payload: leaf_payload }, true));
        }

        Ok((IdSet { tag: make_tag(Kind::Node, false), payload: target_addr as u64 }, true))
    }
}

fn estimate_bytes(tag: u8, payload: u64) -> usize {
    match Kind::from_tag(tag) {
        Kind::Empty | Kind::Inline1 | Kind::Inline2 | Kind::Inline3 | Kind::Inline4 => 0,
        Kind::Array16 => {
            let addr = payload as usize;
            // SAFETY: a live Array16 handle's payload is a live block.
            let n = unsafe { array16::count(addr) };
            array16::byte_size(n) + PER_BLOCK_OVERHEAD
        }
        Kind::Array32 => {
            let addr = payload as usize;
            // SAFETY: a live Array32 handle's payload is a live block.
            let n = unsafe { array32::count(addr) };
            array32::byte_size(n) + PER_BLOCK_OVERHEAD
        }
        Kind::BitSet => bitset::BYTE_SIZE + PER_BLOCK_OVERHEAD,
        Kind::Node => {
            let addr = payload as usize;
            let mut total = node::BYTE_SIZE + PER_BLOCK_OVERHEAD;
            for slot in 0..node::NR_CHILDREN {
                // SAFETY: a live Node handle's payload is a live block.
                let (ct, cp) = unsafe { (node::child_tag(addr, slot), node::child_payload(addr, slot)) };
                total += estimate_bytes(ct, cp);
            }
            total
        }
    }
}

//-------------------------------------------------------------------------


//-------------------------------------------------------------------------
