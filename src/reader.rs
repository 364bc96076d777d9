//! Pull-based ascending id readers (spec 4.2). Used both as a public
//! iteration surface and internally by the bulk builder, which drains one of
//! these into a scratch buffer when collapsing or rebuilding a tree.

use crate::block::{array16, array32, bitset, node};
use crate::inline;
use crate::tag::Kind;

/// A single-pass, non-restartable source of ascending ids. `read` writes as
/// many ids as fit into `target`, returning the count written; 0 means the
/// reader is exhausted.
pub trait StreamReader {
    fn read(&mut self, target: &mut [u32]) -> usize;
}

//-------------------------------------------------------------------------

/// Reads from an externally-owned ascending slice.
pub struct SliceReader<'a> {
    ids: &'a [u32],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(ids: &'a [u32]) -> Self {
        SliceReader { ids, pos: 0 }
    }
}

impl StreamReader for SliceReader<'_> {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let n = target.len().min(self.ids.len() - self.pos);
        target[..n].copy_from_slice(&self.ids[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

//-------------------------------------------------------------------------

/// Reads up to 4 ids packed inline (Empty through Inline4), with no heap
/// access at all.
struct InlineReader {
    ids: [u32; 4],
    len: usize,
    pos: usize,
}

impl InlineReader {
    fn new(ids: &[u32]) -> Self {
        debug_assert!(ids.len() <= 4);
        let mut buf = [0u32; 4];
        buf[..ids.len()].copy_from_slice(ids);
        InlineReader { ids: buf, len: ids.len(), pos: 0 }
    }

    fn empty() -> Self {
        InlineReader { ids: [0; 4], len: 0, pos: 0 }
    }
}

impl StreamReader for InlineReader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let n = target.len().min(self.len - self.pos);
        target[..n].copy_from_slice(&self.ids[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

//-------------------------------------------------------------------------

/// Reads an Array16 leaf's items, widening each to `u32`.
pub struct Array16Reader {
    items: &'static [u16],
    pos: usize,
}

impl Array16Reader {
    /// # Safety
    /// `addr` must point at a live Array16 block for the reader's lifetime.
    pub unsafe fn new(addr: usize) -> Self {
        Array16Reader { items: array16::items(addr), pos: 0 }
    }
}

impl StreamReader for Array16Reader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let n = target.len().min(self.items.len() - self.pos);
        for (dst, &src) in target[..n].iter_mut().zip(&self.items[self.pos..self.pos + n]) {
            *dst = src as u32;
        }
        self.pos += n;
        n
    }
}

/// Reads an Array32 leaf's items directly.
pub struct Array32Reader {
    items: &'static [u32],
    pos: usize,
}

impl Array32Reader {
    /// # Safety
    /// `addr` must point at a live Array32 block for the reader's lifetime.
    pub unsafe fn new(addr: usize) -> Self {
        Array32Reader { items: array32::items(addr), pos: 0 }
    }
}

impl StreamReader for Array32Reader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let n = target.len().min(self.items.len() - self.pos);
        target[..n].copy_from_slice(&self.items[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

//-------------------------------------------------------------------------

/// Scans a BitSet's 64 words ascending, one set bit at a time, via
/// trailing-zero lookup rather than testing every one of the 4096 positions.
pub struct BitSetReader {
    words: &'static [u64],
    word_idx: usize,
    cur_word: u64,
    base: u32,
}

impl BitSetReader {
    /// # Safety
    /// `addr` must point at a live BitSet block for the reader's lifetime.
    pub unsafe fn new(addr: usize) -> Self {
        let words = bitset::words(addr);
        let cur_word = words[0];
        BitSetReader { words, word_idx: 0, cur_word, base: 0 }
    }
}

impl StreamReader for BitSetReader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let mut n = 0;
        while n < target.len() {
            while self.cur_word == 0 {
                self.word_idx += 1;
                if self.word_idx >= self.words.len() {
                    return n;
                }
                self.cur_word = self.words[self.word_idx];
                self.base = (self.word_idx as u32) * 64;
            }
            let bit = self.cur_word.trailing_zeros();
            target[n] = self.base + bit;
            self.cur_word &= self.cur_word - 1;
            n += 1;
        }
        n
    }
}

//-------------------------------------------------------------------------

/// Adds a fixed offset to every id a wrapped reader emits; used by
/// [`NodeReader`] to turn a child's relative ids back into absolute ones.
struct OffsetReader {
    inner: Box<dyn StreamReader>,
    offset: u64,
}

impl StreamReader for OffsetReader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let n = self.inner.read(target);
        for v in &mut target[..n] {
            *v = (*v as u64 + self.offset) as u32;
        }
        n
    }
}

/// Builds the right reader for a (tag, payload) pair, recursing into
/// [`NodeReader`] for a Node child.
///
/// # Safety
/// `payload` must be a live block address whenever `tag`'s kind is
/// pointer-backed, for as long as the returned reader is used.
pub unsafe fn for_handle(tag: u8, payload: u64) -> Box<dyn StreamReader> {
    match Kind::from_tag(tag) {
        Kind::Empty => Box::new(InlineReader::empty()),
        Kind::Inline1 => Box::new(InlineReader::new(&[inline::unpack1(payload)])),
        Kind::Inline2 => Box::new(InlineReader::new(&inline::unpack2(payload))),
        Kind::Inline3 => Box::new(InlineReader::new(&inline::unpack3(payload))),
        Kind::Inline4 => Box::new(InlineReader::new(&inline::unpack4(payload))),
        Kind::Array16 => Box::new(Array16Reader::new(payload as usize)),
        Kind::Array32 => Box::new(Array32Reader::new(payload as usize)),
        Kind::BitSet => Box::new(BitSetReader::new(payload as usize)),
        Kind::Node => Box::new(NodeReader::new(payload as usize)),
    }
}

/// Recurses through a Node's 16 children in order, rebasing each child's
/// relative ids by its slot offset.
pub struct NodeReader {
    addr: usize,
    slot: usize,
    width: u64,
    current: Option<Box<dyn StreamReader>>,
}

impl NodeReader {
    /// # Safety
    /// `addr` must point at a live Node block for the reader's lifetime.
    pub unsafe fn new(addr: usize) -> Self {
        let width = crate::tag::width(node::level(addr));
        NodeReader { addr, slot: 0, width, current: None }
    }

    fn advance(&mut self) -> bool {
        while self.slot < node::NR_CHILDREN {
            let slot = self.slot;
            self.slot += 1;
            // SAFETY: `self.addr` is a live Node block for the reader's lifetime.
            let (child_tag, child_payload) =
                unsafe { (node::child_tag(self.addr, slot), node::child_payload(self.addr, slot)) };
            if Kind::from_tag(child_tag) == Kind::Empty {
                continue;
            }
            // SAFETY: same guarantee as above.
            let inner = unsafe { for_handle(child_tag, child_payload) };
            self.current = Some(Box::new(OffsetReader { inner, offset: slot as u64 * self.width }));
            return true;
        }
        false
    }
}

impl StreamReader for NodeReader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let mut n = 0;
        while n < target.len() {
            if self.current.is_none() && !self.advance() {
                break;
            }
            let got = self.current.as_mut().unwrap().read(&mut target[n..]);
            if got == 0 {
                self.current = None;
                continue;
            }
            n += got;
        }
        n
    }
}

//-------------------------------------------------------------------------

/// Concatenates an optional before-slice, an optional single id, and an
/// optional after-slice -- the splice shape an array leaf's insertion takes
/// when it must rebuild through the generic bulk builder (spec 4.4).
pub struct SequenceReader {
    before: Vec<u32>,
    id: Option<u32>,
    after: Vec<u32>,
    before_pos: usize,
    after_pos: usize,
}

impl SequenceReader {
    pub fn new(before: Vec<u32>, id: Option<u32>, after: Vec<u32>) -> Self {
        SequenceReader { before, id, after, before_pos: 0, after_pos: 0 }
    }
}

impl StreamReader for SequenceReader {
    fn read(&mut self, target: &mut [u32]) -> usize {
        let mut n = 0;
        while n < target.len() && self.before_pos < self.before.len() {
            target[n] = self.before[self.before_pos];
            self.before_pos += 1;
            n += 1;
        }
        if n < target.len() {
            if let Some(id) = self.id.take() {
                target[n] = id;
                n += 1;
            }
        }
        while n < target.len() && self.after_pos < self.after.len() {
            target[n] = self.after[self.after_pos];
            self.after_pos += 1;
            n += 1;
        }
        n
    }
}

//-------------------------------------------------------------------------


//-------------------------------------------------------------------------
