//! Representation kinds, tag-byte encoding, and the trie's level/width
//! arithmetic (spec invariant 6) plus the pure `choose` function (spec 4.1).

/// Low 7 bits of a handle's tag byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Kind {
    Empty = 0,
    Inline1 = 1,
    Inline2 = 2,
    Inline3 = 3,
    Inline4 = 4,
    Array16 = 6,
    Array32 = 7,
    BitSet = 8,
    Node = 9,
}

/// High bit of a handle's tag byte.
pub const IMMUTABLE_BIT: u8 = 0x80;
const KIND_MASK: u8 = 0x7F;

impl Kind {
    #[inline]
    pub fn from_tag(tag: u8) -> Kind {
        match tag & KIND_MASK {
            0 => Kind::Empty,
            1 => Kind::Inline1,
            2 => Kind::Inline2,
            3 => Kind::Inline3,
            4 => Kind::Inline4,
            6 => Kind::Array16,
            7 => Kind::Array32,
            8 => Kind::BitSet,
            9 => Kind::Node,
            other => unreachable!("corrupt tag byte, unknown kind {other}"),
        }
    }

    #[inline]
    pub fn is_pointer_backed(self) -> bool {
        matches!(self, Kind::Array16 | Kind::Array32 | Kind::BitSet | Kind::Node)
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

#[inline]
pub fn is_immutable(tag: u8) -> bool {
    tag & IMMUTABLE_BIT != 0
}

#[inline]
pub fn make_tag(kind: Kind, immutable: bool) -> u8 {
    kind.byte() | if immutable { IMMUTABLE_BIT } else { 0 }
}

//-------------------------------------------------------------------------
// Level / width arithmetic.

/// Window width of a level-0 node's slot, and of a BitSet leaf's fixed range.
pub const WINDOW: u64 = 4096;

/// Maximum number of descendants a Node may carry before it must collapse
/// back to a leaf (spec invariant 9), and the largest a leaf may grow to
/// before promotion to Node.
pub const MAX_ARRAY_ITEM_COUNT: usize = 1024;

/// Largest value representable in the BitSet's fixed window.
pub const BITSET_MAX_ID: u32 = 4095;

/// Highest node level: the smallest `L` with `16 * W(L) > 2^32`.
pub const MAX_LEVEL: u8 = 5;

/// `W(L) = 4096 * 16^L`: the width of one slot of a level-`L` node.
#[inline]
pub fn width(level: u8) -> u64 {
    WINDOW * 16u64.pow(level as u32)
}

/// `16 * W(L)`: the total span a level-`L` node addresses.
#[inline]
pub fn span(level: u8) -> u64 {
    16 * width(level)
}

/// Smallest level `L` in `0..=MAX_LEVEL` such that `span(L) > max_id`.
/// Used by the bulk builder (spec 4.7) to pick a node level that can
/// address every id in a build.
#[inline]
pub fn level_for(max_id: u64) -> u8 {
    for level in 0..=MAX_LEVEL {
        if span(level) > max_id {
            return level;
        }
    }
    MAX_LEVEL
}

/// Smallest level `L` in `0..=MAX_LEVEL` such that `width(L) >= bound_exclusive`
/// (the existing tree, whose every id is `< bound_exclusive`, fits entirely
/// under slot 0) **and** `span(L) > new_id` (the new id fits somewhere among
/// the node's 16 slots).
///
/// Used only by create-parent-and-add (spec 4.5). Because `bound_exclusive`
/// is always itself exactly a width value (either `WINDOW = width(0)`, or a
/// node's own span `= width(level + 1)`), and the id that triggered
/// promotion always satisfies `new_id >= bound_exclusive`, the slot computed
/// for `new_id` under the returned level is guaranteed to be nonzero: it
/// never collides with the untouched existing tree parked at slot 0.
#[inline]
pub fn parent_level_for(bound_exclusive: u64, new_id: u32) -> u8 {
    for level in 0..=MAX_LEVEL {
        let w = width(level);
        if w >= bound_exclusive && span(level) > new_id as u64 {
            return level;
        }
    }
    MAX_LEVEL
}

//-------------------------------------------------------------------------
// The chooser (spec 4.1). The only authority on representation.

#[inline]
pub fn choose(count: u32, max_id: u32) -> Kind {
    if max_id < WINDOW as u32 && count >= 256 {
        // Hard preference even right at the boundary (count == 256,
        // max_id == 255, where Array16 would be marginally smaller) —
        // avoids flapping between representations near the threshold.
        Kind::BitSet
    } else if count < 3 {
        match count {
            0 => Kind::Empty,
            1 => Kind::Inline1,
            _ => Kind::Inline2,
        }
    } else if count == 3 && max_id <= (1 << 21) - 1 {
        Kind::Inline3
    } else if count == 4 && max_id <= u16::MAX as u32 {
        Kind::Inline4
    } else if count as usize <= MAX_ARRAY_ITEM_COUNT {
        if max_id <= u16::MAX as u32 {
            Kind::Array16
        } else {
            Kind::Array32
        }
    } else {
        Kind::Node
    }
}

//-------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for kind in [
            Kind::Empty,
            Kind::Inline1,
            Kind::Inline2,
            Kind::Inline3,
            Kind::Inline4,
            Kind::Array16,
            Kind::Array32,
            Kind::BitSet,
            Kind::Node,
        ] {
            let tag = make_tag(kind, false);
            assert_eq!(Kind::from_tag(tag), kind);
            assert!(!is_immutable(tag));
            let itag = make_tag(kind, true);
            assert_eq!(Kind::from_tag(itag), kind);
            assert!(is_immutable(itag));
        }
    }

    #[test]
    fn width_and_span() {
        assert_eq!(width(0), 4096);
        assert_eq!(width(1), 65536);
        assert_eq!(span(0), 65536);
        assert_eq!(span(4), 1u64 << 32);
        assert_eq!(span(5), 16 * (1u64 << 32));
    }

    #[test]
    fn level_for_matches_scenario_s5() {
        // ids = [4096, 5000, 6000] => node at level 0.
        assert_eq!(level_for(6000), 0);
    }

    #[test]
    fn parent_level_for_bitset_overflow() {
        // Existing BitSet bound is always WINDOW (4096); new_id 5000 should
        // land at level 0, in slot 1 (never slot 0).
        let level = parent_level_for(WINDOW, 5000);
        assert_eq!(level, 0);
        let w = width(level);
        let slot = 5000 / w;
        assert_eq!(slot, 1);
        assert_eq!(5000 - slot * w, 904);
    }

    #[test]
    fn parent_level_for_large_overflow() {
        let level = parent_level_for(WINDOW, 200_000);
        let w = width(level);
        assert!(w >= WINDOW);
        assert!(span(level) > 200_000);
        let slot = 200_000 / w;
        assert!(slot >= 1 && slot < 16);
    }

    #[test]
    fn chooser_boundary_prefers_bitset() {
        // count == 256, max_id == 255: BitSet wins even though Array16
        // would be a few bytes smaller here (spec 4.1 rule 1, verbatim).
        assert_eq!(choose(256, 255), Kind::BitSet);
        // One short of the threshold: falls through to Array16 instead.
        assert_eq!(choose(255, 255), Kind::Array16);
    }

    #[test]
    fn chooser_inline_arities() {
        assert_eq!(choose(0, 0), Kind::Empty);
        assert_eq!(choose(1, 10), Kind::Inline1);
        assert_eq!(choose(2, 10), Kind::Inline2);
        assert_eq!(choose(3, 100), Kind::Inline3);
        assert_eq!(choose(3, 1 << 21), Kind::Array16);
        assert_eq!(choose(4, 1000), Kind::Inline4);
        assert_eq!(choose(4, 100_000), Kind::Array32);
    }

    #[test]
    fn chooser_array_vs_node() {
        assert_eq!(choose(1024, 1000), Kind::Array16);
        assert_eq!(choose(1025, 1000), Kind::Node);
        assert_eq!(choose(1024, 100_000), Kind::Array32);
    }
}

//-------------------------------------------------------------------------
