//! Universal properties, checked both directly and via a randomized
//! differential fuzz test against `std::collections::BTreeSet`.

use std::collections::BTreeSet;

use idset::{CountingAllocator, IdSet, SystemAllocator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn property_1_empty_contains_nothing() {
    assert!(!IdSet::empty().contains(0));
    assert!(!IdSet::empty().contains(u32::MAX));
}

#[test]
fn property_2_add_is_observable_and_does_not_disturb_others() {
    let a = SystemAllocator;
    let t = IdSet::create(&a, &[10, 20, 30]).unwrap();
    let u = t.add(&a, 25).unwrap();
    assert!(u.contains(25));
    for y in [10, 20, 30] {
        assert_eq!(u.contains(y), t.contains(y));
    }
    u.release(&a);
    t.release(&a);
}

#[test]
fn property_3_remove_is_observable() {
    let a = SystemAllocator;
    let t = IdSet::create(&a, &[10, 20, 30]).unwrap();
    let u = t.remove(&a, 20).unwrap();
    assert!(!u.contains(20));
    assert!(u.contains(10));
    assert!(u.contains(30));
    u.release(&a);
    t.release(&a);
}

#[test]
fn property_4_count_matches_membership() {
    let a = SystemAllocator;
    let ids: Vec<u32> = (0..500u32).map(|x| x * 7).collect();
    let t = IdSet::create(&a, &ids).unwrap();
    let observed = (0..=ids[ids.len() - 1]).filter(|&x| t.contains(x)).count();
    assert_eq!(observed as u32, t.count());
    assert_eq!(t.count(), ids.len() as u32);
    t.release(&a);
}

#[test]
fn property_5_add_and_remove_are_idempotent() {
    let a = SystemAllocator;
    let t = IdSet::create(&a, &[1, 2, 3]).unwrap();
    let added = t.add(&a, 2).unwrap();
    let (_, changed) = added.try_add(&a, 2).unwrap();
    assert!(!changed);
    added.release(&a);

    let removed = t.remove(&a, 99).unwrap();
    let (_, changed) = removed.try_remove(&a, 99).unwrap();
    assert!(!changed);
    removed.release(&a);
    t.release(&a);
}

#[test]
fn property_6_add_then_remove_round_trips() {
    let a = SystemAllocator;
    let t = IdSet::create(&a, &[1, 2, 3]).unwrap();
    assert!(!t.contains(50));
    let added = t.add(&a, 50).unwrap();
    let back = added.remove(&a, 50).unwrap();
    assert_eq!(back.count(), t.count());
    for id in [1, 2, 3] {
        assert_eq!(back.contains(id), t.contains(id));
    }
    added.release(&a);
    back.release(&a);
    t.release(&a);
}

#[test]
fn property_7_immutable_handles_never_change_under_caller() {
    let a = SystemAllocator;
    let t = IdSet::create(&a, &(0..2000u32).map(|x| x * 3).collect::<Vec<_>>()).unwrap();
    let u = t.make_immutable();
    let added = u.add(&a, 1).unwrap();
    assert!(!u.contains(1));
    assert!(added.contains(1));
    let removed = u.remove(&a, 0).unwrap();
    assert!(u.contains(0));
    assert!(!removed.contains(0));
    added.release(&a);
    removed.release(&a);
    u.release(&a);
}

#[test]
fn property_8_refcount_discipline_over_a_balanced_sequence() {
    let a = CountingAllocator::new();
    let t = IdSet::create(&a, &(0..2000u32).map(|x| x * 3).collect::<Vec<_>>()).unwrap();
    let u = t.make_immutable();
    let v1 = u.add(&a, 1).unwrap();
    let v2 = u.add(&a, 2).unwrap();
    let acquired = u.acquire();
    v1.release(&a);
    v2.release(&a);
    acquired.release(&a);
    u.release(&a);
    assert_eq!(a.outstanding_blocks(), 0);
    assert_eq!(a.outstanding_bytes(), 0);
}

#[test]
fn property_9_stream_reader_is_ascending_and_exhaustive() {
    let a = SystemAllocator;
    let ids: Vec<u32> = vec![2, 4096, 9000, 70000];
    let t = IdSet::create(&a, &ids).unwrap();
    let mut out = Vec::new();
    let mut r = t.stream_reader();
    let mut buf = [0u32; 2];
    loop {
        let n = r.read(&mut buf);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, ids);
    assert!(out.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn property_10_representation_convergence() {
    let a = SystemAllocator;
    let cases: &[(&[u32], &str)] = &[
        (&[], "Empty"),
        (&[5], "Inline1"),
        (&[5, 9], "Inline2"),
        (&[5, 9, 20], "Inline3"),
        (&[5, 9, 20, 40], "Inline4"),
        (&[5, 9, 20, 40, 80], "Array16"),
    ];
    for (ids, expected) in cases {
        let t = IdSet::create(&a, ids).unwrap();
        assert_eq!(t.debug_kind(), *expected, "mismatched representation for {ids:?}");
        assert_eq!(t.count(), ids.len() as u32);
    }
}

/// Randomized differential test: a sequence of add/remove operations checked
/// after every step against a `BTreeSet<u32>` reference model.
#[test]
fn differential_fuzz_against_btreeset() {
    let a = CountingAllocator::new();
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut reference: BTreeSet<u32> = BTreeSet::new();
        let mut t = IdSet::empty();

        for _ in 0..400 {
            let id = rng.gen_range(0..20_000u32);
            if rng.gen_bool(0.6) {
                let (new_t, changed) = t.try_add(&a, id).unwrap();
                if changed {
                    t.release(&a);
                }
                t = new_t;
                assert_eq!(changed, reference.insert(id));
            } else {
                let (new_t, changed) = t.try_remove(&a, id).unwrap();
                if changed {
                    t.release(&a);
                }
                t = new_t;
                assert_eq!(changed, reference.remove(&id));
            }
            assert_eq!(t.count() as usize, reference.len());
            for probe in [id, id.wrapping_add(1), 0, 19_999] {
                assert_eq!(t.contains(probe), reference.contains(&probe));
            }
        }

        let mut from_reader = Vec::new();
        let mut r = t.stream_reader();
        let mut buf = [0u32; 64];
        loop {
            let n = r.read(&mut buf);
            if n == 0 {
                break;
            }
            from_reader.extend_from_slice(&buf[..n]);
        }
        let expected: Vec<u32> = reference.iter().copied().collect();
        assert_eq!(from_reader, expected);

        t.release(&a);
    }
    assert_eq!(a.outstanding_blocks(), 0);
}
