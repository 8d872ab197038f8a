use super::*;
use crate::storage::medium::MemoryMedium;
use rand::seq::SliceRandom;

const BASE: u64 = 16;

fn fresh(bits: u64) -> (BlockStore<MemoryMedium>, Bitmap) {
    let mut store = BlockStore::new(MemoryMedium::new());
    let bitmap = Bitmap::load(&mut store, Resource::Blocks, BASE, bits).expect("load");
    (store, bitmap)
}

fn persisted(store: &mut BlockStore<MemoryMedium>, bits: u64) -> Vec<u8> {
    let len = usize::try_from(bits.div_ceil(8)).expect("len fits");
    store.read_at(BASE, len).expect("read bitmap")
}

#[test]
fn allocation_is_first_fit_and_msb_first() {
    let (mut store, mut bm) = fresh(20);
    for expected in 0..10 {
        assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), expected);
    }
    assert_eq!(persisted(&mut store, 20), vec![0xFF, 0b1100_0000, 0]);

    assert!(bm.release(&mut store, 3).expect("release"));
    assert!(bm.release(&mut store, 8).expect("release"));
    assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 3);
    assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 8);
    assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 10);
}

#[test]
fn allocated_bit_reads_as_set() {
    let (mut store, mut bm) = fresh(9);
    assert!(bm.is_free(&mut store, 0).expect("is_free"));
    let idx = bm.allocate_first_free(&mut store).expect("alloc");
    assert!(!bm.is_free(&mut store, idx).expect("is_free"));
    assert!(bm.is_free(&mut store, 8).expect("last bit"));
    assert!(bm.is_free(&mut store, 9).is_err(), "past the end");
}

#[test]
fn double_release_is_reported_and_changes_nothing() {
    let (mut store, mut bm) = fresh(16);
    for _ in 0..3 {
        bm.allocate_first_free(&mut store).expect("alloc");
    }
    assert!(bm.release(&mut store, 1).expect("first release"));
    let before = persisted(&mut store, 16);

    assert!(!bm.release(&mut store, 1).expect("second release"));
    assert!(!bm.release(&mut store, 12).expect("never allocated"));
    assert_eq!(persisted(&mut store, 16), before);
    assert_eq!(bm.count_allocated(&mut store).expect("count"), 2);
}

#[test]
fn padding_bits_are_never_handed_out() {
    let (mut store, mut bm) = fresh(11);
    for expected in 0..11 {
        assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), expected);
    }
    assert!(matches!(
        bm.allocate_first_free(&mut store),
        Err(FsError::CapacityExhausted(Resource::Blocks))
    ));
    assert_eq!(
        persisted(&mut store, 11),
        vec![0xFF, 0b1110_0000],
        "padding stays zero on disk"
    );
    assert_eq!(bm.count_allocated(&mut store).expect("count"), 11);
}

#[test]
fn allocate_then_release_in_any_order_restores_zero_bytes() {
    for bits in [1u64, 7, 8, 9, 37, 100, 257, 1000] {
        let (mut store, mut bm) = fresh(bits);
        let mut taken: Vec<u64> = (0..bits)
            .map(|_| bm.allocate_first_free(&mut store).expect("alloc"))
            .collect();
        assert_eq!(taken, (0..bits).collect::<Vec<_>>());
        assert!(bm.allocate_first_free(&mut store).is_err(), "{bits} bits full");

        taken.shuffle(&mut rand::rng());
        for idx in taken {
            assert!(bm.release(&mut store, idx).expect("release"));
        }
        assert!(
            persisted(&mut store, bits).iter().all(|&b| b == 0),
            "{bits} bits back to zero"
        );
        assert_eq!(bm.count_allocated(&mut store).expect("count"), 0);
        assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 0);
    }
}

#[test]
fn release_targets_exact_leaf_in_unbalanced_tree() {
    // 5 leaves: the tree is not a power of two, so depth-based bit walking
    // would pick the wrong leaf for the last byte.
    let (mut store, mut bm) = fresh(40);
    for _ in 0..40 {
        bm.allocate_first_free(&mut store).expect("alloc");
    }
    assert!(bm.release(&mut store, 36).expect("release"));
    assert_eq!(persisted(&mut store, 40), vec![0xFF, 0xFF, 0xFF, 0xFF, 0b1111_0111]);
    assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 36);
}

#[test]
fn load_rebuilds_tree_from_existing_bytes() {
    let mut store = BlockStore::new(MemoryMedium::new());
    store.write_at(BASE, &[0xFF, 0xFF, 0xEF, 0x00]).expect("seed");
    let mut bm = Bitmap::load(&mut store, Resource::Inodes, BASE, 32).expect("load");
    assert_eq!(bm.levels.last().map(Vec::len), Some(1));
    assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 19);
    assert_eq!(bm.allocate_first_free(&mut store).expect("alloc"), 24);
}

#[test]
fn tree_levels_and_with_promoted_trailing_node() {
    let mut store = BlockStore::new(MemoryMedium::new());
    store
        .write_at(BASE, &[0xFF, 0x0F, 0xF0, 0xFF, 0x81])
        .expect("seed");
    let bm = Bitmap::load(&mut store, Resource::Blocks, BASE, 40).expect("load");
    assert_eq!(bm.levels[1], vec![0x0F, 0xF0, 0x81]);
    assert_eq!(bm.levels[2], vec![0x00, 0x81]);
    assert_eq!(bm.levels[3], vec![0x00]);
}

#[test]
fn empty_bitmap_is_exhausted() {
    let (mut store, mut bm) = fresh(0);
    assert_eq!(bm.capacity(), 0);
    assert!(matches!(
        bm.allocate_first_free(&mut store),
        Err(FsError::CapacityExhausted(_))
    ));
    assert!(bm.release(&mut store, 0).is_err());
}
