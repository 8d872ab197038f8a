use super::*;
use crate::storage::medium::MemoryMedium;

fn store() -> BlockStore<MemoryMedium> {
    BlockStore::new(MemoryMedium::new())
}

#[test]
fn seek_extends_to_one_past_target() {
    let mut s = store();
    assert!(s.is_empty());
    s.seek(99).expect("seek");
    assert_eq!(s.len(), 100);
    assert_eq!(s.position(), 99);

    s.seek(10).expect("seek back");
    assert_eq!(s.len(), 100, "seeking inside never shrinks");
}

#[test]
fn read_past_end_returns_zeros_and_grows() {
    let mut s = store();
    let bytes = s.read_at(500, 24).expect("read");
    assert_eq!(bytes, vec![0u8; 24]);
    assert_eq!(s.len(), 524);
    assert_eq!(s.position(), 524);
}

#[test]
fn empty_read_does_not_grow_past_seek() {
    let mut s = store();
    s.seek(7).expect("seek");
    assert!(s.read(0).expect("read").is_empty());
    assert_eq!(s.len(), 8);
}

#[test]
fn writes_advance_cursor_and_extend() {
    let mut s = store();
    s.write(b"abc").expect("write");
    s.write(b"def").expect("write");
    assert_eq!(s.position(), 6);
    assert_eq!(s.len(), 6);

    s.write_at(10, b"xy").expect("write_at");
    assert_eq!(s.len(), 12);
    assert_eq!(s.read_at(0, 12).expect("read"), b"abcdef\0\0\0\0xy");
}

#[test]
fn overlapping_writes_keep_latest_bytes() {
    let mut s = store();
    s.write_at(100, b"AAAAAAAAAA").expect("first");
    s.write_at(105, b"BBBBB").expect("second");
    assert_eq!(s.read_at(100, 10).expect("read"), b"AAAAABBBBB");
}
