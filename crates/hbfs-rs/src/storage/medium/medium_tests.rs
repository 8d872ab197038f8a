use super::*;
use rand::RngCore;
use tempfile::NamedTempFile;

#[test]
fn memory_medium_grows_with_zeros() {
    let mut m = MemoryMedium::new();
    assert!(m.is_empty());

    m.grow(4096).expect("grow");
    assert_eq!(m.len(), 4096);
    let mut buf = vec![0xAAu8; 4096];
    m.read_at(0, &mut buf).expect("read");
    assert!(buf.iter().all(|&b| b == 0), "grown space must read as zeros");

    m.grow(100).expect("no shrink");
    assert_eq!(m.len(), 4096, "grow never shrinks");
}

#[test]
fn memory_medium_rejects_out_of_range_access() {
    let mut m = MemoryMedium::from_bytes(vec![1, 2, 3]);
    let mut buf = [0u8; 2];
    m.read_at(1, &mut buf).expect("in range");
    assert_eq!(buf, [2, 3]);

    let err = m.read_at(2, &mut buf).expect_err("past end");
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    assert!(m.write_at(3, &[9]).is_err());

    m.write_at(0, &[7, 8]).expect("write");
    assert_eq!(m.into_bytes(), vec![7, 8, 3]);
}

#[test]
fn image_medium_roundtrip_and_trim_on_flush() {
    let tf = NamedTempFile::new().expect("tmp file");

    let mut data = vec![0u8; 5000];
    rand::rng().fill_bytes(&mut data);

    {
        let mut img = ImageMedium::create(tf.path()).expect("create");
        assert!(img.is_empty());
        img.grow(10_000).expect("grow");
        img.write_at(1234, &data).expect("write");

        let mut back = vec![0u8; data.len()];
        img.read_at(1234, &mut back).expect("read");
        assert_eq!(back, data);

        img.flush().expect("flush");
        let meta = std::fs::metadata(tf.path()).expect("metadata");
        assert_eq!(meta.len(), 10_000, "flush trims headroom");
    }

    let img = ImageMedium::open(tf.path()).expect("reopen");
    assert_eq!(img.len(), 10_000);
    let mut back = vec![0u8; data.len()];
    img.read_at(1234, &mut back).expect("read after reopen");
    assert_eq!(back, data);
}

#[test]
fn image_medium_drop_persists_without_explicit_flush() {
    let tf = NamedTempFile::new().expect("tmp file");
    {
        let mut img = ImageMedium::create(tf.path()).expect("create");
        img.grow(64).expect("grow");
        img.write_at(60, b"tail").expect("write");
    }
    let bytes = std::fs::read(tf.path()).expect("read image");
    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[60..], b"tail");
}

#[test]
fn image_medium_open_missing_file_fails() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    assert!(ImageMedium::open(dir.path().join("absent.hbdk")).is_err());
}
