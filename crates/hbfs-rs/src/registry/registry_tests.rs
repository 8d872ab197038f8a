use super::*;
use crate::storage::medium::{ImageMedium, MemoryMedium};

fn registry_with(names: &[&str]) -> DiskRegistry<MemoryMedium> {
    let mut registry = DiskRegistry::new();
    for name in names {
        registry
            .create_disk(MemoryMedium::new(), DiskConfig::new(64, 8), name)
            .expect("create disk");
    }
    registry
}

#[test]
fn disks_are_listed_in_name_order() {
    let registry = registry_with(&["zeta", "alpha", "mid"]);
    assert_eq!(registry.names(), ["alpha", "mid", "zeta"]);
    let report = registry.report();
    assert_eq!(report.len(), 3);
    assert_eq!(report[0].name, "alpha");
    assert_eq!(report[0].total_blocks, 64);
    assert_eq!(report[0].free_blocks, 64);
}

#[test]
fn duplicate_names_are_refused() {
    let mut registry = registry_with(&["main"]);
    assert!(matches!(
        registry.create_disk(MemoryMedium::new(), DiskConfig::new(8, 8), "main"),
        Err(FsError::AlreadyExists(_))
    ));

    let copy = Disk::create(MemoryMedium::new(), DiskConfig::new(8, 8), "main")
        .expect("create")
        .into_medium();
    assert!(matches!(
        registry.open_disk(copy),
        Err(FsError::AlreadyExists(_))
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn rename_rekeys_and_persists_the_name() {
    let mut registry = registry_with(&["old", "other"]);
    registry.rename_disk("old", "new").expect("rename");
    assert_eq!(registry.names(), ["new", "other"]);
    assert_eq!(registry.get("new").map(DiskManager::name), Some("new"));

    assert!(matches!(
        registry.rename_disk("new", "other"),
        Err(FsError::AlreadyExists(_))
    ));
    assert!(matches!(
        registry.rename_disk("missing", "x"),
        Err(FsError::NotFound(_))
    ));
    assert!(registry.rename_disk("new", "a/b").is_err());

    let medium = registry.remove("new").expect("remove");
    let disk = Disk::open(medium).expect("reopen");
    assert_eq!(disk.name(), "new");
}

#[test]
fn busy_disks_cannot_be_renamed_or_removed() {
    let mut registry = registry_with(&["main"]);
    let fs = registry.get_mut("main").expect("main");
    fs.create_file("f").expect("create");
    let handle = fs.open("/f").expect("open");

    assert!(matches!(
        registry.rename_disk("main", "renamed"),
        Err(FsError::ResourceBusy(_))
    ));
    assert!(matches!(
        registry.remove("main"),
        Err(FsError::ResourceBusy(_))
    ));

    registry
        .get_mut("main")
        .expect("main")
        .close(&handle)
        .expect("close");
    registry.rename_disk("main", "renamed").expect("rename");
    assert!(registry.remove("renamed").is_ok());
    assert!(registry.is_empty());
}

#[test]
fn image_files_reopen_into_a_fresh_registry() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("work.hbdk");

    let mut registry = DiskRegistry::new();
    let medium = ImageMedium::create(&path).expect("create image");
    let fs = registry
        .create_disk(medium, DiskConfig::new(128, 8), "work")
        .expect("create disk");
    fs.create_file("readme").expect("create");
    let handle = fs.open("readme").expect("open");
    fs.write_all(&handle, b"persisted content").expect("write");
    fs.close(&handle).expect("close");
    registry.flush_all().expect("flush");
    drop(registry.remove("work").expect("remove"));

    let mut registry = DiskRegistry::new();
    let medium = ImageMedium::open(&path).expect("open image");
    let fs = registry.open_disk(medium).expect("open disk");
    let handle = fs.open("/readme").expect("open");
    assert_eq!(fs.read_all(&handle).expect("read"), b"persisted content");
    assert_eq!(registry.report()[0].free_inodes, 6);
}
