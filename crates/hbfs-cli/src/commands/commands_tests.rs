use super::*;
use hbfs_rs::MemoryMedium;
use tempfile::TempDir;

fn memory_fs() -> DiskManager<MemoryMedium> {
    let disk = Disk::create(MemoryMedium::new(), DiskConfig::new(256, 16), "mem").expect("create");
    DiskManager::new(disk).expect("manager")
}

fn format_args(name: &str) -> FormatArgs {
    FormatArgs {
        name: name.to_string(),
        size_mb: None,
        blocks: Some(128),
        inodes: Some(16),
        force: false,
    }
}

#[test]
fn split_path_finds_parent_and_name() {
    assert_eq!(split_path("/a/b/c").expect("nested"), ("/a/b", "c"));
    assert_eq!(split_path("/top").expect("top"), ("/", "top"));
    assert_eq!(split_path("rel").expect("relative"), ("/", "rel"));
    assert_eq!(split_path("/dir/").expect("trailing"), ("/", "dir"));
    assert!(split_path("/").is_err());
    assert!(split_path("").is_err());
}

#[test]
fn capacity_comes_from_one_source() {
    let mut args = format_args("x");
    assert_eq!(disk_config(&args).expect("explicit"), DiskConfig::new(128, 16));

    args.blocks = None;
    args.inodes = None;
    assert!(disk_config(&args).is_err(), "nothing given");

    args.size_mb = Some(1.0);
    assert_eq!(disk_config(&args).expect("megabytes"), DiskConfig::new(512, 32));

    args.blocks = Some(8);
    assert!(disk_config(&args).is_err(), "mixed sources");
}

#[test]
fn put_cat_and_checksum() {
    let mut fs = memory_fs();
    make_directory(&mut fs, "/docs").expect("mkdir");
    put(&mut fs, "/docs/hello.txt", b"hello world").expect("put");

    assert_eq!(cat(&mut fs, "/docs/hello.txt").expect("cat"), b"hello world");
    assert_eq!(
        checksum(&mut fs, "docs/hello.txt").expect("sum"),
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );

    put(&mut fs, "/docs/hello.txt", b"bye").expect("overwrite");
    assert_eq!(cat(&mut fs, "/docs/hello.txt").expect("cat"), b"bye");
    assert!(!fs.has_open_handles());
}

#[test]
fn entry_commands_work_from_any_depth() {
    let mut fs = memory_fs();
    make_directory(&mut fs, "/a").expect("mkdir a");
    make_directory(&mut fs, "/a/b").expect("mkdir b");
    touch(&mut fs, "/a/b/f").expect("touch");
    touch(&mut fs, "/a/b/f").expect("touch is idempotent");

    let names: Vec<String> = list(&mut fs, "/a/b")
        .expect("ls")
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["..", ".", "f"]);

    rename(&mut fs, "/a/b/f", "g").expect("mv");
    assert!(cat(&mut fs, "/a/b/f").is_err());
    assert!(cat(&mut fs, "/a/b/g").expect("cat").is_empty());

    assert!(remove(&mut fs, "/a", false).is_err());
    remove(&mut fs, "/a", true).expect("rm -r");
    assert!(list(&mut fs, "/").expect("ls root").is_empty());
    assert!(!fs.has_open_handles());
}

#[test]
fn rendering() {
    let report = DiskReport {
        name: "main".to_string(),
        total_blocks: 512,
        free_blocks: 500,
        total_inodes: 32,
        free_inodes: 31,
    };
    assert_eq!(
        render_report(&report),
        "main: 500/512 blocks free, 31/32 inodes free"
    );

    let entry = EntryInfo {
        name: "notes".to_string(),
        kind: NodeKind::Directory,
        size: 23,
        modified: 1,
    };
    let line = render_entry(&entry);
    assert!(line.starts_with("d "));
    assert!(line.ends_with(" notes"));
}

#[test]
fn images_format_reopen_and_report() {
    let dir = TempDir::new().expect("tempdir");
    let first = dir.path().join("first.hbdk");
    let second = dir.path().join("second.hbdk");
    std::fs::write(dir.path().join("ignored.txt"), b"not an image").expect("stray file");

    format_image(&first, &format_args("first")).expect("format first");
    format_image(&second, &format_args("second")).expect("format second");
    assert!(format_image(&first, &format_args("again")).is_err(), "no overwrite");

    {
        let mut fs = open_image(&first).expect("open");
        put(&mut fs, "/data.bin", &[7u8; 5000]).expect("put");
        fs.flush().expect("flush");
    }

    let reports = report_dir(dir.path()).expect("report");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].name, "first");
    // three data blocks for the file, one for the root list
    assert_eq!(reports[0].free_blocks, 128 - 4);
    assert_eq!(reports[1].free_blocks, 128);

    let mut fs = open_image(&first).expect("reopen");
    assert_eq!(cat(&mut fs, "/data.bin").expect("cat"), vec![7u8; 5000]);
}
