//! Command implementations over a `DiskManager`.
//!
//! Paths given on the command line are resolved from `/`. Entry operations
//! navigate to the parent directory first, since the engine works on names
//! inside the working directory.

#[cfg(test)]
mod commands_tests;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hbfs_rs::config::IMAGE_EXTENSION;
use hbfs_rs::{
    Disk, DiskConfig, DiskManager, DiskRegistry, DiskReport, EntryInfo, FsError, FsResult,
    ImageMedium, Medium, NodeKind,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cli::FormatArgs;

/// `disk_config` picks the capacity from either `--size-mb` or the
/// explicit `--blocks`/`--inodes` pair.
pub fn disk_config(args: &FormatArgs) -> Result<DiskConfig> {
    let config = match (args.size_mb, args.blocks, args.inodes) {
        (Some(mb), None, None) => DiskConfig::from_megabytes(mb)?,
        (None, Some(blocks), Some(inodes)) => DiskConfig::new(blocks, inodes),
        (None, None, None) => bail!("pass either --size-mb or --blocks with --inodes"),
        _ => bail!("--size-mb cannot be combined with --blocks/--inodes"),
    };
    config.validate()?;
    Ok(config)
}

/// Formats a new image file at `path`.
pub fn format_image(path: &Path, args: &FormatArgs) -> Result<DiskReport> {
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    let config = disk_config(args)?;
    let medium = ImageMedium::create(path)
        .with_context(|| format!("creating image {}", path.display()))?;
    let mut disk = Disk::create(medium, config, &args.name)?;
    disk.flush()?;
    info!(path = %path.display(), "formatted image");
    Ok(disk.report())
}

pub fn open_image(path: &Path) -> Result<DiskManager<ImageMedium>> {
    let medium =
        ImageMedium::open(path).with_context(|| format!("opening image {}", path.display()))?;
    let disk = Disk::open(medium).with_context(|| format!("reading image {}", path.display()))?;
    Ok(DiskManager::new(disk)?)
}

/// Splits `path` into its parent directory and final name.
pub fn split_path(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let (parent, name) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("/", trimmed),
    };
    if name.is_empty() {
        bail!("{path:?} does not name an entry");
    }
    Ok((parent, name))
}

pub fn list<M: Medium>(fs: &mut DiskManager<M>, path: &str) -> Result<Vec<EntryInfo>> {
    fs.navigate("/")?;
    fs.navigate(path)
        .with_context(|| format!("entering {path}"))?;
    Ok(fs.list_entries()?)
}

pub fn make_directory<M: Medium>(fs: &mut DiskManager<M>, path: &str) -> Result<()> {
    let (_, name) = enter_parent(fs, path)?;
    fs.create_directory(name)
        .with_context(|| format!("creating directory {path}"))
}

/// Creates an empty file unless `path` already exists.
pub fn touch<M: Medium>(fs: &mut DiskManager<M>, path: &str) -> Result<()> {
    let (_, name) = enter_parent(fs, path)?;
    match fs.create_file(name) {
        Ok(()) | Err(FsError::AlreadyExists(_)) => Ok(()),
        Err(err) => Err(err).with_context(|| format!("creating {path}")),
    }
}

pub fn remove<M: Medium>(fs: &mut DiskManager<M>, path: &str, recursive: bool) -> Result<()> {
    let (_, name) = enter_parent(fs, path)?;
    fs.delete(name, recursive)
        .with_context(|| format!("removing {path}"))
}

pub fn rename<M: Medium>(fs: &mut DiskManager<M>, path: &str, new_name: &str) -> Result<()> {
    let (_, name) = enter_parent(fs, path)?;
    fs.rename(name, new_name)
        .with_context(|| format!("renaming {path} to {new_name}"))
}

/// Replaces the content of `path`, creating the file if needed.
pub fn put<M: Medium>(fs: &mut DiskManager<M>, path: &str, content: &[u8]) -> Result<()> {
    touch(fs, path)?;
    with_handle(fs, path, |fs, handle| fs.write_all(handle, content))?;
    debug!(path, len = content.len(), "stored file");
    Ok(())
}

pub fn cat<M: Medium>(fs: &mut DiskManager<M>, path: &str) -> Result<Vec<u8>> {
    with_handle(fs, path, DiskManager::read_all)
}

/// Hex SHA-256 of the content of `path`.
pub fn checksum<M: Medium>(fs: &mut DiskManager<M>, path: &str) -> Result<String> {
    let content = cat(fs, path)?;
    let digest: [u8; 32] = Sha256::digest(&content).into();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Opens every `*.hbdk` image under `dir` and reports them in name order.
pub fn report_dir(dir: &Path) -> Result<Vec<DiskReport>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == IMAGE_EXTENSION))
        .collect();
    images.sort();

    let mut registry = DiskRegistry::new();
    for path in &images {
        let medium = ImageMedium::open(path)
            .with_context(|| format!("opening image {}", path.display()))?;
        registry
            .open_disk(medium)
            .with_context(|| format!("registering {}", path.display()))?;
    }
    Ok(registry.report())
}

#[must_use]
pub fn render_report(report: &DiskReport) -> String {
    format!(
        "{}: {}/{} blocks free, {}/{} inodes free",
        report.name,
        report.free_blocks,
        report.total_blocks,
        report.free_inodes,
        report.total_inodes
    )
}

#[must_use]
pub fn render_entry(entry: &EntryInfo) -> String {
    let kind = match entry.kind {
        NodeKind::File => '-',
        NodeKind::Directory => 'd',
    };
    format!(
        "{kind} {:>10} {:>14} {}",
        entry.size, entry.modified, entry.name
    )
}

fn enter_parent<'p, M: Medium>(
    fs: &mut DiskManager<M>,
    path: &'p str,
) -> Result<(&'p str, &'p str)> {
    let (parent, name) = split_path(path)?;
    fs.navigate("/")?;
    fs.navigate(parent)
        .with_context(|| format!("entering {parent}"))?;
    Ok((parent, name))
}

/// Runs `op` on a handle for `path` and always closes it afterwards.
fn with_handle<M: Medium, T>(
    fs: &mut DiskManager<M>,
    path: &str,
    op: impl FnOnce(&mut DiskManager<M>, &str) -> FsResult<T>,
) -> Result<T> {
    fs.navigate("/")?;
    let handle = fs.open(path).with_context(|| format!("opening {path}"))?;
    let result = op(fs, &handle);
    fs.close(&handle)
        .with_context(|| format!("closing {handle}"))?;
    result.with_context(|| format!("accessing {path}"))
}
