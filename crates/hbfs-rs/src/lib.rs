//! Single-file virtual filesystem engine: block store, allocation bitmaps,
//! inode records, indirect block chains and directories encoded as files.
#![allow(clippy::cargo_common_metadata)]

pub mod config;
pub mod disk;
pub mod error;
pub mod layout;
pub mod manager;
pub mod node;
pub mod registry;
pub mod storage;

pub use config::DiskConfig;
pub use disk::{Disk, DiskReport};
pub use error::{FsError, FsResult, Resource};
pub use manager::{DiskManager, EntryInfo};
pub use node::{NodeKind, directory::Directory, stream::FileStream};
pub use registry::DiskRegistry;
pub use storage::medium::{ImageMedium, Medium, MemoryMedium};
