use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hbfs", author, version, about = "Inspect and edit hbfs disk images")]
pub struct Cli {
    /// Disk image to operate on.
    #[arg(long, global = true, env = "HBFS_IMAGE")]
    pub image: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new, empty image.
    Format(FormatArgs),

    /// Print the capacity of the image.
    Info,

    /// Change the name stored in the image.
    RenameDisk { name: String },

    /// List a directory.
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },

    Mkdir { path: String },

    Touch { path: String },

    Rm {
        path: String,

        #[arg(short, long)]
        recursive: bool,
    },

    /// Rename an entry inside its directory.
    Mv { path: String, new_name: String },

    /// Copy a local file into the image, replacing any existing content.
    Put { local: PathBuf, path: String },

    /// Write a file's content to stdout.
    Cat { path: String },

    /// Print the SHA-256 of a file's content.
    Sum { path: String },

    /// Summarise every image in a directory.
    Report(ReportArgs),
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, conflicts_with_all = ["blocks", "inodes"])]
    pub size_mb: Option<f64>,

    #[arg(long, requires = "inodes")]
    pub blocks: Option<u64>,

    #[arg(long, requires = "blocks")]
    pub inodes: Option<u64>,

    /// Overwrite an existing image.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[arg(long, env = "HBFS_IMAGE_DIR")]
    pub dir: PathBuf,
}
