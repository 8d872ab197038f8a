mod cli;
mod commands;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Format(args) => {
            let report = commands::format_image(image(&cli)?, args)?;
            println!("{}", commands::render_report(&report));
        }
        Command::Report(args) => {
            for report in commands::report_dir(&args.dir)? {
                println!("{}", commands::render_report(&report));
            }
        }
        command => run_on_image(image(&cli)?, command)?,
    }
    Ok(())
}

fn image(cli: &Cli) -> Result<&Path> {
    cli.image
        .as_deref()
        .context("no disk image given; pass --image or set HBFS_IMAGE")
}

fn run_on_image(path: &Path, command: &Command) -> Result<()> {
    let mut fs = commands::open_image(path)?;
    let mut mutated = true;

    match command {
        Command::Info => {
            println!("{}", commands::render_report(&fs.report()));
            mutated = false;
        }
        Command::RenameDisk { name } => fs.rename_disk(name)?,
        Command::Ls { path } => {
            for entry in commands::list(&mut fs, path)? {
                println!("{}", commands::render_entry(&entry));
            }
            mutated = false;
        }
        Command::Mkdir { path } => commands::make_directory(&mut fs, path)?,
        Command::Touch { path } => commands::touch(&mut fs, path)?,
        Command::Rm { path, recursive } => commands::remove(&mut fs, path, *recursive)?,
        Command::Mv { path, new_name } => commands::rename(&mut fs, path, new_name)?,
        Command::Put { local, path } => {
            let content =
                std::fs::read(local).with_context(|| format!("reading {}", local.display()))?;
            commands::put(&mut fs, path, &content)?;
        }
        Command::Cat { path } => {
            let content = commands::cat(&mut fs, path)?;
            std::io::stdout().write_all(&content)?;
            mutated = false;
        }
        Command::Sum { path } => {
            println!("{}  {path}", commands::checksum(&mut fs, path)?);
            mutated = false;
        }
        Command::Format(_) | Command::Report(_) => {}
    }

    if mutated {
        fs.flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        info!(image = %path.display(), "saved image");
    }
    Ok(())
}
