use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use uncia_archive::ExtractOptions;
use uncia_archive::suffix::classify;

use crate::progress::TerminalProgress;

#[derive(Debug, clap::Args)]
pub struct Extract {
    /// Archive to extract
    archive: PathBuf,

    /// Output directory [default: archive name without its suffixes]
    #[arg(short, long)]
    destination: Option<PathBuf>,

    /// Keep a single top-level directory instead of lifting its contents
    #[arg(long)]
    no_flatten: bool,

    /// Fail on existing files instead of replacing them
    #[arg(long)]
    keep_existing: bool,

    /// Do not restore times, permissions, ACLs or file flags
    #[arg(long)]
    no_restore: bool,
}

impl Extract {
    pub fn run(self, verbose: bool) -> anyhow::Result<()> {
        let destination = match self.destination {
            Some(dir) => dir,
            None => default_destination(&self.archive)?,
        };

        let mut options = ExtractOptions::new().flatten(!self.no_flatten);
        if self.keep_existing {
            options = options.keep_existing();
        }
        if self.no_restore {
            options = options.no_restore();
        }

        let mut progress = TerminalProgress::new(verbose);
        let report = uncia_archive::extract(&self.archive, &destination, &options, &mut progress)
            .with_context(|| format!("failed to extract {}", self.archive.display()))?;

        tracing::debug!(
            "{} entries, {} bytes, format {}, flattened: {}",
            report.entries,
            report.bytes,
            report.format,
            report.flattened
        );
        Ok(())
    }
}

/// The archive's file name with its archive suffixes removed, relative to
/// the current directory.
fn default_destination(archive: &Path) -> anyhow::Result<PathBuf> {
    let name = archive
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", archive.display()))?;

    let classified = classify(name);
    if classified.stem.is_empty() || classified.stem == name {
        bail!(
            "cannot derive an output directory from {name:?}, pass --destination"
        );
    }
    Ok(PathBuf::from(classified.stem))
}
