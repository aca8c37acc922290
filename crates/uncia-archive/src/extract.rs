//! The extraction pipeline: reader session to writer session, then flatten.

use std::path::Path;

use crate::entry::EntryHeader;
use crate::format::{Filter, Format};
use crate::options::ExtractOptions;
use crate::reader::ArchiveReader;
use crate::writer::DiskWriter;
use crate::{Error, Result};

/// Receives one notification per entry, before the entry is written.
pub trait Progress {
    fn entry(&mut self, header: &EntryHeader);

    /// Called once after the last entry of a successful extraction.
    fn finish(&mut self) {}
}

/// Discards all progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn entry(&mut self, _header: &EntryHeader) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractReport {
    pub format: Format,
    /// Outermost first.
    pub filters: Vec<Filter>,
    pub entries: u64,
    /// Content bytes written across all entries.
    pub bytes: u64,
    /// Whether flattening changed the layout.
    pub flattened: bool,
}

/// Extract `archive` into `destination`, creating it when missing.
///
/// The first failure aborts the extraction; entries already written stay on
/// disk. Flattening runs only after a complete extraction and its failure is
/// logged, not returned.
pub fn extract(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
    progress: &mut dyn Progress,
) -> Result<ExtractReport> {
    let archive = archive.as_ref();
    let destination = destination.as_ref();

    let root = uncia_fs::ensure_root(destination).map_err(|source| Error::Directory {
        path: destination.to_path_buf(),
        source,
    })?;
    tracing::info!("extracting {} into {}", archive.display(), root.display());

    let mut reader = ArchiveReader::open(archive, options.block_size)?;
    let mut writer = DiskWriter::open(&root, options.flags)?;

    let mut report = ExtractReport {
        format: reader.format(),
        filters: reader.filters().to_vec(),
        entries: 0,
        bytes: 0,
        flattened: false,
    };

    let mut entries = reader.entries()?;
    while let Some(mut entry) = entries.next_entry()? {
        progress.entry(entry.header());
        writer.write_header(entry.header())?;
        while let Some(block) = entry.next_block()? {
            writer.write_block(&block)?;
            report.bytes += block.len() as u64;
        }
        writer.finish_entry()?;
        report.entries += 1;
    }
    writer.close()?;
    progress.finish();

    if options.flatten {
        report.flattened = match uncia_fs::flatten(&root, &root) {
            Ok(changed) => changed,
            Err(source) => {
                let err = Error::Flatten {
                    path: root.clone(),
                    source,
                };
                tracing::warn!("{err}");
                false
            }
        };
    }

    tracing::info!(
        "extracted {} entries ({} bytes) from {}",
        report.entries,
        report.bytes,
        archive.display()
    );
    Ok(report)
}
