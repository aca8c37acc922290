//! Streaming archive reader with codec auto-negotiation.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::detect::{self, ISO_MAGIC_OFFSET, Peekable, SNIFF_LEN};
use crate::entry::{DataBlock, EntryHeader};
use crate::format::{Filter, Format};
use crate::{Error, Result};

mod tar;
#[cfg(feature = "zip")]
mod zip;

/// Upper bound on stacked compression filters, e.g. `.tar.gz.xz`.
pub const MAX_FILTERS: usize = 4;

/// Smallest accepted block size.
const MIN_BLOCK_SIZE: usize = 512;

type Stream = Peekable<Box<dyn Read>>;

enum Container {
    Empty,
    Tar(::tar::Archive<Stream>),
    #[cfg(feature = "zip")]
    Zip(::zip::ZipArchive<File>),
}

/// One archive opened for sequential reading.
pub struct ArchiveReader {
    path: PathBuf,
    format: Format,
    filters: Vec<Filter>,
    block_size: usize,
    container: Container,
}

impl ArchiveReader {
    /// Open `path` and negotiate its filter chain and container format.
    ///
    /// Reads are issued in `block_size` chunks, and data blocks handed out by
    /// [`ArchiveEntry::next_block`] are at most that long.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let block_size = block_size.max(MIN_BLOCK_SIZE);
        let file = File::open(path).map_err(|e| Error::open(path, e))?;
        let inner: Box<dyn Read> = Box::new(BufReader::with_capacity(block_size, file));
        let mut stream = Peekable::new(inner);

        let mut filters = Vec::new();
        loop {
            let head = stream.peek(SNIFF_LEN).map_err(|e| Error::open(path, e))?;
            // A recognizable container header wins over a filter magic.
            if detect::sniff_format(head).is_some() {
                break;
            }
            let Some(filter) = detect::sniff_filter(head) else {
                break;
            };
            if filters.len() == MAX_FILTERS {
                return Err(Error::open(
                    path,
                    format!("more than {MAX_FILTERS} nested compression filters"),
                ));
            }
            tracing::debug!("{}: stacking {filter} decoder", path.display());
            let decoder = filter
                .decoder(Box::new(stream))
                .map_err(|e| Error::open(path, e))?;
            stream = Peekable::new(decoder);
            filters.push(filter);
        }

        let format = sniff_container(&mut stream).map_err(|e| Error::open(path, e))?;
        let Some(format) = format else {
            return Err(Error::open(path, "unrecognized archive format"));
        };
        if !format.is_supported() {
            return Err(Error::open(
                path,
                format!("{format} archives are not supported"),
            ));
        }
        tracing::debug!("{}: detected {format} format", path.display());

        let container = match format {
            Format::Tar => Container::Tar(::tar::Archive::new(stream)),
            #[cfg(feature = "zip")]
            Format::Zip => Container::Zip(open_zip(path, stream, !filters.is_empty())?),
            _ => Container::Empty,
        };

        Ok(Self {
            path: path.to_path_buf(),
            format,
            filters,
            block_size,
            container,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Negotiated filters, outermost first.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Start iterating entries. Meant to be called once per reader.
    pub fn entries(&mut self) -> Result<Entries<'_>> {
        let source: Box<dyn EntrySource + '_> = match &mut self.container {
            Container::Empty => Box::new(NoEntries),
            Container::Tar(archive) => {
                let entries = archive.entries().map_err(Error::header)?;
                Box::new(tar::TarSource::new(entries))
            }
            #[cfg(feature = "zip")]
            Container::Zip(archive) => Box::new(zip::ZipSource::new(archive)),
        };
        Ok(Entries {
            source,
            buf: vec![0; self.block_size],
            done: false,
        })
    }
}

fn sniff_container(stream: &mut Stream) -> io::Result<Option<Format>> {
    if let Some(format) = detect::sniff_format(stream.peek(SNIFF_LEN)?) {
        return Ok(Some(format));
    }
    let window = stream.peek(ISO_MAGIC_OFFSET + 5)?;
    Ok(detect::is_iso9660(window).then_some(Format::Iso9660))
}

/// Zip needs random access. A filtered zip is decoded into a spool file first.
#[cfg(feature = "zip")]
fn open_zip(path: &Path, mut stream: Stream, filtered: bool) -> Result<::zip::ZipArchive<File>> {
    use std::io::Seek;

    let file = if filtered {
        let mut spool = tempfile::tempfile().map_err(|e| Error::open(path, e))?;
        io::copy(&mut stream, &mut spool).map_err(|e| Error::open(path, e))?;
        spool.rewind().map_err(|e| Error::open(path, e))?;
        spool
    } else {
        drop(stream);
        File::open(path).map_err(|e| Error::open(path, e))?
    };
    ::zip::ZipArchive::new(file).map_err(|e| Error::open(path, e))
}

/// Per-format entry decoding.
pub(crate) trait EntrySource {
    /// Advance to the next entry. The reader yields exactly the entry's content.
    fn next_entry(&mut self) -> Result<Option<(EntryHeader, Box<dyn Read + '_>)>>;
}

struct NoEntries;

impl EntrySource for NoEntries {
    fn next_entry(&mut self) -> Result<Option<(EntryHeader, Box<dyn Read + '_>)>> {
        Ok(None)
    }
}

/// Pull iterator over the entries of an [`ArchiveReader`].
///
/// Fused: after end of archive or the first error, `next_entry` keeps
/// returning `Ok(None)`.
pub struct Entries<'a> {
    source: Box<dyn EntrySource + 'a>,
    buf: Vec<u8>,
    done: bool,
}

impl Entries<'_> {
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry<'_>>> {
        if self.done {
            return Ok(None);
        }
        match self.source.next_entry() {
            Ok(Some((header, data))) => {
                let remaining = if header.is_file() { header.size } else { 0 };
                Ok(Some(ArchiveEntry {
                    header,
                    data,
                    buf: &mut self.buf,
                    offset: 0,
                    remaining,
                }))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }
}

/// The current entry. Borrowing [`Entries`] keeps it valid only until the
/// next call to `next_entry`.
pub struct ArchiveEntry<'e> {
    header: EntryHeader,
    data: Box<dyn Read + 'e>,
    buf: &'e mut [u8],
    offset: u64,
    remaining: u64,
}

impl ArchiveEntry<'_> {
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Next chunk of content, or `Ok(None)` once the declared size is reached.
    ///
    /// A stream that ends early is an error, never a short entry.
    pub fn next_block(&mut self) -> Result<Option<DataBlock<'_>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let want = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(self.buf.len());

        let read = loop {
            match self.data.read(&mut self.buf[..want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.remaining = 0;
                    return Err(self.read_error(e));
                }
            }
        };
        if read == 0 {
            let missing = self.remaining;
            self.remaining = 0;
            return Err(self.read_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive truncated, {missing} bytes of content missing"),
            )));
        }

        let offset = self.offset;
        self.offset += read as u64;
        self.remaining -= read as u64;
        Ok(Some(DataBlock {
            data: &self.buf[..read],
            offset,
        }))
    }

    fn read_error(&self, source: io::Error) -> Error {
        Error::BlockRead {
            path: self.header.path.clone(),
            source,
        }
    }
}
