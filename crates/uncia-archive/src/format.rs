use std::fmt;
use std::io::{self, Read};

/// Compression filter recognized from magic bytes.
///
/// Only some filters have a decoder; the rest are recognized so that opening
/// such an archive fails with a precise reason instead of "unknown format".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Gzip,
    Bzip2,
    Xz,
    Lzma,
    Zstd,
    Compress,
    Lz4,
    Lzip,
}

impl Filter {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Lzma => "lzma",
            Self::Zstd => "zstd",
            Self::Compress => "compress",
            Self::Lz4 => "lz4",
            Self::Lzip => "lzip",
        }
    }

    /// Wrap `reader` in a decoder for this filter.
    ///
    /// Fails with [`io::ErrorKind::Unsupported`] when the filter has no decoder
    /// or its cargo feature is disabled.
    pub(crate) fn decoder(self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "bzip2")]
            Self::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader))),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
            #[cfg(feature = "xz")]
            Self::Lzma => {
                let stream =
                    xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::other)?;
                Ok(Box::new(xz2::read::XzDecoder::new_stream(reader, stream)))
            }
            #[cfg(feature = "zstd")]
            Self::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
            Self::Compress | Self::Lz4 | Self::Lzip => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} compression is not supported", self.name()),
            )),
            #[allow(unreachable_patterns)]
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} support is not enabled in this build", self.name()),
            )),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container format recognized after all filters are stripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Tar,
    Zip,
    /// Zero bytes of content. Extracts to nothing.
    Empty,
    SevenZip,
    Rar,
    Cpio,
    Ar,
    Iso9660,
    Xar,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::Zip => "zip",
            Self::Empty => "empty",
            Self::SevenZip => "7zip",
            Self::Rar => "rar",
            Self::Cpio => "cpio",
            Self::Ar => "arbsd",
            Self::Iso9660 => "iso9660",
            Self::Xar => "xar",
        }
    }

    /// Whether entries of this format can be read.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Tar | Self::Empty => true,
            Self::Zip => cfg!(feature = "zip"),
            _ => false,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
