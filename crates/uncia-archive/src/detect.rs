//! Magic-byte sniffing over a non-seekable stream.

use std::io::{self, Read};

use crate::format::{Filter, Format};

/// Bytes inspected to identify a filter or a format: one tar header block.
pub(crate) const SNIFF_LEN: usize = 512;

/// Offset of the primary volume descriptor identifier in an ISO 9660 image.
pub(crate) const ISO_MAGIC_OFFSET: usize = 0x8001;
const ISO_MAGIC: &[u8] = b"CD001";

/// A reader that can look ahead without consuming.
pub(crate) struct Peekable<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> Peekable<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Return up to `len` upcoming bytes. Fewer are returned only at end of stream.
    pub(crate) fn peek(&mut self, len: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        while self.buf.len() < len {
            let start = self.buf.len();
            self.buf.resize(len, 0);
            match self.inner.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    break;
                }
                Ok(n) => self.buf.truncate(start + n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.buf.truncate(start),
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        }
        Ok(&self.buf[..len.min(self.buf.len())])
    }
}

impl<R: Read> Read for Peekable<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let n = (self.buf.len() - self.pos).min(out.len());
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            if self.pos == self.buf.len() {
                self.buf.clear();
                self.pos = 0;
            }
            return Ok(n);
        }
        self.inner.read(out)
    }
}

/// Block header magic of a bzip2 stream (BCD pi).
const BZIP2_BLOCK_MAGIC: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];
/// End-of-stream magic of a bzip2 stream (BCD sqrt(pi)), seen first in an empty stream.
const BZIP2_EOS_MAGIC: [u8; 6] = [0x17, 0x72, 0x45, 0x38, 0x50, 0x90];

/// Identify the outermost compression filter. Callers check for a container
/// first: the printable magics below can begin a tar member name.
pub(crate) fn sniff_filter(head: &[u8]) -> Option<Filter> {
    match head {
        [0x1F, 0x8B, ..] => Some(Filter::Gzip),
        [b'B', b'Z', b'h', b'1'..=b'9', rest @ ..]
            if rest.starts_with(&BZIP2_BLOCK_MAGIC) || rest.starts_with(&BZIP2_EOS_MAGIC) =>
        {
            Some(Filter::Bzip2)
        }
        [0xFD, b'7', b'z', b'X', b'Z', 0x00, ..] => Some(Filter::Xz),
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(Filter::Zstd),
        [0x1F, 0x9D, ..] => Some(Filter::Compress),
        [0x04, 0x22, 0x4D, 0x18, ..] => Some(Filter::Lz4),
        [b'L', b'Z', b'I', b'P', 0 | 1, ..] => Some(Filter::Lzip),
        _ if is_lzma_alone(head) => Some(Filter::Lzma),
        _ => None,
    }
}

/// The legacy `.lzma` header has no magic: properties byte `0x5D`, a
/// dictionary size, then the uncompressed size or all ones.
fn is_lzma_alone(head: &[u8]) -> bool {
    let [0x5D, 0x00, 0x00, _, _, size @ ..] = head else {
        return false;
    };
    size.len() >= 8 && (size[..8] == [0xFF; 8] || size[5..8] == [0, 0, 0])
}

/// Identify the container from the first [`SNIFF_LEN`] bytes of the decoded stream.
pub(crate) fn sniff_format(head: &[u8]) -> Option<Format> {
    match head {
        [] => Some(Format::Empty),
        [b'P', b'K', 0x03, 0x04, ..] | [b'P', b'K', 0x05, 0x06, ..] => Some(Format::Zip),
        [b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C, ..] => Some(Format::SevenZip),
        [b'R', b'a', b'r', b'!', 0x1A, 0x07, ..] => Some(Format::Rar),
        [b'x', b'a', b'r', b'!', ..] => Some(Format::Xar),
        [b'!', b'<', b'a', b'r', b'c', b'h', b'>', b'\n', ..] => Some(Format::Ar),
        [b'0', b'7', b'0', b'7', b'0', b'1' | b'2' | b'7', ..] => Some(Format::Cpio),
        [0xC7, 0x71, ..] | [0x71, 0xC7, ..] => Some(Format::Cpio),
        _ if is_tar_header(head) => Some(Format::Tar),
        _ => None,
    }
}

/// Check for an ISO 9660 volume descriptor in a window starting at offset zero.
pub(crate) fn is_iso9660(window: &[u8]) -> bool {
    window
        .get(ISO_MAGIC_OFFSET..ISO_MAGIC_OFFSET + ISO_MAGIC.len())
        .is_some_and(|magic| magic == ISO_MAGIC)
}

/// A block is a tar header when it carries the ustar/GNU magic, when its
/// checksum field matches (pre-POSIX v7 headers), or when it is all zeros
/// (an archive with no entries).
fn is_tar_header(block: &[u8]) -> bool {
    let Some(block) = block.get(..SNIFF_LEN) else {
        return false;
    };
    if block.iter().all(|&b| b == 0) {
        return true;
    }
    if &block[257..263] == b"ustar\0" || &block[257..265] == b"ustar  \0" {
        return true;
    }
    block[0] != 0 && checksum_matches(block)
}

fn checksum_matches(block: &[u8]) -> bool {
    let field = &block[148..156];
    let digits = field
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| (b'0'..=b'7').contains(&b));
    let mut stored = 0u32;
    let mut seen = false;
    for &digit in digits {
        stored = stored * 8 + u32::from(digit - b'0');
        seen = true;
    }
    if !seen {
        return false;
    }

    let computed: u32 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum();
    stored == computed
}
