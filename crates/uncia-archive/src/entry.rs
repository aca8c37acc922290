use std::path::{Path, PathBuf};

use filetime::FileTime;

/// Metadata of one archive entry, as decoded from the archive.
///
/// `path` and link targets are untrusted: they are exactly what the archive
/// says and are only made safe by the disk writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryHeader {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Declared content length. Zero for everything but regular files.
    pub size: u64,
    pub mode: Option<u32>,
    pub mtime: Option<FileTime>,
    pub atime: Option<FileTime>,
    pub acl: Acl,
    /// BSD style flag list, e.g. `nodump,uappnd`.
    pub fflags: Option<String>,
}

impl EntryHeader {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
            size: 0,
            mode: None,
            mtime: None,
            atime: None,
            acl: Acl::default(),
            fflags: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>, size: u64) -> Self {
        Self::new(path, EntryKind::File).with_size(size)
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EntryKind::Directory)
    }

    pub fn symlink(path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            EntryKind::Symlink {
                target: target.into(),
            },
        )
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_mtime(mut self, mtime: FileTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn link_target(&self) -> Option<&Path> {
        match &self.kind {
            EntryKind::Symlink { target } | EntryKind::HardLink { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink { target: PathBuf },
    /// Link to an earlier entry of the same archive, named by its archive path.
    HardLink { target: PathBuf },
    Fifo,
    CharDevice { major: u32, minor: u32 },
    BlockDevice { major: u32, minor: u32 },
}

impl EntryKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink { .. } => "symlink",
            Self::HardLink { .. } => "hard link",
            Self::Fifo => "fifo",
            Self::CharDevice { .. } => "character device",
            Self::BlockDevice { .. } => "block device",
        }
    }
}

/// POSIX.1e ACLs in their long text form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acl {
    pub access: Option<String>,
    pub default: Option<String>,
}

impl Acl {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.default.is_none()
    }
}

/// A slice of entry content and where it belongs within the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataBlock<'a> {
    pub data: &'a [u8],
    pub offset: u64,
}

impl DataBlock<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
