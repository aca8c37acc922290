//! Materializes archive entries below one output root.

use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::entry::{DataBlock, EntryHeader, EntryKind};
use crate::error::WriteError;
use crate::sanitize::{check_no_symlink_ancestors, check_symlink_target, normalize_entry_path};
use crate::{Error, Result};

mod flags;
mod metadata;

pub use flags::WriteFlags;

const STAGING_PREFIX: &str = ".uncia-";

/// Entry in progress between `write_header` and `finish_entry`.
struct Pending {
    header: EntryHeader,
    target: PathBuf,
    staged: Option<Staged>,
}

struct Staged {
    file: NamedTempFile,
    position: u64,
}

/// Write session bound to one output root.
///
/// Entry paths are always joined onto the root; the process working
/// directory is never consulted or changed.
pub struct DiskWriter {
    root: PathBuf,
    flags: WriteFlags,
    current: Option<Pending>,
    deferred_dirs: Vec<(PathBuf, EntryHeader)>,
}

impl DiskWriter {
    /// Open a writer on an existing directory.
    pub fn open(root: impl AsRef<Path>, flags: WriteFlags) -> Result<Self> {
        let root = root.as_ref();
        let root = uncia_fs::resolve_root(root).map_err(|source| Error::Directory {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root,
            flags,
            current: None,
            deferred_dirs: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn flags(&self) -> WriteFlags {
        self.flags
    }

    /// Finish the previous entry, then create the object `header` describes.
    pub fn write_header(&mut self, header: &EntryHeader) -> Result<()> {
        self.finish_entry()?;
        let pending = self
            .create(header)
            .map_err(|source| Error::header_write(&header.path, source))?;
        self.current = pending;
        Ok(())
    }

    /// Write one block of the current entry's content.
    ///
    /// Blocks may skip ahead; the gap stays a hole. Data for anything but a
    /// regular file is discarded.
    pub fn write_block(&mut self, block: &DataBlock<'_>) -> Result<()> {
        let Some(Pending {
            header,
            staged: Some(staged),
            ..
        }) = self.current.as_mut()
        else {
            return Ok(());
        };
        let result = (|| -> io::Result<()> {
            if staged.position != block.offset {
                staged.file.seek(SeekFrom::Start(block.offset))?;
            }
            staged.file.write_all(block.data)?;
            staged.position = block.offset + block.data.len() as u64;
            Ok(())
        })();
        result.map_err(|source| Error::BlockWrite {
            path: header.path.clone(),
            source,
        })
    }

    /// Complete the current entry: move staged content into place and
    /// restore metadata. A no-op without a current entry.
    pub fn finish_entry(&mut self) -> Result<()> {
        let Some(Pending {
            header,
            target,
            staged,
        }) = self.current.take()
        else {
            return Ok(());
        };

        if let Some(Staged { file, .. }) = staged {
            file.as_file()
                .set_len(header.size)
                .map_err(|source| Error::BlockWrite {
                    path: header.path.clone(),
                    source,
                })?;
            file.persist(&target).map_err(|e| Error::BlockWrite {
                path: header.path.clone(),
                source: e.error,
            })?;
        }

        match header.kind {
            EntryKind::Directory => self.deferred_dirs.push((target, header)),
            // A hard link shares the metadata of its target.
            EntryKind::HardLink { .. } => {}
            _ => metadata::restore(&target, &header, self.flags),
        }
        Ok(())
    }

    /// Finish the last entry and restore directory metadata, deepest first,
    /// so that extracting children cannot disturb a parent's mode or mtime.
    pub fn close(mut self) -> Result<()> {
        self.finish_entry()?;
        let mut dirs = std::mem::take(&mut self.deferred_dirs);
        dirs.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, header) in dirs {
            if self.is_real_dir(&path) {
                metadata::restore(&path, &header, self.flags);
            } else {
                tracing::debug!("{}: replaced after extraction, metadata skipped", path.display());
            }
        }
        Ok(())
    }

    /// `path` is still a directory reached without crossing a symlink.
    fn is_real_dir(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
            && check_no_symlink_ancestors(&self.root, rel).is_ok()
    }

    fn create(&mut self, header: &EntryHeader) -> std::result::Result<Option<Pending>, WriteError> {
        let rel = normalize_entry_path(&header.path, self.flags.contains(WriteFlags::SECURE_NODOTDOT))?;
        if rel.as_os_str().is_empty() {
            // `./` names the root, which already exists and keeps its metadata.
            return match header.kind {
                EntryKind::Directory => Ok(None),
                _ => Err(WriteError::EmptyPath),
            };
        }

        let secure_symlinks = self.flags.contains(WriteFlags::SECURE_SYMLINKS);
        if secure_symlinks {
            check_no_symlink_ancestors(&self.root, &rel)?;
        }
        let target = self.root.join(&rel);

        let link_source = match &header.kind {
            EntryKind::Symlink { target: link } if secure_symlinks => {
                check_symlink_target(&self.root, &rel, link)?;
                None
            }
            EntryKind::HardLink { target: link } => Some(self.hard_link_source(link)?),
            _ => None,
        };

        if let Some(parent) = target.parent() {
            uncia_fs::ensure_dir(parent)?;
        }
        if !self.clear_target(&target, header)? {
            return Ok(Some(Pending {
                header: header.clone(),
                target,
                staged: None,
            }));
        }
        // Whatever stood here is gone; so is any directory metadata owed to it.
        self.deferred_dirs.retain(|(path, _)| !path.starts_with(&target));

        tracing::debug!("creating {} {}", header.kind.name(), rel.display());
        let staged = match &header.kind {
            EntryKind::File => {
                let parent = target.parent().unwrap_or(&self.root);
                let file = tempfile::Builder::new()
                    .prefix(STAGING_PREFIX)
                    .tempfile_in(parent)?;
                Some(Staged { file, position: 0 })
            }
            EntryKind::Directory => {
                fs::create_dir(&target)?;
                None
            }
            EntryKind::Symlink { target: link } => {
                uncia_fs::create_symlink(link, &target)?;
                None
            }
            EntryKind::HardLink { .. } => {
                if let Some(source) = &link_source {
                    fs::hard_link(source, &target)?;
                }
                None
            }
            EntryKind::Fifo => {
                special::make_fifo(&target, header.mode)?;
                None
            }
            EntryKind::CharDevice { major, minor } => {
                special::make_device(&target, header.mode, false, *major, *minor)?;
                None
            }
            EntryKind::BlockDevice { major, minor } => {
                special::make_device(&target, header.mode, true, *major, *minor)?;
                None
            }
        };

        Ok(Some(Pending {
            header: header.clone(),
            target,
            staged,
        }))
    }

    /// Resolve a hard link's archive path to an existing object under the root.
    fn hard_link_source(&self, link: &Path) -> std::result::Result<PathBuf, WriteError> {
        let rel = normalize_entry_path(link, self.flags.contains(WriteFlags::SECURE_NODOTDOT))?;
        if rel.as_os_str().is_empty() {
            return Err(WriteError::EmptyPath);
        }
        if self.flags.contains(WriteFlags::SECURE_SYMLINKS) {
            check_no_symlink_ancestors(&self.root, &rel)?;
        }
        Ok(self.root.join(rel))
    }

    /// Make room for a new object at `target`.
    ///
    /// Returns `false` when an existing directory is reused for a directory
    /// entry. A regular file over a non-directory is left for the atomic
    /// rename in `finish_entry`.
    fn clear_target(&self, target: &Path, header: &EntryHeader) -> std::result::Result<bool, WriteError> {
        let existing = match fs::symlink_metadata(target) {
            Ok(meta) => meta.file_type(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        if existing.is_dir() && header.is_directory() {
            return Ok(false);
        }
        if !self.flags.contains(WriteFlags::UNLINK) {
            return Err(WriteError::AlreadyExists {
                path: target.to_path_buf(),
            });
        }
        if header.is_file() && !existing.is_dir() {
            return Ok(true);
        }
        uncia_fs::unlink_existing(target)?;
        Ok(true)
    }
}

#[cfg(unix)]
mod special {
    use std::path::Path;

    use nix::sys::stat::Mode;

    use crate::error::WriteError;

    fn mode(bits: Option<u32>) -> Mode {
        Mode::from_bits_truncate((bits.unwrap_or(0o644) & 0o777) as nix::libc::mode_t)
    }

    pub(super) fn make_fifo(path: &Path, bits: Option<u32>) -> Result<(), WriteError> {
        nix::unistd::mkfifo(path, mode(bits)).map_err(|e| WriteError::Io(e.into()))
    }

    #[cfg(target_os = "linux")]
    pub(super) fn make_device(
        path: &Path,
        bits: Option<u32>,
        block: bool,
        major: u32,
        minor: u32,
    ) -> Result<(), WriteError> {
        use nix::sys::stat::{SFlag, makedev, mknod};

        let kind = if block { SFlag::S_IFBLK } else { SFlag::S_IFCHR };
        let dev = makedev(u64::from(major), u64::from(minor));
        mknod(path, kind, mode(bits), dev).map_err(|e| WriteError::Io(e.into()))
    }

    #[cfg(not(target_os = "linux"))]
    pub(super) fn make_device(
        _path: &Path,
        _bits: Option<u32>,
        block: bool,
        _major: u32,
        _minor: u32,
    ) -> Result<(), WriteError> {
        Err(WriteError::Unsupported {
            kind: if block { "block device" } else { "character device" },
        })
    }
}

#[cfg(not(unix))]
mod special {
    use std::path::Path;

    use crate::error::WriteError;

    pub(super) fn make_fifo(_path: &Path, _bits: Option<u32>) -> Result<(), WriteError> {
        Err(WriteError::Unsupported { kind: "fifo" })
    }

    pub(super) fn make_device(
        _path: &Path,
        _bits: Option<u32>,
        block: bool,
        _major: u32,
        _minor: u32,
    ) -> Result<(), WriteError> {
        Err(WriteError::Unsupported {
            kind: if block { "block device" } else { "character device" },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_file(writer: &mut DiskWriter, path: &str, content: &[u8]) {
        writer
            .write_header(&EntryHeader::file(path, content.len() as u64))
            .unwrap();
        writer
            .write_block(&DataBlock {
                data: content,
                offset: 0,
            })
            .unwrap();
        writer.finish_entry().unwrap();
    }

    #[test]
    fn writes_file_with_parents() {
        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        write_file(&mut writer, "a/b/c.txt", b"hello");
        writer.close().unwrap();

        assert_eq!(fs::read(dir.path().join("a/b/c.txt")).unwrap(), b"hello");
    }

    #[test]
    fn content_is_invisible_until_finished() {
        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        writer.write_header(&EntryHeader::file("f", 3)).unwrap();
        writer
            .write_block(&DataBlock {
                data: b"abc",
                offset: 0,
            })
            .unwrap();
        assert!(!dir.path().join("f").exists());
        writer.finish_entry().unwrap();
        assert!(dir.path().join("f").exists());
    }

    #[test]
    fn sparse_blocks_leave_zeroed_gaps() {
        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        writer.write_header(&EntryHeader::file("sparse", 8)).unwrap();
        writer
            .write_block(&DataBlock {
                data: b"ab",
                offset: 0,
            })
            .unwrap();
        writer
            .write_block(&DataBlock {
                data: b"yz",
                offset: 6,
            })
            .unwrap();
        writer.close().unwrap();

        assert_eq!(fs::read(dir.path().join("sparse")).unwrap(), b"ab\0\0\0\0yz");
    }

    #[test]
    fn declared_size_extends_file() {
        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        writer.write_header(&EntryHeader::file("hole", 4)).unwrap();
        writer.close().unwrap();
        assert_eq!(fs::read(dir.path().join("hole")).unwrap(), vec![0; 4]);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f"), "old content").unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        write_file(&mut writer, "f", b"new");
        writer.close().unwrap();
        assert_eq!(fs::read(dir.path().join("f")).unwrap(), b"new");
    }

    #[test]
    fn keeps_existing_without_unlink() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f"), "old").unwrap();
        let mut writer =
            DiskWriter::open(dir.path(), WriteFlags::secure() - WriteFlags::UNLINK).unwrap();

        let err = writer.write_header(&EntryHeader::file("f", 3)).unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderWrite {
                source: WriteError::AlreadyExists { .. },
                ..
            }
        ));
        assert_eq!(fs::read(dir.path().join("f")).unwrap(), b"old");
    }

    #[cfg(unix)]
    #[test]
    fn replaced_directory_gets_no_deferred_metadata() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let outside = dir.path().join("victim");
        let root = dir.path().join("out");
        fs::create_dir(&outside).unwrap();
        fs::set_permissions(&outside, fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir(&root).unwrap();

        // Symlink checks off: only the deferred restore stands between the
        // directory's mode and whatever later replaced it.
        let flags = WriteFlags::secure() - WriteFlags::SECURE_SYMLINKS;
        let mut writer = DiskWriter::open(&root, flags).unwrap();
        writer
            .write_header(&EntryHeader::directory("d").with_mode(0o700))
            .unwrap();
        writer
            .write_header(&EntryHeader::symlink("d", "../victim"))
            .unwrap();
        writer.close().unwrap();

        assert!(root.join("d").is_symlink());
        let mode = fs::metadata(&outside).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn directory_reused_and_replaced() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/keep"), "k").unwrap();
        fs::write(dir.path().join("was-file"), "x").unwrap();

        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        writer.write_header(&EntryHeader::directory("d")).unwrap();
        writer.write_header(&EntryHeader::directory("was-file")).unwrap();
        writer.close().unwrap();

        assert!(dir.path().join("d/keep").exists());
        assert!(dir.path().join("was-file").is_dir());
    }

    #[test]
    fn root_must_exist() {
        let dir = tempdir().unwrap();
        let result = DiskWriter::open(dir.path().join("missing"), WriteFlags::secure());
        assert!(matches!(result, Err(Error::Directory { .. })));
    }

    #[test]
    fn rejects_dotdot_and_empty_names() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("out");
        fs::create_dir(&root).unwrap();
        let mut writer = DiskWriter::open(&root, WriteFlags::secure()).unwrap();

        let err = writer
            .write_header(&EntryHeader::file("../escape", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderWrite {
                source: WriteError::PathEscape,
                ..
            }
        ));
        assert!(!dir.path().join("escape").exists());

        let err = writer.write_header(&EntryHeader::file("./", 0)).unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderWrite {
                source: WriteError::EmptyPath,
                ..
            }
        ));
        writer.write_header(&EntryHeader::directory("./")).unwrap();
        writer.close().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn refuses_escaping_symlinks() {
        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();

        let err = writer
            .write_header(&EntryHeader::symlink("link", "/etc/passwd"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderWrite {
                source: WriteError::AbsoluteSymlinkTarget { .. },
                ..
            }
        ));

        let err = writer
            .write_header(&EntryHeader::symlink("a/link", "../../outside"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderWrite {
                source: WriteError::SymlinkEscape { .. },
                ..
            }
        ));

        writer
            .write_header(&EntryHeader::symlink("a/ok", "../a"))
            .unwrap();
        writer.close().unwrap();
        assert!(dir.path().join("a/ok").is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn refuses_writing_through_symlink() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("evil")).unwrap();

        let mut writer = DiskWriter::open(&root, WriteFlags::secure()).unwrap();
        let err = writer
            .write_header(&EntryHeader::file("evil/payload", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HeaderWrite {
                source: WriteError::ThroughSymlink { .. },
                ..
            }
        ));
        assert!(!outside.join("payload").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_replaced_not_followed() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        let victim = dir.path().join("victim");
        fs::write(&victim, "precious").unwrap();
        std::os::unix::fs::symlink(&victim, root.join("f")).unwrap();

        let mut writer = DiskWriter::open(&root, WriteFlags::secure()).unwrap();
        write_file(&mut writer, "f", b"new");
        writer.close().unwrap();

        assert!(!root.join("f").is_symlink());
        assert_eq!(fs::read(root.join("f")).unwrap(), b"new");
        assert_eq!(fs::read(&victim).unwrap(), b"precious");
    }

    #[test]
    fn hard_link_to_earlier_entry() {
        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        write_file(&mut writer, "bin/tool", b"tool");
        let link = EntryHeader::new(
            "bin/alias",
            EntryKind::HardLink {
                target: PathBuf::from("./bin/tool"),
            },
        );
        writer.write_header(&link).unwrap();
        writer.close().unwrap();

        assert_eq!(fs::read(dir.path().join("bin/alias")).unwrap(), b"tool");
    }

    #[cfg(unix)]
    #[test]
    fn fifo_created() {
        use std::os::unix::fs::FileTypeExt;

        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        writer
            .write_header(&EntryHeader::new("pipe", EntryKind::Fifo).with_mode(0o600))
            .unwrap();
        writer.close().unwrap();

        let meta = fs::symlink_metadata(dir.path().join("pipe")).unwrap();
        assert!(meta.file_type().is_fifo());
    }

    #[cfg(unix)]
    #[test]
    fn directory_mode_applied_after_children() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let mut writer = DiskWriter::open(dir.path(), WriteFlags::secure()).unwrap();
        writer
            .write_header(&EntryHeader::directory("ro").with_mode(0o555))
            .unwrap();
        write_file(&mut writer, "ro/inside", b"x");
        writer.close().unwrap();

        let ro = dir.path().join("ro");
        let mode = fs::metadata(&ro).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o555);
        assert!(ro.join("inside").exists());
        fs::set_permissions(&ro, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
