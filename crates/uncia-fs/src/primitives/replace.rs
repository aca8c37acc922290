use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Remove whatever exists at `path` so a new object can take its place.
///
/// Files and symlinks are unlinked (a symlink is never followed). A directory
/// is only removed when it is empty. Returns `Ok(false)` when nothing was there.
pub fn unlink_existing(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let removed = if meta.is_dir() {
        fs::remove_dir(path)
    } else {
        remove_file_or_link(path)
    };
    removed.map_err(|e| Error::Remove {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(true)
}

#[cfg(windows)]
fn remove_file_or_link(path: &Path) -> io::Result<()> {
    // Directory symlinks on Windows must be removed as directories.
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}

#[cfg(not(windows))]
fn remove_file_or_link(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Rename `src` onto `dest`, failing if `dest` is already taken.
pub fn rename_new(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if fs::symlink_metadata(dest).is_ok() {
        return Err(Error::AlreadyExists {
            path: dest.to_path_buf(),
        });
    }

    fs::rename(src, dest).map_err(|e| Error::Rename {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    })
}
