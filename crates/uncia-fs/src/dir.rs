use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Create `path` and any missing parents.
///
/// Succeeds when `path` already is a directory; fails when something other
/// than a directory sits there.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(Error::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {}
    }

    fs::create_dir_all(path).map_err(|e| Error::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Create `path` if needed and return its canonical form.
pub fn ensure_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    ensure_dir(path)?;
    resolve_root(path)
}

/// Canonical form of an existing directory.
pub fn resolve_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let canonical = fs::canonicalize(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !canonical.is_dir() {
        return Err(Error::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(canonical)
}

/// Entries directly inside `dir`.
pub(crate) fn list_dir(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let read_err = |e: std::io::Error| Error::Read {
        path: dir.to_path_buf(),
        source: e,
    };
    fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map_err(read_err))
        .collect()
}
