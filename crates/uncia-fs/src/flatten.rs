//! Layout normalization after extraction.
//!
//! Archives frequently wrap their whole payload in one directory
//! (`tool-1.2.3/bin/...`). Flattening promotes the innermost single-directory
//! chain so the payload lands directly in the destination.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dir::{ensure_dir, list_dir};
use crate::primitives::rename_new;
use crate::{Error, Result};

/// Upper bound on nested wrapper directories followed by [`flatten`].
pub const MAX_FLATTEN_DEPTH: usize = 20;

const STAGING_PREFIX: &str = ".uncia-flatten-";

/// Move the content of `src` into `dest`, dropping redundant wrapper directories.
///
/// A wrapper is a directory that is the only entry of its parent. Symlinks to
/// directories are not wrappers. Returns `Ok(true)` when anything moved.
///
/// With `src == dest` and no wrapper the tree is left untouched.
pub fn flatten(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<bool> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    ensure_dir(dest)?;

    let chain = wrapper_chain(src)?;
    if chain.is_empty() && same_path(src, dest) {
        tracing::debug!("nothing to flatten in {}", src.display());
        return Ok(false);
    }

    // Park the outer wrapper first so children named like it cannot collide.
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(dest)
        .map_err(|e| Error::CreateDir {
            path: dest.to_path_buf(),
            source: e,
        })?
        .keep();

    let content = match chain.split_first() {
        Some((outer, inner)) => {
            let parked = staging.join("wrapper");
            rename_new(src.join(outer), &parked)?;
            inner.iter().fold(parked, |dir, name| dir.join(name))
        }
        None => src.to_path_buf(),
    };

    tracing::debug!(
        "flattening {} ({} wrapper(s)) into {}",
        src.display(),
        chain.len(),
        dest.display()
    );

    for entry in list_dir(&content)? {
        rename_new(entry.path(), dest.join(entry.file_name()))?;
    }

    fs::remove_dir_all(&staging).map_err(|e| Error::Remove {
        path: staging,
        source: e,
    })?;
    Ok(true)
}

/// Names of the nested single-child directories below `src`, outermost first.
fn wrapper_chain(src: &Path) -> Result<Vec<OsString>> {
    let mut chain = Vec::new();
    let mut current = src.to_path_buf();

    while chain.len() < MAX_FLATTEN_DEPTH {
        let entries = list_dir(&current)?;
        let [only] = entries.as_slice() else {
            break;
        };
        let file_type = only.file_type().map_err(|e| Error::Read {
            path: only.path(),
            source: e,
        })?;
        if !file_type.is_dir() || list_dir(&only.path())?.is_empty() {
            break;
        }
        current.push(only.file_name());
        chain.push(only.file_name());
    }

    Ok(chain)
}

fn same_path(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| fs::canonicalize(p).unwrap_or_else(|_| PathBuf::from(p));
    canonical(a) == canonical(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn chain_stops_at_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/file"), "x").unwrap();

        let chain = wrapper_chain(dir.path()).unwrap();
        assert_eq!(chain, vec![OsString::from("a"), OsString::from("b")]);
    }

    #[test]
    fn chain_empty_for_multiple_entries() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b"), "x").unwrap();

        assert!(wrapper_chain(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn flatten_in_place() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg-1.0/bin")).unwrap();
        fs::write(root.join("pkg-1.0/bin/tool"), "tool").unwrap();
        fs::write(root.join("pkg-1.0/README"), "readme").unwrap();

        assert!(flatten(root, root).unwrap());
        assert_eq!(names(root), vec!["README", "bin"]);
        assert_eq!(fs::read_to_string(root.join("bin/tool")).unwrap(), "tool");
    }

    #[test]
    fn flatten_wrapper_containing_same_name() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/app")).unwrap();
        fs::write(root.join("app/app/main"), "main").unwrap();
        fs::write(root.join("app/LICENSE"), "license").unwrap();

        assert!(flatten(root, root).unwrap());
        assert_eq!(names(root), vec!["LICENSE", "app"]);
        assert_eq!(fs::read_to_string(root.join("app/main")).unwrap(), "main");
    }

    #[test]
    fn flatten_leaves_flat_tree_alone() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("bin")).unwrap();
        fs::write(root.join("README"), "readme").unwrap();

        assert!(!flatten(root, root).unwrap());
        assert_eq!(names(root), vec!["README", "bin"]);
    }

    #[test]
    fn flatten_into_other_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::create_dir_all(src.join("only/lib")).unwrap();
        fs::write(src.join("only/lib/a.so"), "so").unwrap();
        fs::write(src.join("only/VERSION"), "1").unwrap();

        assert!(flatten(&src, &dest).unwrap());
        assert_eq!(names(&dest), vec!["VERSION", "lib"]);
    }
}
