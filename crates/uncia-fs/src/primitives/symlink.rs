use crate::{Error, Result};
use std::path::Path;

/// Create a symbolic link at `link` pointing to `target`.
///
/// `target` is stored verbatim; it is not resolved or checked here.
pub fn create_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let target = target.as_ref();
    let link = link.as_ref();
    let map_err = |e: std::io::Error| Error::Symlink {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    };

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).map_err(map_err)
    }

    #[cfg(windows)]
    {
        // Windows needs to know the kind up front; resolve relative to the link.
        let resolved = link.parent().map(|p| p.join(target));
        let is_dir = resolved.as_deref().is_some_and(Path::is_dir)
            || target.to_string_lossy().ends_with(['/', '\\']);
        if is_dir {
            std::os::windows::fs::symlink_dir(target, link).map_err(map_err)
        } else {
            std::os::windows::fs::symlink_file(target, link).map_err(map_err)
        }
    }
}
