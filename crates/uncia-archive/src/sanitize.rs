//! Entry path policy (zip-slip prevention).

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::WriteError;

/// Make an archive path relative to the output root.
///
/// Root, drive prefix and `.` components are dropped. With `reject_dotdot`
/// any `..` is a [`WriteError::PathEscape`]; otherwise it is kept verbatim.
/// The result may be empty, which names the root itself.
pub(crate) fn normalize_entry_path(path: &Path, reject_dotdot: bool) -> Result<PathBuf, WriteError> {
    let mut normalized = PathBuf::with_capacity(path.as_os_str().len());
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir if reject_dotdot => return Err(WriteError::PathEscape),
            Component::ParentDir => normalized.push(".."),
            Component::Normal(part) => normalized.push(part),
        }
    }
    Ok(normalized)
}

/// Symlinks followed while resolving one link target.
const MAX_SYMLINK_HOPS: usize = 40;

enum Step {
    Up,
    Down(OsString),
}

/// Check that a symlink at `link` (relative to `root`) pointing at `target`
/// resolves inside the root.
///
/// `..` is only accepted as a leading component: `a/link -> ../b` is fine,
/// `link -> s/..` is not, since `s` may be a symlink now or become one later.
/// The target is then walked against the tree on disk, following symlinks
/// already extracted (or present before extraction) component by component.
pub(crate) fn check_symlink_target(root: &Path, link: &Path, target: &Path) -> Result<(), WriteError> {
    let escape = || WriteError::SymlinkEscape {
        target: target.to_path_buf(),
    };

    let mut seen_name = false;
    for component in target.components() {
        match component {
            Component::Prefix(..) | Component::RootDir => {
                return Err(WriteError::AbsoluteSymlinkTarget {
                    target: target.to_path_buf(),
                });
            }
            Component::ParentDir if seen_name => return Err(escape()),
            Component::Normal(_) => seen_name = true,
            Component::ParentDir | Component::CurDir => {}
        }
    }

    let mut pending = Vec::new();
    push_steps(&mut pending, target).ok_or_else(escape)?;
    if let Some(parent) = link.parent() {
        push_steps(&mut pending, parent).ok_or_else(escape)?;
    }

    let mut resolved: Vec<OsString> = Vec::new();
    let mut hops = 0;
    while let Some(step) = pending.pop() {
        let name = match step {
            Step::Up => {
                resolved.pop().ok_or_else(escape)?;
                continue;
            }
            Step::Down(name) => name,
        };
        resolved.push(name);

        let on_disk: PathBuf = root.join(resolved.iter().collect::<PathBuf>());
        match fs::symlink_metadata(&on_disk) {
            Ok(meta) if meta.file_type().is_symlink() => {}
            // Missing or not a symlink: the rest resolves lexically.
            _ => continue,
        }
        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return Err(escape());
        }
        let next = fs::read_link(&on_disk)?;
        resolved.pop();
        push_steps(&mut pending, &next).ok_or_else(escape)?;
    }
    Ok(())
}

/// Queue the components of a relative `path` so they pop off in order.
/// `None` for an absolute path.
fn push_steps(pending: &mut Vec<Step>, path: &Path) -> Option<()> {
    let mut steps = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir => return None,
            Component::CurDir => {}
            Component::ParentDir => steps.push(Step::Up),
            Component::Normal(name) => steps.push(Step::Down(name.to_os_string())),
        }
    }
    pending.extend(steps.into_iter().rev());
    Some(())
}

/// Refuse `rel` if any existing ancestor below `root` is a symlink.
///
/// The final component may itself be a symlink; it is replaced, not followed.
pub(crate) fn check_no_symlink_ancestors(root: &Path, rel: &Path) -> Result<(), WriteError> {
    let Some(parent) = rel.parent() else {
        return Ok(());
    };
    let mut current = root.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(WriteError::ThroughSymlink {
                    link: current.strip_prefix(root).unwrap_or(&current).to_path_buf(),
                });
            }
            Ok(_) => {}
            // Nothing below a missing directory can exist yet.
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(WriteError::Io(e)),
        }
    }
    Ok(())
}
