//! Best-effort restoration of entry metadata.
//!
//! Order matters: permissions, ACLs, timestamps, then attribute flags, since
//! an immutable flag would block everything after it.

use std::fs;
use std::io;
use std::path::Path;

use crate::entry::{EntryHeader, EntryKind};
use crate::writer::WriteFlags;

/// Mode bits restored from an archive. Set-id bits are dropped because
/// ownership is not restored.
const MODE_MASK: u32 = 0o1777;

pub(crate) fn restore(path: &Path, header: &EntryHeader, flags: WriteFlags) {
    let is_symlink = matches!(header.kind, EntryKind::Symlink { .. });

    if !is_symlink {
        report(path, "permissions", set_mode(path, header, flags));
    }
    if flags.contains(WriteFlags::ACL) && !is_symlink && !header.acl.is_empty() {
        report(path, "ACL", acl::apply(path, header));
    }
    if flags.contains(WriteFlags::TIME)
        && let Some(mtime) = header.mtime
    {
        let atime = header.atime.unwrap_or(mtime);
        let result = if is_symlink {
            filetime::set_symlink_file_times(path, atime, mtime)
        } else {
            filetime::set_file_times(path, atime, mtime)
        };
        report(path, "timestamps", result);
    }
    if flags.contains(WriteFlags::FFLAGS)
        && matches!(header.kind, EntryKind::File | EntryKind::Directory)
        && let Some(text) = header.fflags.as_deref()
    {
        report(path, "file flags", fflags::apply(path, text));
    }
}

/// Without `PERM` files still get conventional bits: executable entries
/// stay executable.
#[cfg(unix)]
fn set_mode(path: &Path, header: &EntryHeader, flags: WriteFlags) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match header.mode {
        Some(mode) if flags.contains(WriteFlags::PERM) => mode & MODE_MASK,
        _ if header.is_directory() => 0o755,
        Some(mode) if mode & 0o111 != 0 => 0o755,
        _ => 0o644,
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, header: &EntryHeader, flags: WriteFlags) -> io::Result<()> {
    // Only the write bit maps onto a read-only attribute.
    match header.mode {
        Some(mode) if flags.contains(WriteFlags::PERM) && mode & 0o222 == 0 => {
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_readonly(true);
            fs::set_permissions(path, permissions)
        }
        _ => Ok(()),
    }
}

fn report(path: &Path, what: &str, result: io::Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if is_unsupported(&e) => {
            tracing::debug!("{}: {what} not supported here: {e}", path.display());
        }
        Err(e) => tracing::warn!("{}: cannot restore {what}: {e}", path.display()),
    }
}

fn is_unsupported(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Unsupported || is_unsupported_errno(err)
}

#[cfg(unix)]
fn is_unsupported_errno(err: &io::Error) -> bool {
    use nix::libc;

    matches!(
        err.raw_os_error(),
        Some(libc::EOPNOTSUPP | libc::ENOTTY | libc::ENOSYS)
    )
}

#[cfg(not(unix))]
fn is_unsupported_errno(_err: &io::Error) -> bool {
    false
}

#[cfg(target_os = "linux")]
mod acl {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    use nix::libc;
    use nix::unistd::{Group, User};

    use crate::entry::EntryHeader;

    const XATTR_VERSION: u32 = 2;

    const TAG_USER_OBJ: u16 = 0x01;
    const TAG_USER: u16 = 0x02;
    const TAG_GROUP_OBJ: u16 = 0x04;
    const TAG_GROUP: u16 = 0x08;
    const TAG_MASK: u16 = 0x10;
    const TAG_OTHER: u16 = 0x20;

    const UNDEFINED_ID: u32 = u32::MAX;

    pub(super) fn apply(path: &Path, header: &EntryHeader) -> io::Result<()> {
        if let Some(text) = header.acl.access.as_deref() {
            set_xattr(path, "system.posix_acl_access", &encode(text)?)?;
        }
        if header.is_directory()
            && let Some(text) = header.acl.default.as_deref()
        {
            set_xattr(path, "system.posix_acl_default", &encode(text)?)?;
        }
        Ok(())
    }

    /// Encode a long-form text ACL (`user::rwx,user:alice:r-x:1000,...`) as
    /// the kernel's `posix_acl_xattr` blob. Entries are sorted the way the
    /// kernel validates them.
    pub(super) fn encode(text: &str) -> io::Result<Vec<u8>> {
        let mut entries = Vec::new();
        for item in text.split([',', '\n']).map(str::trim).filter(|s| !s.is_empty()) {
            entries.push(parse_entry(item)?);
        }
        entries.sort_unstable();

        let mut blob = Vec::with_capacity(4 + entries.len() * 8);
        blob.extend_from_slice(&XATTR_VERSION.to_le_bytes());
        for (tag, id, perm) in entries {
            blob.extend_from_slice(&tag.to_le_bytes());
            blob.extend_from_slice(&perm.to_le_bytes());
            blob.extend_from_slice(&id.to_le_bytes());
        }
        Ok(blob)
    }

    fn parse_entry(item: &str) -> io::Result<(u16, u32, u16)> {
        let invalid = || io::Error::new(io::ErrorKind::InvalidData, format!("bad ACL entry '{item}'"));
        let fields: Vec<&str> = item.split(':').collect();
        let (tag, qualifier, perms, numeric) = match fields.as_slice() {
            [tag, qualifier, perms] => (*tag, *qualifier, *perms, None),
            [tag, qualifier, perms, id] => (*tag, *qualifier, *perms, Some(*id)),
            _ => return Err(invalid()),
        };
        let perm = parse_perms(perms).ok_or_else(invalid)?;

        let (tag, id) = match (tag, qualifier.is_empty()) {
            ("user" | "u", true) => (TAG_USER_OBJ, UNDEFINED_ID),
            ("group" | "g", true) => (TAG_GROUP_OBJ, UNDEFINED_ID),
            ("mask" | "m", _) => (TAG_MASK, UNDEFINED_ID),
            ("other" | "o", _) => (TAG_OTHER, UNDEFINED_ID),
            ("user" | "u", false) => (TAG_USER, resolve(qualifier, numeric, true).ok_or_else(invalid)?),
            ("group" | "g", false) => (TAG_GROUP, resolve(qualifier, numeric, false).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        Ok((tag, id, perm))
    }

    /// The trailing numeric id wins; otherwise the qualifier is an id or a
    /// name looked up locally.
    fn resolve(qualifier: &str, numeric: Option<&str>, user: bool) -> Option<u32> {
        if let Some(id) = numeric.and_then(|id| id.parse().ok()) {
            return Some(id);
        }
        if let Ok(id) = qualifier.parse() {
            return Some(id);
        }
        if user {
            User::from_name(qualifier).ok().flatten().map(|u| u.uid.as_raw())
        } else {
            Group::from_name(qualifier).ok().flatten().map(|g| g.gid.as_raw())
        }
    }

    fn parse_perms(perms: &str) -> Option<u16> {
        let bytes = perms.as_bytes();
        if bytes.len() != 3 {
            return None;
        }
        let bit = |c: u8, set: u8, value: u16| match c {
            b'-' => Some(0),
            c if c == set => Some(value),
            _ => None,
        };
        Some(bit(bytes[0], b'r', 4)? | bit(bytes[1], b'w', 2)? | bit(bytes[2], b'x', 1)?)
    }

    fn set_xattr(path: &Path, name: &str, value: &[u8]) -> io::Result<()> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(io::Error::other)?;
        let c_name = CString::new(name).map_err(io::Error::other)?;
        // SAFETY: both strings are NUL-terminated and `value` outlives the call.
        let rc = unsafe {
            libc::setxattr(
                c_path.as_ptr(),
                c_name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                0,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod acl {
    use std::io;
    use std::path::Path;

    use crate::entry::EntryHeader;

    pub(super) fn apply(_path: &Path, _header: &EntryHeader) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "ACL restoration is only implemented on Linux",
        ))
    }
}

#[cfg(target_os = "linux")]
mod fflags {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;
    use std::path::Path;

    use nix::libc;

    nix::ioctl_read!(fs_ioc_getflags, b'f', 1, libc::c_long);
    nix::ioctl_write_ptr!(fs_ioc_setflags, b'f', 2, libc::c_long);

    /// BSD flag names and their Linux inode flag equivalents.
    static NAMES: &[(&str, libc::c_long)] = &[
        ("sappnd", 0x0000_0020),
        ("uappnd", 0x0000_0020),
        ("appnd", 0x0000_0020),
        ("schg", 0x0000_0010),
        ("uchg", 0x0000_0010),
        ("immutable", 0x0000_0010),
        ("nodump", 0x0000_0040),
        ("noatime", 0x0000_0080),
        ("sync", 0x0000_0008),
        ("dirsync", 0x0001_0000),
        ("compress", 0x0000_0004),
        ("notail", 0x0000_8000),
        ("journal-data", 0x0000_4000),
        ("nocow", 0x0080_0000),
        ("projinherit", 0x2000_0000),
    ];

    /// Split a flag list into bits to set and bits to clear (`no` prefixed).
    /// Unknown names are ignored.
    pub(super) fn parse(text: &str) -> (libc::c_long, libc::c_long) {
        let mut set = 0;
        let mut clear = 0;
        for name in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(bits) = lookup(name) {
                set |= bits;
            } else if let Some(bits) = name.strip_prefix("no").and_then(lookup) {
                clear |= bits;
            }
        }
        (set, clear)
    }

    fn lookup(name: &str) -> Option<libc::c_long> {
        NAMES.iter().find(|(n, _)| *n == name).map(|(_, bits)| *bits)
    }

    pub(super) fn apply(path: &Path, text: &str) -> io::Result<()> {
        let (set, clear) = parse(text);
        if set == 0 && clear == 0 {
            return Ok(());
        }
        let file = File::open(path)?;
        let fd = file.as_raw_fd();
        let mut current: libc::c_long = 0;
        // SAFETY: `fd` is open for the duration of both calls and the
        // pointers refer to live stack values.
        unsafe { fs_ioc_getflags(fd, &mut current) }.map_err(io::Error::from)?;
        let wanted = (current | set) & !clear;
        if wanted != current {
            unsafe { fs_ioc_setflags(fd, &wanted) }.map_err(io::Error::from)?;
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod fflags {
    use std::io;
    use std::path::Path;

    pub(super) fn apply(_path: &Path, _text: &str) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file flags are only restored on Linux",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn restores_mode_without_setid() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("tool");
        fs::write(&path, "x").unwrap();

        let header = EntryHeader::file("tool", 1).with_mode(0o4755);
        restore(&path, &header, WriteFlags::secure());
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn conventional_mode_without_perm_flag() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, "x").unwrap();

        let header = EntryHeader::file("data", 1).with_mode(0o600);
        restore(&path, &header, WriteFlags::secure() - WriteFlags::PERM);
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn restores_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old");
        fs::write(&path, "x").unwrap();

        let mtime = FileTime::from_unix_time(1_000_000_000, 0);
        let header = EntryHeader::file("old", 1).with_mtime(mtime);
        restore(&path, &header, WriteFlags::secure());

        let meta = fs::metadata(&path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), mtime);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn acl_text_encoding() {
        let blob = acl::encode("other::r--,user::rw-,group::r--,user:1000:rwx,mask::rwx").unwrap();
        assert_eq!(&blob[..4], &2u32.to_le_bytes());
        assert_eq!(blob.len(), 4 + 5 * 8);
        // USER_OBJ first, OTHER last.
        assert_eq!(u16::from_le_bytes([blob[4], blob[5]]), 0x01);
        assert_eq!(u16::from_le_bytes([blob[6], blob[7]]), 6);
        assert_eq!(u16::from_le_bytes([blob[12], blob[13]]), 0x02);
        assert_eq!(u32::from_le_bytes([blob[16], blob[17], blob[18], blob[19]]), 1000);
        assert_eq!(u16::from_le_bytes([blob[36], blob[37]]), 0x20);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn acl_star_form_uses_numeric_id() {
        let blob = acl::encode("user::rwx,user:nobody-here:r-x:4242,group::---,other::---").unwrap();
        assert_eq!(u32::from_le_bytes([blob[16], blob[17], blob[18], blob[19]]), 4242);
        assert!(acl::encode("user::rwz").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn fflag_names() {
        assert_eq!(fflags::parse("nodump,uappnd"), (0x40 | 0x20, 0));
        assert_eq!(fflags::parse("nonodump"), (0, 0x40));
        assert_eq!(fflags::parse("hidden"), (0, 0));
    }
}
