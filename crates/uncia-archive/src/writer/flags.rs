use bitflags::bitflags;

bitflags! {
    /// Policy applied by [`DiskWriter`](super::DiskWriter) to every entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WriteFlags: u32 {
        /// Refuse entry paths containing `..`.
        const SECURE_NODOTDOT = 1 << 0;
        /// Refuse to write through symlinks and to create escaping symlinks.
        const SECURE_SYMLINKS = 1 << 1;
        /// Replace existing non-directory objects.
        const UNLINK = 1 << 2;
        /// Restore access and modification times.
        const TIME = 1 << 3;
        /// Restore permission bits.
        const PERM = 1 << 4;
        /// Restore POSIX ACLs.
        const ACL = 1 << 5;
        /// Restore file attribute flags.
        const FFLAGS = 1 << 6;

        const SECURE = Self::SECURE_NODOTDOT.bits() | Self::SECURE_SYMLINKS.bits();
        const RESTORE = Self::TIME.bits() | Self::PERM.bits() | Self::ACL.bits() | Self::FFLAGS.bits();
    }
}

impl WriteFlags {
    /// The extraction default: every safety check, overwrite, full restore.
    pub fn secure() -> Self {
        Self::all()
    }
}

impl Default for WriteFlags {
    fn default() -> Self {
        Self::secure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_is_everything() {
        let flags = WriteFlags::secure();
        assert!(flags.contains(WriteFlags::SECURE | WriteFlags::RESTORE | WriteFlags::UNLINK));
    }

    #[test]
    fn dropping_restore_keeps_safety() {
        let flags = WriteFlags::secure() - WriteFlags::RESTORE;
        assert!(flags.contains(WriteFlags::SECURE_NODOTDOT));
        assert!(!flags.intersects(WriteFlags::TIME | WriteFlags::PERM));
    }
}
