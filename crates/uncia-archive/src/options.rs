use crate::writer::WriteFlags;

/// Read block size used when none is configured.
pub const BLOCK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    pub block_size: usize,
    pub flags: WriteFlags,
    pub flatten: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            flags: WriteFlags::secure(),
            flatten: true,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    pub fn flags(mut self, flags: WriteFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Keep existing files instead of replacing them.
    pub fn keep_existing(mut self) -> Self {
        self.flags.remove(WriteFlags::UNLINK);
        self
    }

    /// Skip restoring times, permissions, ACLs and file flags.
    pub fn no_restore(mut self) -> Self {
        self.flags.remove(WriteFlags::RESTORE);
        self
    }

    /// Whether to lift a single wrapping directory into the destination.
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }
}
