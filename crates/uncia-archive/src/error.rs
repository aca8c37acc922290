use std::io;
use std::path::PathBuf;

/// Why an entry could not be materialized on disk.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("path contains a '..' component")]
    PathEscape,

    #[error("empty path name")]
    EmptyPath,

    #[error("cannot extract through symlink '{link}'")]
    ThroughSymlink { link: PathBuf },

    #[error("symlink target '{target}' escapes the output directory")]
    SymlinkEscape { target: PathBuf },

    #[error("symlink target '{target}' is an absolute path")]
    AbsoluteSymlinkTarget { target: PathBuf },

    #[error("'{path}' already exists")]
    AlreadyExists { path: PathBuf },

    #[error("unsupported entry type: {kind}")]
    Unsupported { kind: &'static str },

    #[error(transparent)]
    Fs(#[from] uncia_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to prepare output directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        source: uncia_fs::Error,
    },

    #[error("failed to open archive '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("failed to read entry header: {reason}")]
    Header { reason: String },

    #[error("failed to extract '{path}': {source}")]
    HeaderWrite { path: PathBuf, source: WriteError },

    #[error("failed to read data of '{path}': {source}")]
    BlockRead { path: PathBuf, source: io::Error },

    #[error("failed to write data of '{path}': {source}")]
    BlockWrite { path: PathBuf, source: io::Error },

    #[error("failed to flatten '{path}': {source}")]
    Flatten {
        path: PathBuf,
        source: uncia_fs::Error,
    },
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn header(reason: impl ToString) -> Self {
        Self::Header {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn header_write(path: impl Into<PathBuf>, source: impl Into<WriteError>) -> Self {
        Self::HeaderWrite {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Whether this error aborts an extraction. Only flattening is best effort.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Flatten { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
