use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("'{path}' exists and is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to rename '{from}' to '{to}': {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to remove '{path}': {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to create symlink '{link}' -> '{target}': {source}")]
    Symlink {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error("'{path}' already exists")]
    AlreadyExists { path: PathBuf },
}

impl Error {
    /// The I/O error kind behind this error, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::CreateDir { source, .. }
            | Self::Read { source, .. }
            | Self::Rename { source, .. }
            | Self::Remove { source, .. }
            | Self::Symlink { source, .. } => Some(source.kind()),
            Self::NotADirectory { .. } | Self::AlreadyExists { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
