//! Archive extraction with codec auto-detection and a hardened disk writer.
//!
//! # Architecture
//!
//! - `detect.rs` - magic-byte sniffing over a peekable stream
//! - `format.rs` - filter and container identities, decoder construction
//! - `reader/` - streaming reader session, per-format entry sources
//! - `writer/` - disk writer session, policy flags, metadata restoration
//! - `sanitize.rs` - entry path and symlink policy (zip-slip prevention)
//! - `extract.rs` - the transfer loop tying both sessions together
//! - `suffix.rs` - file-name suffix tables

pub use entry::{Acl, DataBlock, EntryHeader, EntryKind};
pub use error::{Error, Result, WriteError};
pub use extract::{ExtractReport, NoProgress, Progress, extract};
pub use format::{Filter, Format};
pub use options::{BLOCK_SIZE, ExtractOptions};
pub use reader::{ArchiveEntry, ArchiveReader, Entries, MAX_FILTERS};
pub use writer::{DiskWriter, WriteFlags};

mod detect;
pub mod entry;
mod error;
pub mod extract;
mod format;
pub mod options;
pub mod reader;
mod sanitize;
pub mod suffix;
pub mod writer;
