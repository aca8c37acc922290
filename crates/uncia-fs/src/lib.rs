//! Filesystem primitives used by the extraction engine.
//!
//! - `dir.rs` - output directory setup
//! - `primitives/` - unlink-and-replace, collision-free rename, symlinks
//! - `flatten.rs` - post-extraction layout normalization

mod dir;
mod error;
pub mod flatten;
pub mod primitives;

pub use dir::{ensure_dir, ensure_root, resolve_root};
pub use error::{Error, Result};
pub use flatten::{MAX_FLATTEN_DEPTH, flatten};
pub use primitives::{create_symlink, rename_new, unlink_existing};
