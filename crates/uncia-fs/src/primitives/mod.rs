pub mod replace;
pub mod symlink;

pub use replace::{rename_new, unlink_existing};
pub use symlink::create_symlink;
