//! Virtual filesystem for Shellquest
//!
//! Provides an async filesystem trait and implementations:
//! - `InMemoryFs`: the single in-memory tree every session runs against
//! - `RemappedFs`: a subtree of another filesystem presented as `/`

mod memory;
mod remap;
mod traits;

pub use memory::InMemoryFs;
pub use remap::RemappedFs;
pub use traits::{
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DirEntry, FileSystem, FileType, Metadata, ROOT_OWNER,
    S_IFDIR, S_IFMT, S_IFREG, parse_permission_string, permission_string,
};
