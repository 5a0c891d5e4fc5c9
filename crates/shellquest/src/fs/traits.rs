//! Filesystem trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FsResult;

/// Mask for the file type bits of a mode.
pub const S_IFMT: u32 = 0o170000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;

/// Default permission bits for new files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default permission bits for new directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Owner name that triggers the sudo permission gate.
pub const ROOT_OWNER: &str = "root";

/// Async filesystem trait.
///
/// This is the narrow interface every command handler depends on. Paths are
/// absolute, already resolved by [`crate::path::resolve`]. `stat` and
/// `exists` never fail; they are the checks callers use before risking a
/// failing call.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's contents.
    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Create or overwrite a file. Fails with `EISDIR` on a directory.
    async fn write_file(&self, path: &str, content: &[u8]) -> FsResult<()>;

    /// Append to a file, creating it if missing.
    async fn append_file(&self, path: &str, content: &[u8]) -> FsResult<()>;

    /// Create a single directory.
    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()>;

    /// Create a directory and every missing ancestor. Idempotent.
    async fn mkdir_tree(&self, path: &str) -> FsResult<()>;

    /// Directory entries in insertion order.
    async fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    /// Remove a file.
    async fn unlink(&self, path: &str) -> FsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &str) -> FsResult<()>;

    /// Remove a file or a whole directory subtree.
    async fn remove_tree(&self, path: &str) -> FsResult<()>;

    /// Move a node, overwriting the destination if present.
    async fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    /// Copy a node. Directories require `recursive`.
    async fn copy(&self, from: &str, to: &str, recursive: bool) -> FsResult<()>;

    /// Node metadata, or `None` if the path does not exist.
    async fn stat(&self, path: &str) -> Option<Metadata>;

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool;

    /// Change permission bits, preserving the type bits.
    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()>;

    /// Change the owning identity.
    async fn chown(&self, path: &str, owner: &str) -> FsResult<()>;

    /// Update the modification time, creating an empty file if missing.
    async fn touch(&self, path: &str) -> FsResult<()>;
}

/// File metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// File type
    pub file_type: FileType,
    /// File size in bytes (0 for directories)
    pub size: u64,
    /// Type bits plus permission bits
    pub mode: u32,
    /// Owning identity
    pub owner: String,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl Metadata {
    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// True for nodes gated behind sudo.
    pub fn is_root_owned(&self) -> bool {
        self.owner == ROOT_OWNER
    }

    /// `ls -l` style mode string, e.g. `drwxr-xr-x`.
    pub fn mode_string(&self) -> String {
        let kind = match self.file_type {
            FileType::Directory => 'd',
            FileType::File => '-',
        };
        format!("{}{}", kind, permission_string(self.mode))
    }
}

/// Render the nine permission bits as `rwxrwxrwx`.
pub fn permission_string(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|(bit, c)| if mode & bit != 0 { *c } else { '-' })
        .collect()
}

/// Parse a nine-character `rwxrwxrwx` string into permission bits.
///
/// Returns `None` for anything that is not exactly nine valid characters.
pub fn parse_permission_string(s: &str) -> Option<u32> {
    if s.len() != 9 {
        return None;
    }
    let mut mode = 0;
    for (i, c) in s.chars().enumerate() {
        let expected = ['r', 'w', 'x'][i % 3];
        mode <<= 1;
        if c == expected {
            mode |= 1;
        } else if c != '-' {
            return None;
        }
    }
    Some(mode)
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Type bits for this kind of node.
    pub fn type_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }
}

/// Directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry metadata
    pub metadata: Metadata,
}
