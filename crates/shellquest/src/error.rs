//! Error types for Shellquest
//!
//! Two layers:
//! - [`FsError`]: the POSIX-style failures of the virtual filesystem. Builtins
//!   turn these into a stderr line and a non-zero exit code, they never escape
//!   a command.
//! - [`Error`]: everything else (adventure loading, persistence, internal
//!   faults). Nothing here is fatal to a running session.

use thiserror::Error;

/// Result type alias using Shellquest's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Virtual filesystem errors.
///
/// Each variant carries the offending path for logging, but `Display` renders
/// only the POSIX phrase so the message is safe to put after a user-typed
/// operand (`cat: notes.txt: No such file or directory`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("No such file or directory")]
    NotFound(String),

    #[error("Not a directory")]
    NotADirectory(String),

    #[error("Is a directory")]
    IsADirectory(String),

    #[error("File exists")]
    AlreadyExists(String),

    #[error("Directory not empty")]
    NotEmpty(String),

    /// Operations the tree cannot express, such as moving a directory into
    /// its own subtree or removing the root.
    #[error("Invalid argument")]
    InvalidArgument(String),

    #[error("File too large")]
    TooLarge(String),
}

impl FsError {
    /// The errno mnemonic for this error.
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "ENOENT",
            FsError::NotADirectory(_) => "ENOTDIR",
            FsError::IsADirectory(_) => "EISDIR",
            FsError::AlreadyExists(_) => "EEXIST",
            FsError::NotEmpty(_) => "ENOTEMPTY",
            FsError::InvalidArgument(_) => "EINVAL",
            FsError::TooLarge(_) => "EFBIG",
        }
    }

    /// Path the operation failed on.
    pub fn path(&self) -> &str {
        match self {
            FsError::NotFound(p)
            | FsError::NotADirectory(p)
            | FsError::IsADirectory(p)
            | FsError::AlreadyExists(p)
            | FsError::NotEmpty(p)
            | FsError::InvalidArgument(p)
            | FsError::TooLarge(p) => p,
        }
    }
}

/// Shellquest error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure outside a command handler (e.g. while building the
    /// initial tree of an adventure).
    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Malformed command line (unterminated redirection and similar).
    #[error("parse error: {0}")]
    Parse(String),

    /// Adventure definition is structurally invalid.
    #[error("invalid adventure: {0}")]
    Adventure(String),

    /// A validator name or its parameters could not be understood.
    #[error("invalid validator: {0}")]
    Validation(String),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error from a persistence collaborator.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure. The message never contains file contents.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_display_hides_path() {
        let err = FsError::NotFound("/home/student/secret".to_string());
        assert_eq!(err.to_string(), "No such file or directory");
        assert_eq!(err.path(), "/home/student/secret");
        assert_eq!(err.code(), "ENOENT");
    }

    #[test]
    fn test_fs_error_converts_into_error() {
        let err: Error = FsError::NotEmpty("/tmp".to_string()).into();
        assert_eq!(err.to_string(), "filesystem error: Directory not empty");
    }
}
