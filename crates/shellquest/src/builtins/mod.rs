//! Built-in shell commands
//!
//! This module provides the [`Builtin`] trait every command implements and
//! the [`Context`] struct it runs with. Handlers never fail for ordinary
//! reasons: filesystem, permission and usage problems become a stderr line
//! and a non-zero exit code. `Err` is reserved for internal faults.

mod cat;
mod echo;
mod fileops;
pub(crate) mod flags;
mod grep;
mod headtail;
mod ls;
mod navigation;
mod system;
mod wc;

pub use cat::Cat;
pub use echo::Echo;
pub use fileops::{Chmod, Chown, Cp, Mkdir, Mv, Rm, Touch};
pub use grep::Grep;
pub use headtail::{Head, Tail};
pub use ls::{Find, Ls, Rmdir};
pub use navigation::{Cd, Pwd};
pub use system::{Clear, Date, Exit, History, Hostname, Whoami};
pub use wc::Wc;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::ShellConfig;
use crate::error::{FsError, FsResult, Result};
use crate::fs::{FileSystem, Metadata};
use crate::interpreter::{ExecResult, ExecutionContext};
use crate::path;

/// Execution context for builtin commands.
pub struct Context<'a> {
    /// Command arguments (not including the command name).
    ///
    /// For `ls -l docs`, this contains `["-l", "docs"]`.
    pub args: &'a [String],

    /// Working directory, user and elevation for this invocation.
    pub exec: &'a ExecutionContext,

    /// Virtual filesystem.
    pub fs: Arc<dyn FileSystem>,

    /// Standard input, from a heredoc or `< file`.
    pub stdin: Option<&'a str>,

    /// Session command history, oldest first.
    pub history: &'a [String],

    /// Session configuration.
    pub config: &'a ShellConfig,
}

impl<'a> Context<'a> {
    /// Resolve a user-typed operand to an absolute path.
    pub fn resolve(&self, target: &str) -> String {
        self.exec.resolve(target)
    }

    /// Denial for reading or listing a root-owned node without sudo.
    pub async fn deny_read(&self, cmd: &str, operand: &str, path: &str) -> Option<ExecResult> {
        if self.exec.is_sudo {
            return None;
        }
        match self.fs.stat(path).await {
            Some(meta) if meta.is_root_owned() => Some(permission_denied(cmd, operand)),
            _ => None,
        }
    }

    /// Read a user-typed file operand as text, or the failure to report.
    pub async fn read_text(
        &self,
        cmd: &str,
        operand: &str,
    ) -> std::result::Result<String, ExecResult> {
        let path = self.resolve(operand);
        if let Some(denied) = self.deny_read(cmd, operand, &path).await {
            return Err(denied);
        }
        match self.fs.read_file(&path).await {
            Ok(content) => Ok(String::from_utf8_lossy(&content).into_owned()),
            Err(e) => Err(fs_failure(cmd, operand, &e)),
        }
    }

    /// Denial for modifying `path` without sudo.
    ///
    /// An existing node is checked itself; a new one is checked against the
    /// nearest existing directory it would be created under.
    pub async fn deny_write(&self, cmd: &str, operand: &str, path: &str) -> Option<ExecResult> {
        if self.exec.is_sudo {
            return None;
        }
        nearest_existing(self.fs.as_ref(), path)
            .await
            .filter(Metadata::is_root_owned)
            .map(|_| permission_denied(cmd, operand))
    }
}

/// Metadata of `path`, or of its nearest existing ancestor.
pub async fn nearest_existing(fs: &dyn FileSystem, path: &str) -> Option<Metadata> {
    let mut current = path.to_string();
    loop {
        if let Some(meta) = fs.stat(&current).await {
            return Some(meta);
        }
        if current == "/" {
            return None;
        }
        current = path::parent_of(&current).to_string();
    }
}

/// The highest node on the way to `path` that does not exist yet.
///
/// Everything a write creates lives at or beneath it.
pub async fn topmost_missing(fs: &dyn FileSystem, path: &str) -> Option<String> {
    let mut missing = None;
    let mut current = path.to_string();
    while current != "/" && !fs.exists(&current).await {
        let parent = path::parent_of(&current).to_string();
        missing = Some(current);
        current = parent;
    }
    missing
}

/// Give the nodes a write created to the user the command ran as.
pub async fn claim_created(
    fs: &dyn FileSystem,
    exec: &ExecutionContext,
    created: Option<&str>,
) -> FsResult<()> {
    match created {
        Some(top) => chown_tree(fs, top, exec.effective_user()).await,
        None => Ok(()),
    }
}

/// Change the owner of `path` and everything beneath it.
pub fn chown_tree<'a>(
    fs: &'a dyn FileSystem,
    path: &'a str,
    owner: &'a str,
) -> Pin<Box<dyn Future<Output = FsResult<()>> + Send + 'a>> {
    Box::pin(async move {
        fs.chown(path, owner).await?;
        if fs.stat(path).await.is_some_and(|m| m.file_type.is_dir()) {
            for entry in fs.read_dir(path).await? {
                let child = path::join(path, &entry.name);
                chown_tree(fs, &child, owner).await?;
            }
        }
        Ok(())
    })
}

/// First root-owned node strictly beneath `path`, depth first.
pub fn root_owned_descendant<'a>(
    fs: &'a dyn FileSystem,
    path: &'a str,
) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
    Box::pin(async move {
        let entries = fs.read_dir(path).await.ok()?;
        for entry in entries {
            let child = path::join(path, &entry.name);
            if entry.metadata.is_root_owned() {
                return Some(child);
            }
            if entry.metadata.file_type.is_dir() {
                if let Some(found) = root_owned_descendant(fs, &child).await {
                    return Some(found);
                }
            }
        }
        None
    })
}

/// `operand` with the part of `descendant` below `base` appended.
pub fn operand_path(operand: &str, base: &str, descendant: &str) -> String {
    let rest = descendant.strip_prefix(base).unwrap_or(descendant);
    format!("{}{}", operand.trim_end_matches('/'), rest)
}

/// `{cmd}: {operand}: Permission denied`, exit 1.
pub fn permission_denied(cmd: &str, operand: &str) -> ExecResult {
    ExecResult::err(format!("{}: {}: Permission denied\n", cmd, operand), 1)
}

/// `{cmd}: {operand}: {error}`, exit 1.
pub fn fs_failure(cmd: &str, operand: &str, err: &FsError) -> ExecResult {
    ExecResult::err(format!("{}: {}: {}\n", cmd, operand, err), 1)
}

/// Trait for implementing builtin commands.
///
/// The trait requires `Send + Sync` so handlers can be shared as
/// `&'static dyn Builtin` from the dispatch table.
///
/// # Return Values
///
/// Return [`ExecResult::ok`] for success with output, or
/// [`ExecResult::err`] for errors with exit code.
#[async_trait]
pub trait Builtin: Send + Sync {
    /// Execute the builtin command.
    ///
    /// # Returns
    ///
    /// * `Ok(ExecResult)` - Execution result with stdout, stderr, and exit code
    /// * `Err(Error)` - Internal fault; the dispatcher reports it as exit 1
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult>;
}
