//! Redirection and heredoc execution
//!
//! The parser separates `>`, `>>`, `<` and `<<MARK` from the command; this
//! module moves the data. Input is read before the command runs, output is
//! written after, and the terminal shows a one-line notice instead of the
//! redirected text.

use crate::builtins::{claim_created, nearest_existing, topmost_missing};
use crate::config::SessionLimits;
use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::interpreter::{ExecResult, ExecutionContext};
use crate::parser::{HeredocSpec, OutputTarget, expand_vars};
use crate::path;

/// Read the file named by `< file` as the command's stdin.
pub async fn read_input(
    fs: &dyn FileSystem,
    exec: &ExecutionContext,
    file: &str,
) -> Result<String, ExecResult> {
    let resolved = exec.resolve(file);
    if !exec.is_sudo && fs.stat(&resolved).await.is_some_and(|m| m.is_root_owned()) {
        return Err(shell_error(file, "Permission denied"));
    }
    match fs.read_file(&resolved).await {
        Ok(content) => Ok(String::from_utf8_lossy(&content).into_owned()),
        Err(e) => Err(shell_error(file, &e.to_string())),
    }
}

/// Land `stdout` in the redirection target.
///
/// Missing parent directories are created. Appending to a file that does not
/// end in a newline inserts one first so the new output starts on its own
/// line. Returns the confirmation notice for the terminal.
pub async fn write_output(
    fs: &dyn FileSystem,
    exec: &ExecutionContext,
    target: &OutputTarget,
    stdout: &str,
    limits: &SessionLimits,
) -> Result<String, ExecResult> {
    let resolved = exec.resolve(&target.path);
    if !exec.is_sudo
        && nearest_existing(fs, &resolved)
            .await
            .is_some_and(|m| m.is_root_owned())
    {
        return Err(shell_error(&target.path, "Permission denied"));
    }

    let missing = topmost_missing(fs, &resolved).await;
    let landed = match land(fs, &resolved, target.append, stdout, limits).await {
        Ok(()) => claim_created(fs, exec, missing.as_deref()).await,
        Err(e) => Err(e),
    };
    match landed {
        Ok(()) => {
            let verb = if target.append { "appended" } else { "written" };
            Ok(format!("Output {} to {}", verb, target.path))
        }
        Err(e) => Err(shell_error(&target.path, &e.to_string())),
    }
}

async fn land(
    fs: &dyn FileSystem,
    resolved: &str,
    append: bool,
    stdout: &str,
    limits: &SessionLimits,
) -> FsResult<()> {
    if fs.stat(resolved).await.is_some_and(|m| m.file_type.is_dir()) {
        return Err(FsError::IsADirectory(resolved.to_string()));
    }
    if !append {
        check_size(resolved, stdout.len(), limits)?;
        fs.mkdir_tree(path::parent_of(resolved)).await?;
        return fs.write_file(resolved, stdout.as_bytes()).await;
    }
    fs.mkdir_tree(path::parent_of(resolved)).await?;

    let existing = match fs.read_file(resolved).await {
        Ok(content) => content,
        Err(FsError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e),
    };
    let mut addition = Vec::with_capacity(stdout.len() + 1);
    if existing.last().is_some_and(|b| *b != b'\n') {
        addition.push(b'\n');
    }
    addition.extend_from_slice(stdout.as_bytes());
    check_size(resolved, existing.len() + addition.len(), limits)?;
    fs.append_file(resolved, &addition).await
}

fn check_size(path: &str, size: usize, limits: &SessionLimits) -> Result<(), FsError> {
    if size > limits.max_write_bytes {
        return Err(FsError::TooLarge(path.to_string()));
    }
    Ok(())
}

/// Assemble a collected heredoc body.
///
/// Lines are joined with newlines and end with one. `<<-` strips leading
/// tabs; an unquoted marker expands `$NAME`.
pub fn heredoc_body(
    lines: &[String],
    spec: &HeredocSpec,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> String {
    let mut body = String::new();
    for line in lines {
        let line = if spec.strip_tabs {
            line.trim_start_matches('\t')
        } else {
            line.as_str()
        };
        if spec.expand {
            body.push_str(&expand_vars(line, lookup));
        } else {
            body.push_str(line);
        }
        body.push('\n');
    }
    body
}

/// `bash: {operand}: {message}`, exit 1.
pub fn shell_error(operand: &str, message: &str) -> ExecResult {
    ExecResult::err(format!("bash: {}: {}\n", operand, message), 1)
}
