//! Interpreter state types

use crate::path;

/// Result of executing a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecResult {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code
    pub exit_code: i32,
    /// New working directory. Only `cd` sets this.
    pub new_path: Option<String>,
    /// Ask the terminal to clear its screen
    pub clear_screen: bool,
}

impl ExecResult {
    /// Create a successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Create a failed result with the given stderr.
    pub fn err(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Self::default()
        }
    }

    /// Successful `cd` to `path`.
    pub fn change_dir(path: impl Into<String>) -> Self {
        Self {
            new_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Check if the result indicates success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Per-session execution context.
///
/// Exactly one lives per terminal session. `current_path` changes only
/// through [`ExecResult::new_path`]; `is_sudo` is raised for one invocation
/// at a time by the sudo flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Working directory, always absolute and normalized
    pub current_path: String,
    /// Learner account name
    pub username: String,
    /// Whether the current invocation runs elevated
    pub is_sudo: bool,
}

impl ExecutionContext {
    /// Fresh context starting in the user's home directory.
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            current_path: path::home_dir(&username),
            username,
            is_sudo: false,
        }
    }

    /// Copy of this context with elevation raised.
    pub fn elevated(&self) -> Self {
        Self {
            is_sudo: true,
            ..self.clone()
        }
    }

    /// Resolve a user-typed path against this context.
    pub fn resolve(&self, target: &str) -> String {
        path::resolve(&self.current_path, target, &self.username)
    }

    /// The identity commands run as.
    pub fn effective_user(&self) -> &str {
        if self.is_sudo { "root" } else { &self.username }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_starts_home() {
        let ctx = ExecutionContext::new("student");
        assert_eq!(ctx.current_path, "/home/student");
        assert!(!ctx.is_sudo);
        assert_eq!(ctx.effective_user(), "student");
        assert_eq!(ctx.elevated().effective_user(), "root");
    }

    #[test]
    fn test_exec_result_constructors() {
        assert!(ExecResult::ok("x").is_success());
        let err = ExecResult::err("boom\n", 2);
        assert_eq!(err.exit_code, 2);
        assert_eq!(ExecResult::change_dir("/tmp").new_path.as_deref(), Some("/tmp"));
    }
}
