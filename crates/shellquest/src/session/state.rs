//! Session state
//!
//! Cross-command memory owned by the interceptor. The input modes are one
//! tagged value, so a pending heredoc, password prompt and open modal can
//! never be active at the same time.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ShellConfig;
use crate::fs::RemappedFs;
use crate::guard::DestructiveWarning;
use crate::interpreter::ExecutionContext;
use crate::parser::CommandLine;

/// Where the next submitted line goes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InputMode {
    /// Ordinary command lines.
    #[default]
    Normal,
    /// Collecting a heredoc body.
    Heredoc(PendingHeredoc),
    /// The next line is the sudo password.
    Password(PendingCommand),
    /// An editor or pager is open; only a [`Resolution`] continues.
    AwaitingModal(PendingModal),
    /// A destructive command waits for confirmation.
    ConfirmDestructive(PendingConfirm),
}

impl InputMode {
    /// Short name for messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            InputMode::Normal => "normal",
            InputMode::Heredoc(_) => "heredoc",
            InputMode::Password(_) => "password",
            InputMode::AwaitingModal(modal) => match modal.intent {
                Intent::OpenEditor { .. } => "editor",
                Intent::OpenPager { .. } => "pager",
                Intent::OpenRemote { .. } => "remote",
                Intent::ConfirmDestructive { .. } => "confirmation",
            },
            InputMode::ConfirmDestructive(_) => "confirmation",
        }
    }
}

/// A parsed command waiting on the session before it can run.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    /// The line as typed
    pub raw: String,
    /// Parsed form; for sudo this is the command without the `sudo` prefix
    pub line: CommandLine,
    /// Heredoc body or redirected input, once known
    pub stdin: Option<String>,
    /// Run elevated
    pub elevated: bool,
    /// The destructive guard has already been satisfied
    pub confirmed: bool,
}

impl PendingCommand {
    pub fn new(raw: impl Into<String>, line: CommandLine) -> Self {
        Self {
            raw: raw.into(),
            line,
            stdin: None,
            elevated: false,
            confirmed: false,
        }
    }
}

/// Heredoc collection in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHeredoc {
    pub command: PendingCommand,
    /// Body lines so far, terminator excluded
    pub lines: Vec<String>,
}

/// An open editor or pager.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingModal {
    pub intent: Intent,
    /// The line that opened it
    pub raw: String,
    /// Opened under sudo
    pub elevated: bool,
}

/// A destructive command awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirm {
    pub warning: DestructiveWarning,
    pub command: PendingCommand,
}

/// A request for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Edit a file; answer with [`Resolution::Saved`] or [`Resolution::Cancelled`].
    OpenEditor {
        path: String,
        content: String,
        is_new: bool,
    },
    /// Page through a file; answer with [`Resolution::Closed`].
    OpenPager { path: String, content: String },
    /// A remote session started. Informational; needs no answer.
    OpenRemote {
        host: String,
        user: String,
        banner: String,
    },
    /// Ask before running a destructive command; answer with
    /// [`Resolution::Confirmed`] or [`Resolution::Cancelled`].
    ConfirmDestructive { warning: DestructiveWarning },
}

/// The presentation layer's answer to an [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Saved { content: String },
    Closed,
    Confirmed,
    Cancelled,
}

/// How the terminal should echo the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    #[default]
    Visible,
    /// Password entry: show `*` or nothing
    Masked,
}

/// A connected `ssh` session.
pub struct RemoteSession {
    pub host: String,
    pub user: String,
    pub started_at: DateTime<Utc>,
    /// Remote working directory and identity
    pub exec: ExecutionContext,
    /// The remote machine's view of the filesystem
    pub fs: Arc<RemappedFs>,
    /// Configuration as seen on the remote host
    pub config: ShellConfig,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("started_at", &self.started_at)
            .field("cwd", &self.exec.current_path)
            .field("root", &self.fs.root())
            .finish()
    }
}

/// Everything the interceptor remembers between lines.
#[derive(Debug, Default)]
pub struct SessionState {
    pub mode: InputMode,
    pub remote: Option<RemoteSession>,
    /// Accepted lines, oldest first
    pub history: Vec<String>,
    /// Variables set with `export`
    pub exported: BTreeMap<String, String>,
}

impl SessionState {
    /// Append a line to history, dropping the oldest beyond `limit`.
    pub fn record_history(&mut self, line: &str, limit: usize) {
        if line.trim().is_empty() {
            return;
        }
        self.history.push(line.to_string());
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}
