//! Command dispatcher
//!
//! Maps `argv[0]` onto an exhaustive [`CommandName`] and runs the matching
//! builtin against the filesystem. `sudo` is handled here: depending on the
//! [`SudoPolicy`] it either asks the caller for a password or re-dispatches
//! the remaining words elevated.

mod state;

pub use state::{ExecResult, ExecutionContext};

use std::sync::Arc;

use crate::builtins::{self, Builtin};
use crate::config::{ShellConfig, SudoPolicy};
use crate::fs::FileSystem;

/// Every command the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Cd,
    Pwd,
    Ls,
    Cat,
    Mkdir,
    Touch,
    Rm,
    Rmdir,
    Cp,
    Mv,
    Echo,
    Grep,
    Find,
    Head,
    Tail,
    Clear,
    Sudo,
    Chmod,
    Chown,
    Whoami,
    Hostname,
    Wc,
    History,
    Date,
    Exit,
}

impl CommandName {
    /// All commands, in help order.
    pub const ALL: [CommandName; 25] = [
        CommandName::Cd,
        CommandName::Pwd,
        CommandName::Ls,
        CommandName::Cat,
        CommandName::Mkdir,
        CommandName::Touch,
        CommandName::Rm,
        CommandName::Rmdir,
        CommandName::Cp,
        CommandName::Mv,
        CommandName::Echo,
        CommandName::Grep,
        CommandName::Find,
        CommandName::Head,
        CommandName::Tail,
        CommandName::Clear,
        CommandName::Sudo,
        CommandName::Chmod,
        CommandName::Chown,
        CommandName::Whoami,
        CommandName::Hostname,
        CommandName::Wc,
        CommandName::History,
        CommandName::Date,
        CommandName::Exit,
    ];

    /// Look up a command by the name typed at the prompt.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    /// The name typed at the prompt.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Cd => "cd",
            CommandName::Pwd => "pwd",
            CommandName::Ls => "ls",
            CommandName::Cat => "cat",
            CommandName::Mkdir => "mkdir",
            CommandName::Touch => "touch",
            CommandName::Rm => "rm",
            CommandName::Rmdir => "rmdir",
            CommandName::Cp => "cp",
            CommandName::Mv => "mv",
            CommandName::Echo => "echo",
            CommandName::Grep => "grep",
            CommandName::Find => "find",
            CommandName::Head => "head",
            CommandName::Tail => "tail",
            CommandName::Clear => "clear",
            CommandName::Sudo => "sudo",
            CommandName::Chmod => "chmod",
            CommandName::Chown => "chown",
            CommandName::Whoami => "whoami",
            CommandName::Hostname => "hostname",
            CommandName::Wc => "wc",
            CommandName::History => "history",
            CommandName::Date => "date",
            CommandName::Exit => "exit",
        }
    }

    /// Handler for this command. `sudo` has none; the dispatcher unwraps it.
    fn builtin(self) -> Option<&'static dyn Builtin> {
        let handler: &'static dyn Builtin = match self {
            CommandName::Cd => &builtins::Cd,
            CommandName::Pwd => &builtins::Pwd,
            CommandName::Ls => &builtins::Ls,
            CommandName::Cat => &builtins::Cat,
            CommandName::Mkdir => &builtins::Mkdir,
            CommandName::Touch => &builtins::Touch,
            CommandName::Rm => &builtins::Rm,
            CommandName::Rmdir => &builtins::Rmdir,
            CommandName::Cp => &builtins::Cp,
            CommandName::Mv => &builtins::Mv,
            CommandName::Echo => &builtins::Echo,
            CommandName::Grep => &builtins::Grep,
            CommandName::Find => &builtins::Find,
            CommandName::Head => &builtins::Head,
            CommandName::Tail => &builtins::Tail,
            CommandName::Clear => &builtins::Clear,
            CommandName::Sudo => return None,
            CommandName::Chmod => &builtins::Chmod,
            CommandName::Chown => &builtins::Chown,
            CommandName::Whoami => &builtins::Whoami,
            CommandName::Hostname => &builtins::Hostname,
            CommandName::Wc => &builtins::Wc,
            CommandName::History => &builtins::History,
            CommandName::Date => &builtins::Date,
            CommandName::Exit => &builtins::Exit,
        };
        Some(handler)
    }
}

impl std::fmt::Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the dispatcher did with a command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The command ran.
    Done(ExecResult),
    /// `sudo` needs the password before `argv` may run elevated.
    RequiresPassword { argv: Vec<String> },
}

/// Everything one command invocation runs with.
pub struct Invocation<'a> {
    /// Argument vector, command name first
    pub argv: &'a [String],
    /// Working directory, user and elevation
    pub exec: &'a ExecutionContext,
    /// Filesystem the command sees
    pub fs: Arc<dyn FileSystem>,
    /// Standard input, if redirected
    pub stdin: Option<&'a str>,
    /// Session history, oldest first
    pub history: &'a [String],
    /// Session configuration
    pub config: &'a ShellConfig,
}

/// Dispatch a command line.
pub async fn dispatch(inv: Invocation<'_>) -> Dispatch {
    let Some(first) = inv.argv.first() else {
        return Dispatch::Done(ExecResult::default());
    };
    if CommandName::parse(first) != Some(CommandName::Sudo) {
        return Dispatch::Done(run(&inv, inv.argv, inv.exec, "").await);
    }

    let rest = strip_sudo(inv.argv);
    if rest.is_empty() {
        return Dispatch::Done(ExecResult::err("usage: sudo command\n", 1));
    }
    if inv.exec.is_sudo {
        return Dispatch::Done(run(&inv, rest, inv.exec, "sudo: ").await);
    }
    match inv.config.sudo_policy {
        SudoPolicy::Password => Dispatch::RequiresPassword {
            argv: rest.to_vec(),
        },
        SudoPolicy::Passthrough => {
            let elevated = inv.exec.elevated();
            Dispatch::Done(run(&inv, rest, &elevated, "sudo: ").await)
        }
    }
}

/// Run `inv.argv` elevated for this one invocation.
///
/// Used once the sudo password has been accepted. A leading `sudo` is
/// stripped again so `sudo sudo ls` behaves like `sudo ls`.
pub async fn execute_elevated(inv: Invocation<'_>) -> ExecResult {
    let rest = strip_sudo(inv.argv);
    if rest.is_empty() {
        return ExecResult::err("usage: sudo command\n", 1);
    }
    let elevated = inv.exec.elevated();
    run(&inv, rest, &elevated, "sudo: ").await
}

fn strip_sudo(argv: &[String]) -> &[String] {
    let mut rest = argv;
    while let Some((first, tail)) = rest.split_first() {
        if CommandName::parse(first) != Some(CommandName::Sudo) {
            break;
        }
        rest = tail;
    }
    rest
}

async fn run(
    inv: &Invocation<'_>,
    argv: &[String],
    exec: &ExecutionContext,
    not_found_prefix: &str,
) -> ExecResult {
    let Some((name, args)) = argv.split_first() else {
        return ExecResult::default();
    };
    let Some(builtin) = CommandName::parse(name).and_then(CommandName::builtin) else {
        #[cfg(feature = "logging")]
        tracing::debug!(command = %name, "command not found");
        return ExecResult::err(
            format!("{}{}: command not found\n", not_found_prefix, name),
            127,
        );
    };

    let ctx = builtins::Context {
        args,
        exec,
        fs: Arc::clone(&inv.fs),
        stdin: inv.stdin,
        history: inv.history,
        config: inv.config,
    };
    let result = match builtin.execute(ctx).await {
        Ok(result) => result,
        Err(e) => ExecResult::err(format!("{}: {}\n", name, e), 1),
    };

    #[cfg(feature = "logging")]
    tracing::debug!(
        command = %name,
        sudo = exec.is_sudo,
        exit_code = result.exit_code,
        "dispatched"
    );

    result
}
