//! Session interceptor
//!
//! Everything between the typed line and the dispatcher. [`Session`] owns
//! the cross-command state: history, exported variables, the input mode
//! (heredoc, sudo password, open modal, pending confirmation) and an
//! optional remote session. Each submitted line yields a [`Turn`]: what to
//! show, and which command ran, if any, for validation.

mod claimed;
mod remote;
mod state;

pub use claimed::Claimed;
pub use remote::{
    RemoteHost, RemoteResponder, ScpOperand, StaticResponder, parse_destination,
    parse_scp_operand, remote_root,
};
pub use state::{
    EchoMode, InputMode, Intent, PendingCommand, PendingConfirm, PendingHeredoc, PendingModal,
    RemoteSession, Resolution, SessionState,
};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::builtins::{claim_created, topmost_missing};
use crate::config::{ShellConfig, SudoPolicy};
use crate::fs::{FileSystem, InMemoryFs};
use crate::guard;
use crate::interpreter::{self, CommandName, Dispatch, ExecResult, ExecutionContext, Invocation};
use crate::parser::{Parser, StdinSource};
use crate::path;
use crate::redirect;
use crate::validation::ProgressEvent;

/// What the presentation layer should do after a submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Output to render. Empty stdout when it went to a file.
    pub result: ExecResult,
    /// One-line notice, e.g. `Output written to notes.txt`
    pub notice: Option<String>,
    /// Request to open an editor, pager or confirmation
    pub intent: Option<Intent>,
    /// Progress made by this submission
    pub events: Vec<ProgressEvent>,
    /// Prompt for the next line
    pub prompt: String,
    /// How to echo the next line
    pub echo: EchoMode,
}

/// A command that ran to completion, as validation sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    /// The line as typed
    pub command: String,
    /// Output before redirection
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Working directory afterwards
    pub cwd: String,
}

/// Result of one submission or resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub outcome: Outcome,
    /// Present when a command actually ran
    pub executed: Option<CommandRecord>,
}

/// One learner's shell session.
pub struct Session {
    fs: Arc<InMemoryFs>,
    exec: ExecutionContext,
    state: SessionState,
    config: ShellConfig,
    responder: Arc<dyn RemoteResponder>,
    critical_paths: Vec<String>,
    /// `(user, host)` pairs whose files are already in the remote tree
    seeded_hosts: HashSet<(String, String)>,
}

impl Session {
    /// New session in the user's home directory.
    pub fn new(fs: Arc<InMemoryFs>, config: ShellConfig) -> Self {
        Self {
            fs,
            exec: ExecutionContext::new(config.username.clone()),
            state: SessionState::default(),
            config,
            responder: Arc::new(StaticResponder::default()),
            critical_paths: Vec::new(),
            seeded_hosts: HashSet::new(),
        }
    }

    /// Hosts reachable with `ssh` and `scp`.
    pub fn responder(mut self, responder: Arc<dyn RemoteResponder>) -> Self {
        self.responder = responder;
        self
    }

    /// Paths the destructive guard warns about.
    pub fn critical_paths(mut self, paths: Vec<String>) -> Self {
        self.critical_paths = paths;
        self
    }

    pub fn fs(&self) -> &Arc<InMemoryFs> {
        &self.fs
    }

    /// Local execution context.
    pub fn context(&self) -> &ExecutionContext {
        &self.exec
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> &InputMode {
        &self.state.mode
    }

    pub fn remote(&self) -> Option<&RemoteSession> {
        self.state.remote.as_ref()
    }

    pub fn history(&self) -> &[String] {
        &self.state.history
    }

    /// Forget all session state and return home.
    ///
    /// The filesystem is left alone.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.exec = ExecutionContext::new(self.config.username.clone());
    }

    /// Prompt for the next line.
    pub fn prompt(&self) -> String {
        match &self.state.mode {
            InputMode::Heredoc(_) => "> ".to_string(),
            InputMode::Password(_) => {
                format!("[sudo] password for {}: ", self.active_exec().username)
            }
            _ => match &self.state.remote {
                Some(remote) => format!(
                    "{}@{}:{}$ ",
                    remote.user, remote.host, remote.exec.current_path
                ),
                None => format!(
                    "{}@{}:{}$ ",
                    self.exec.username,
                    self.config.hostname,
                    tilde(&self.exec.current_path, &self.config.home())
                ),
            },
        }
    }

    pub fn echo_mode(&self) -> EchoMode {
        match self.state.mode {
            InputMode::Password(_) => EchoMode::Masked,
            _ => EchoMode::Visible,
        }
    }

    /// Variables `$NAME` expands against.
    pub fn variables(&self) -> HashMap<String, String> {
        let exec = self.active_exec();
        let mut vars = HashMap::new();
        vars.insert("USER".to_string(), exec.username.clone());
        vars.insert("LOGNAME".to_string(), exec.username.clone());
        vars.insert("HOME".to_string(), path::home_dir(&exec.username));
        vars.insert("PWD".to_string(), exec.current_path.clone());
        vars.insert("SHELL".to_string(), "/bin/bash".to_string());
        vars.insert("HOSTNAME".to_string(), self.active_config().hostname.clone());
        vars.extend(
            self.state
                .exported
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        vars
    }

    /// Feed one line of input.
    pub async fn submit(&mut self, line: &str) -> Turn {
        match std::mem::take(&mut self.state.mode) {
            InputMode::Normal => self.submit_command(line).await,
            InputMode::Heredoc(pending) => self.collect_heredoc(pending, line).await,
            InputMode::Password(pending) => self.check_password(pending, line).await,
            InputMode::ConfirmDestructive(confirm) => {
                let answer = line.trim().to_ascii_lowercase();
                self.state.mode = InputMode::ConfirmDestructive(confirm);
                let resolution = if answer == "y" || answer == "yes" {
                    Resolution::Confirmed
                } else {
                    Resolution::Cancelled
                };
                self.resolve(resolution).await
            }
            modal @ InputMode::AwaitingModal(_) => {
                let message = format!(
                    "bash: cannot run commands while the {} is open\n",
                    modal.label()
                );
                self.state.mode = modal;
                self.reply(ExecResult::err(message, 1))
            }
        }
    }

    /// Answer the pending [`Intent`].
    pub async fn resolve(&mut self, resolution: Resolution) -> Turn {
        match std::mem::take(&mut self.state.mode) {
            InputMode::AwaitingModal(modal) => self.close_modal(modal, resolution).await,
            InputMode::ConfirmDestructive(confirm) => match resolution {
                Resolution::Confirmed => {
                    let mut command = confirm.command;
                    command.confirmed = true;
                    self.proceed(command).await
                }
                _ => self.finish(
                    ExecResult::default(),
                    Some("Operation cancelled".to_string()),
                    None,
                    None,
                ),
            },
            other => {
                self.state.mode = other;
                self.reply(ExecResult::default())
            }
        }
    }

    async fn submit_command(&mut self, line: &str) -> Turn {
        if line.trim().is_empty() {
            return self.reply(ExecResult::default());
        }
        self.state
            .record_history(line, self.config.limits.max_history);

        let variables = self.variables();
        let parsed = match Parser::new(line).variables(&variables).parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                let result = ExecResult::err(format!("bash: {}\n", e), 2);
                let record = self.record(line, &result);
                return self.finish(result, None, None, Some(record));
            }
        };
        self.proceed(PendingCommand::new(line, parsed)).await
    }

    /// Collect a heredoc body or run the guard, then execute.
    async fn proceed(&mut self, command: PendingCommand) -> Turn {
        if command.stdin.is_none() && command.line.heredoc().is_some() {
            self.state.mode = InputMode::Heredoc(PendingHeredoc {
                command,
                lines: Vec::new(),
            });
            return self.reply(ExecResult::default());
        }

        if !command.confirmed && self.state.remote.is_none() {
            let argv: Vec<String> = command
                .line
                .argv
                .iter()
                .skip_while(|a| is_sudo(a))
                .cloned()
                .collect();
            let warning = guard::classify(
                &argv,
                command.line.stdout.as_ref(),
                &self.exec,
                self.fs.as_ref(),
                &self.critical_paths,
            )
            .await;
            if let Some(warning) = warning {
                let intent = Intent::ConfirmDestructive {
                    warning: warning.clone(),
                };
                self.state.mode = InputMode::ConfirmDestructive(PendingConfirm { warning, command });
                return self.finish(ExecResult::default(), None, Some(intent), None);
            }
        }

        self.execute(command).await
    }

    async fn collect_heredoc(&mut self, mut pending: PendingHeredoc, line: &str) -> Turn {
        let Some(spec) = pending.command.line.heredoc().cloned() else {
            return self.proceed(pending.command).await;
        };
        let terminator = if spec.strip_tabs {
            line.trim_start_matches('\t')
        } else {
            line
        };
        if terminator == spec.marker {
            let variables = self.variables();
            let lookup = |name: &str| variables.get(name).cloned();
            let mut command = pending.command;
            command.stdin = Some(redirect::heredoc_body(&pending.lines, &spec, &lookup));
            return self.proceed(command).await;
        }

        let limit = self.config.limits.max_heredoc_lines;
        if pending.lines.len() >= limit {
            return self.reply(ExecResult::err(
                format!("bash: here-document longer than {} lines\n", limit),
                1,
            ));
        }
        pending.lines.push(line.to_string());
        self.state.mode = InputMode::Heredoc(pending);
        self.reply(ExecResult::default())
    }

    async fn check_password(&mut self, mut pending: PendingCommand, line: &str) -> Turn {
        if line != self.config.sudo_password {
            #[cfg(feature = "logging")]
            tracing::info!(user = %self.exec.username, "sudo authentication failed");
            let result = ExecResult::err("sudo: 3 incorrect password attempts\n", 1);
            let record = self.record(&pending.raw, &result);
            return self.finish(result, None, None, Some(record));
        }

        #[cfg(feature = "logging")]
        tracing::info!(user = %self.exec.username, "sudo authentication succeeded");
        pending.elevated = true;
        self.execute(pending).await
    }

    fn await_password(&mut self, pending: PendingCommand) -> Turn {
        self.state.mode = InputMode::Password(pending);
        self.reply(ExecResult::default())
    }

    /// Run a fully collected, confirmed command.
    async fn execute(&mut self, mut pending: PendingCommand) -> Turn {
        let raw = pending.raw.clone();
        let remote = self.state.remote.is_some();

        if remote {
            match pending.line.name() {
                Some("exit") | Some("logout") => return self.disconnect(&raw),
                Some("ssh") => {
                    let result = ExecResult::err("ssh: nested sessions are not supported\n", 1);
                    let record = self.record(&raw, &result);
                    return self.finish(result, None, None, Some(record));
                }
                _ => {}
            }
        }

        // sudo in front of a claimed command, or of a line that reads a
        // file, is settled here so the read can happen elevated.
        if !pending.elevated && pending.line.name().is_some_and(is_sudo) {
            let rest: Vec<String> = pending
                .line
                .argv
                .iter()
                .skip_while(|a| is_sudo(a))
                .cloned()
                .collect();
            let claimed = !remote && rest.first().is_some_and(|n| Claimed::parse(n).is_some());
            let reads_file = matches!(pending.line.stdin, Some(StdinSource::File(_)));
            if !rest.is_empty() && (claimed || reads_file) {
                pending.line.argv = rest;
                if self.active_exec().is_sudo
                    || self.config.sudo_policy == SudoPolicy::Passthrough
                {
                    pending.elevated = true;
                } else {
                    return self.await_password(pending);
                }
            }
        }

        let exec = if pending.elevated {
            self.active_exec().elevated()
        } else {
            self.active_exec().clone()
        };
        let fs = self.active_fs();

        if pending.stdin.is_none() {
            if let Some(StdinSource::File(file)) = &pending.line.stdin {
                match redirect::read_input(fs.as_ref(), &exec, file).await {
                    Ok(text) => pending.stdin = Some(text),
                    Err(failure) => {
                        let record = self.record(&raw, &failure);
                        return self.finish(failure, None, None, Some(record));
                    }
                }
            }
        }

        let claimed = if remote {
            None
        } else {
            pending
                .line
                .name()
                .filter(|n| !is_sudo(n))
                .and_then(Claimed::parse)
        };
        if let Some(claimed) = claimed {
            let output = self
                .run_claimed(
                    claimed,
                    pending.line.args(),
                    pending.stdin.as_deref(),
                    &raw,
                    pending.elevated,
                )
                .await;
            return self
                .complete(&pending, output.result, output.intent, &exec, fs)
                .await;
        }

        let config = self.active_config().clone();
        let invocation = Invocation {
            argv: &pending.line.argv,
            exec: self.active_exec(),
            fs: Arc::clone(&fs),
            stdin: pending.stdin.as_deref(),
            history: &self.state.history,
            config: &config,
        };
        let result = if pending.elevated {
            interpreter::execute_elevated(invocation).await
        } else {
            match interpreter::dispatch(invocation).await {
                Dispatch::Done(result) => result,
                Dispatch::RequiresPassword { argv } => {
                    pending.line.argv = argv;
                    return self.await_password(pending);
                }
            }
        };
        self.complete(&pending, result, None, &exec, fs).await
    }

    /// Apply a finished command: move into `cd`'s directory, land
    /// redirected output, and report it for validation.
    async fn complete(
        &mut self,
        pending: &PendingCommand,
        mut result: ExecResult,
        intent: Option<Intent>,
        exec: &ExecutionContext,
        fs: Arc<dyn FileSystem>,
    ) -> Turn {
        if let Some(new_path) = &result.new_path {
            self.set_cwd(new_path.clone());
        }
        let mut notice = None;
        if let Some(target) = &pending.line.stdout {
            let limits = &self.active_config().limits;
            match redirect::write_output(fs.as_ref(), exec, target, &result.stdout, limits).await {
                Ok(written) => notice = Some(written),
                Err(failure) => {
                    result.stderr.push_str(&failure.stderr);
                    result.exit_code = failure.exit_code;
                }
            }
        }
        // Validation sees the command's own stdout along with the final
        // exit code and stderr of the redirect.
        let record = self.record(&pending.raw, &result);
        if pending.line.stdout.is_some() {
            result.stdout.clear();
        }

        self.finish(result, notice, intent, Some(record))
    }

    async fn close_modal(&mut self, modal: PendingModal, resolution: Resolution) -> Turn {
        match (modal.intent, resolution) {
            (Intent::OpenEditor { path, .. }, Resolution::Saved { content }) => {
                let result = self.save_buffer(&path, &content, modal.elevated).await;
                let notice = result
                    .is_success()
                    .then(|| format!("[ Wrote {} lines ]", content.lines().count()));
                let record = self.record(&modal.raw, &result);
                self.finish(result, notice, None, Some(record))
            }
            (Intent::OpenPager { .. }, _) => {
                let result = ExecResult::default();
                let record = self.record(&modal.raw, &result);
                self.finish(result, None, None, Some(record))
            }
            _ => self.reply(ExecResult::default()),
        }
    }

    async fn save_buffer(&self, path: &str, content: &str, elevated: bool) -> ExecResult {
        if content.len() > self.config.limits.max_write_bytes {
            return ExecResult::err(format!("[ Error writing {}: File too large ]\n", path), 1);
        }
        let exec = if elevated {
            self.exec.elevated()
        } else {
            self.exec.clone()
        };
        let fs = self.fs.as_ref() as &dyn FileSystem;
        let missing = topmost_missing(fs, path).await;
        let saved = match fs.write_file(path, content.as_bytes()).await {
            Ok(()) => claim_created(fs, &exec, missing.as_deref()).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => ExecResult::default(),
            Err(e) => ExecResult::err(format!("[ Error writing {}: {} ]\n", path, e), 1),
        }
    }

    fn disconnect(&mut self, raw: &str) -> Turn {
        let host = self
            .state
            .remote
            .take()
            .map(|remote| remote.host)
            .unwrap_or_default();

        #[cfg(feature = "logging")]
        tracing::info!(host = %host, "remote session closed");

        let result = ExecResult::ok(format!("logout\nConnection to {} closed.\n", host));
        let record = self.record(raw, &result);
        self.finish(result, None, None, Some(record))
    }

    fn active_exec(&self) -> &ExecutionContext {
        match &self.state.remote {
            Some(remote) => &remote.exec,
            None => &self.exec,
        }
    }

    fn active_config(&self) -> &ShellConfig {
        match &self.state.remote {
            Some(remote) => &remote.config,
            None => &self.config,
        }
    }

    fn active_fs(&self) -> Arc<dyn FileSystem> {
        match &self.state.remote {
            Some(remote) => Arc::clone(&remote.fs) as Arc<dyn FileSystem>,
            None => Arc::clone(&self.fs) as Arc<dyn FileSystem>,
        }
    }

    fn set_cwd(&mut self, path: String) {
        match &mut self.state.remote {
            Some(remote) => remote.exec.current_path = path,
            None => self.exec.current_path = path,
        }
    }

    fn record(&self, command: &str, result: &ExecResult) -> CommandRecord {
        CommandRecord {
            command: command.to_string(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            cwd: self.active_exec().current_path.clone(),
        }
    }

    fn reply(&self, result: ExecResult) -> Turn {
        self.finish(result, None, None, None)
    }

    fn finish(
        &self,
        result: ExecResult,
        notice: Option<String>,
        intent: Option<Intent>,
        executed: Option<CommandRecord>,
    ) -> Turn {
        Turn {
            outcome: Outcome {
                result,
                notice,
                intent,
                events: Vec::new(),
                prompt: self.prompt(),
                echo: self.echo_mode(),
            },
            executed,
        }
    }
}

fn is_sudo(word: &str) -> bool {
    CommandName::parse(word) == Some(CommandName::Sudo)
}

/// Abbreviate the home directory as `~`.
fn tilde(cwd: &str, home: &str) -> String {
    if cwd == home {
        return "~".to_string();
    }
    match cwd.strip_prefix(home) {
        Some(rest) if rest.starts_with('/') => format!("~{}", rest),
        _ => cwd.to_string(),
    }
}
