//! Shellquest - Mission-driven virtual Unix shell
//!
//! An in-memory filesystem, a command interpreter with the everyday POSIX
//! utilities, and a progression engine that checks each command against
//! the current mission's tasks.
//!
//! # Example
//!
//! ```rust
//! use shellquest::{Adventure, ProgressEvent, Shell};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> shellquest::Result<()> {
//!     let adventure = Adventure::from_json(r#"{
//!         "id": "intro",
//!         "title": "Intro",
//!         "missions": [{
//!             "id": "m1", "title": "Hello", "story": "Say something.",
//!             "tasks": [{"id": "t1", "description": "Print hello",
//!                        "outputPattern": "^hello$"}]
//!         }]
//!     }"#)?;
//!
//!     let mut shell = Shell::builder().adventure(adventure).build().await?;
//!     let outcome = shell.submit("echo hello").await;
//!     assert_eq!(outcome.result.stdout, "hello\n");
//!     assert!(outcome.events.contains(&ProgressEvent::AdventureCompleted {
//!         adventure_id: "intro".to_string(),
//!     }));
//!     Ok(())
//! }
//! ```

pub mod adventure;
mod builtins;
pub mod config;
mod error;
pub mod fs;
pub mod guard;
pub mod interpreter;
#[cfg(feature = "logging")]
mod logging_impl;
pub mod parser;
pub mod path;
pub mod redirect;
pub mod session;
pub mod store;
pub mod validation;

pub use adventure::{Adventure, Hint, Mission, Task};
pub use config::{SessionLimits, ShellConfig, SudoPolicy};
pub use error::{Error, FsError, FsResult, Result};
pub use guard::{DestructiveWarning, WarningLevel};
pub use interpreter::{CommandName, ExecResult, ExecutionContext};
#[cfg(feature = "logging")]
pub use logging_impl::LogConfig;
pub use session::{
    EchoMode, InputMode, Intent, Outcome, RemoteResponder, Resolution, Session, StaticResponder,
};
pub use store::{MemoryProgressStore, PersistedProgress, ProgressStore};
pub use validation::{Pattern, ProgressEvent, ProgressState, ProgressTracker, Validator};

use std::sync::Arc;

use fs::InMemoryFs;
use session::Turn;
use validation::ValidationContext;

/// A learner's shell playing one adventure.
///
/// Owns the filesystem, the session interceptor and the progress tracker.
/// Every submitted line is run, then checked against the current mission;
/// progress is saved to the [`ProgressStore`] whenever something completes.
pub struct Shell {
    session: Session,
    tracker: ProgressTracker,
    store: Arc<dyn ProgressStore>,
    adventure: Arc<Adventure>,
    pristine: InMemoryFs,
    #[cfg(feature = "logging")]
    log_config: LogConfig,
}

impl Shell {
    /// Create a new ShellBuilder.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::default()
    }

    /// Run one line of input and validate whatever command it completed.
    pub async fn submit(&mut self, line: &str) -> Outcome {
        #[cfg(feature = "logging")]
        {
            let password = matches!(self.session.mode(), InputMode::Password(_));
            tracing::debug!(
                line = %self.log_config.format_line(line, password),
                mode = self.session.mode().label(),
                "submit"
            );
        }

        let turn = self.session.submit(line).await;
        self.settle(turn).await
    }

    /// Answer the editor, pager or confirmation the last outcome asked for.
    pub async fn resolve(&mut self, resolution: Resolution) -> Outcome {
        let turn = self.session.resolve(resolution).await;
        self.settle(turn).await
    }

    async fn settle(&mut self, turn: Turn) -> Outcome {
        let mut outcome = turn.outcome;
        let Some(record) = turn.executed else {
            return outcome;
        };

        let ctx = ValidationContext {
            command: &record.command,
            stdout: &record.stdout,
            stderr: &record.stderr,
            exit_code: record.exit_code,
            cwd: &record.cwd,
            username: &self.session.config().username,
            fs: self.session.fs().as_ref(),
        };
        outcome.events = self.tracker.record(&ctx).await;

        if !outcome.events.is_empty() {
            if let Err(err) = self.save_progress() {
                #[cfg(feature = "logging")]
                tracing::warn!(error = %err, "failed to save progress");
                #[cfg(not(feature = "logging"))]
                let _ = err;
            }
        }
        outcome
    }

    /// Prompt for the next line.
    pub fn prompt(&self) -> String {
        self.session.prompt()
    }

    pub fn echo_mode(&self) -> EchoMode {
        self.session.echo_mode()
    }

    /// Start the exercise over.
    ///
    /// The filesystem goes back to the adventure's initial tree, pending
    /// heredocs, sudo prompts, modals and remote sessions are dropped, and
    /// progress (saved copy included) returns to zero. Calling it twice is
    /// the same as calling it once.
    pub async fn reset_exercise(&mut self) -> Result<()> {
        self.session.fs().restore_from(&self.pristine);
        self.session.reset();
        self.tracker.reset();

        #[cfg(feature = "logging")]
        tracing::info!(adventure = %self.adventure.id, "exercise reset");

        self.store.clear(&self.adventure.id)
    }

    /// Progress saved by an earlier session, if any.
    pub fn saved_progress(&self) -> Result<Option<PersistedProgress>> {
        self.store.load(&self.adventure.id)
    }

    /// Continue from saved progress. Ids the adventure does not know are dropped.
    pub fn resume(&mut self, saved: PersistedProgress) {
        self.tracker.restore(saved.into_state());
    }

    /// Save progress now.
    pub fn save_progress(&self) -> Result<()> {
        let progress = PersistedProgress::capture(self.tracker.state());
        self.store.save(&self.adventure.id, &progress)
    }

    /// Reveal the next hint for a task.
    pub fn reveal_hint(&mut self, task_id: &str) -> Option<Hint> {
        let hint = self.tracker.reveal_hint(task_id);
        if hint.is_some() {
            if let Err(err) = self.save_progress() {
                #[cfg(feature = "logging")]
                tracing::warn!(error = %err, "failed to save progress");
                #[cfg(not(feature = "logging"))]
                let _ = err;
            }
        }
        hint
    }

    pub fn adventure(&self) -> &Adventure {
        &self.adventure
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// The learner's filesystem.
    pub fn fs(&self) -> &Arc<InMemoryFs> {
        self.session.fs()
    }

    /// Local working directory and identity.
    pub fn context(&self) -> &ExecutionContext {
        self.session.context()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Builder for a [`Shell`].
#[derive(Default)]
pub struct ShellBuilder {
    adventure: Option<Adventure>,
    config: ShellConfig,
    store: Option<Arc<dyn ProgressStore>>,
    responder: Option<Arc<dyn RemoteResponder>>,
    #[cfg(feature = "logging")]
    log_config: LogConfig,
}

impl ShellBuilder {
    /// The adventure to play. Required.
    pub fn adventure(mut self, adventure: Adventure) -> Self {
        self.adventure = Some(adventure);
        self
    }

    pub fn config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    /// Where progress is saved. Defaults to memory.
    pub fn store(mut self, store: Arc<dyn ProgressStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Hosts reachable over `ssh`. Defaults to the adventure's `remoteHosts`.
    pub fn responder(mut self, responder: Arc<dyn RemoteResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Log redaction settings.
    #[cfg(feature = "logging")]
    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Build the shell, creating the adventure's initial filesystem.
    pub async fn build(self) -> Result<Shell> {
        let adventure = self
            .adventure
            .ok_or_else(|| Error::Adventure("no adventure configured".to_string()))?;
        adventure.check()?;

        let fs = adventure.build_filesystem(&self.config.username).await?;
        let pristine = fs.snapshot();
        let responder = self
            .responder
            .unwrap_or_else(|| Arc::new(StaticResponder::from_adventure(&adventure)));
        let session = Session::new(Arc::new(fs), self.config)
            .responder(responder)
            .critical_paths(adventure.critical_paths.clone());

        let adventure = Arc::new(adventure);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryProgressStore::new()));

        #[cfg(feature = "logging")]
        tracing::debug!(adventure = %adventure.id, missions = adventure.missions.len(), "shell ready");

        Ok(Shell {
            session,
            tracker: ProgressTracker::new(Arc::clone(&adventure)),
            store,
            adventure,
            pristine,
            #[cfg(feature = "logging")]
            log_config: self.log_config,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::FileSystem;

    const ADVENTURE: &str = r#"{
        "id": "basics",
        "title": "Basics",
        "missions": [
            {"id": "m1", "title": "Where am I", "story": "Find yourself.",
             "tasks": [{"id": "pwd", "description": "Print the working directory",
                        "outputPattern": "^/home/student$"}]},
            {"id": "m2", "title": "Make room", "story": "Build a place.",
             "tasks": [{"id": "mkdir", "description": "Create projects",
                        "outputCheck": "directoryExists",
                        "outputCheckParams": {"path": "projects"},
                        "hints": [{"level": 1, "text": "mkdir"}]}]}
        ],
        "initialFileSystem": {"root": {
            "home": {"type": "directory", "children": {
                "student": {"type": "directory", "children": {
                    "readme.txt": {"type": "file", "content": "welcome\n"}
                }}
            }}
        }}
    }"#;

    async fn shell() -> Shell {
        Shell::builder()
            .adventure(Adventure::from_json(ADVENTURE).unwrap())
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_requires_adventure() {
        assert!(Shell::builder().build().await.is_err());
    }

    #[tokio::test]
    async fn test_commands_drive_progress() {
        let mut shell = shell().await;
        let outcome = shell.submit("cat readme.txt").await;
        assert_eq!(outcome.result.stdout, "welcome\n");
        assert!(outcome.events.is_empty());

        let outcome = shell.submit("pwd").await;
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(shell.progress().state().current_mission_index, 1);

        shell.submit("mkdir projects").await;
        assert!(shell.progress().is_finished());
        let saved = shell.saved_progress().unwrap().unwrap();
        assert_eq!(saved.completed_missions, ["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_reset_exercise_is_idempotent() {
        let mut shell = shell().await;
        shell.submit("pwd").await;
        shell.submit("rm readme.txt").await;
        shell.submit("cd /tmp").await;
        shell.submit("sudo ls /root").await;

        shell.reset_exercise().await.unwrap();
        shell.reset_exercise().await.unwrap();

        assert!(shell.fs().exists("/home/student/readme.txt").await);
        assert_eq!(shell.context().current_path, "/home/student");
        assert_eq!(shell.session().mode(), &InputMode::Normal);
        assert_eq!(shell.progress().state(), &ProgressState::default());
        assert!(shell.saved_progress().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_and_hints() {
        let mut shell = shell().await;
        shell.submit("pwd").await;
        let saved = shell.saved_progress().unwrap().unwrap();

        let mut fresh = shell_with_store(shell.store.clone()).await;
        fresh.resume(saved);
        assert_eq!(fresh.progress().current_task().map(|t| t.id.as_str()), Some("mkdir"));

        let hint = fresh.reveal_hint("mkdir").unwrap();
        assert_eq!(hint.text, "mkdir");
        let saved = fresh.saved_progress().unwrap().unwrap();
        assert_eq!(saved.hints_used.get("mkdir"), Some(&1));
    }

    async fn shell_with_store(store: Arc<dyn ProgressStore>) -> Shell {
        Shell::builder()
            .adventure(Adventure::from_json(ADVENTURE).unwrap())
            .store(store)
            .build()
            .await
            .unwrap()
    }
}
