//! Commands the session answers itself
//!
//! These never reach the dispatcher. Some finish on the spot (`env`,
//! `export`, `scp`), the rest hand the presentation layer an [`Intent`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::remote::{RemoteHost, ScpOperand, parse_destination, parse_scp_operand, remote_root};
use super::state::{Intent, InputMode, PendingModal, RemoteSession};
use super::Session;
use crate::adventure;
use crate::builtins::flags::{self, FlagSpec};
use crate::builtins::{claim_created, nearest_existing, permission_denied, topmost_missing};
use crate::error::Result;
use crate::fs::{FileSystem, RemappedFs};
use crate::interpreter::{ExecResult, ExecutionContext};
use crate::parser::is_name;
use crate::path;

const SSH_FLAGS: FlagSpec = FlagSpec {
    value_options: &["-p", "-l", "-i"],
    numeric_shorthand: false,
};

/// A command the session claims before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claimed {
    Ssh,
    Scp,
    Less,
    More,
    Env,
    Export,
    Nano,
    Vi,
    Vim,
}

impl Claimed {
    pub const ALL: [Claimed; 9] = [
        Claimed::Ssh,
        Claimed::Scp,
        Claimed::Less,
        Claimed::More,
        Claimed::Env,
        Claimed::Export,
        Claimed::Nano,
        Claimed::Vi,
        Claimed::Vim,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Claimed::Ssh => "ssh",
            Claimed::Scp => "scp",
            Claimed::Less => "less",
            Claimed::More => "more",
            Claimed::Env => "env",
            Claimed::Export => "export",
            Claimed::Nano => "nano",
            Claimed::Vi => "vi",
            Claimed::Vim => "vim",
        }
    }
}

/// What a claimed command produced.
pub(super) struct ClaimOutput {
    pub result: ExecResult,
    pub intent: Option<Intent>,
}

impl From<ExecResult> for ClaimOutput {
    fn from(result: ExecResult) -> Self {
        Self {
            result,
            intent: None,
        }
    }
}

impl Session {
    pub(super) async fn run_claimed(
        &mut self,
        claimed: Claimed,
        args: &[String],
        stdin: Option<&str>,
        raw: &str,
        elevated: bool,
    ) -> ClaimOutput {
        let exec = if elevated {
            self.exec.elevated()
        } else {
            self.exec.clone()
        };
        match claimed {
            Claimed::Env => self.env().into(),
            Claimed::Export => self.export(args).into(),
            Claimed::Less | Claimed::More => {
                self.page(claimed.as_str(), args, stdin, &exec, raw).await
            }
            Claimed::Nano | Claimed::Vi | Claimed::Vim => {
                self.edit(claimed.as_str(), args, &exec, raw).await
            }
            Claimed::Ssh => self.ssh(args).await,
            Claimed::Scp => self.scp(args, &exec).await.into(),
        }
    }

    fn env(&self) -> ExecResult {
        let sorted: BTreeMap<String, String> = self.variables().into_iter().collect();
        let mut out = String::new();
        for (name, value) in sorted {
            out.push_str(&format!("{}={}\n", name, value));
        }
        ExecResult::ok(out)
    }

    fn export(&mut self, args: &[String]) -> ExecResult {
        if args.is_empty() {
            let mut out = String::new();
            for (name, value) in &self.state.exported {
                out.push_str(&format!("declare -x {}=\"{}\"\n", name, value));
            }
            return ExecResult::ok(out);
        }

        let mut result = ExecResult::default();
        for arg in args {
            let (name, value) = match arg.split_once('=') {
                Some((name, value)) => (name, value.to_string()),
                None => (
                    arg.as_str(),
                    self.variables().get(arg).cloned().unwrap_or_default(),
                ),
            };
            if !is_name(name) {
                result.stderr.push_str(&format!(
                    "bash: export: `{}': not a valid identifier\n",
                    arg
                ));
                result.exit_code = 1;
                continue;
            }
            self.state.exported.insert(name.to_string(), value);
        }
        result
    }

    async fn page(
        &mut self,
        cmd: &str,
        args: &[String],
        stdin: Option<&str>,
        exec: &ExecutionContext,
        raw: &str,
    ) -> ClaimOutput {
        let file = args.iter().find(|a| !a.starts_with('-'));
        let (path, content) = match (file, stdin) {
            (Some(file), _) => match self.read_for_pager(cmd, file, exec).await {
                Ok(found) => found,
                Err(failure) => return failure.into(),
            },
            (None, Some(text)) => ("(standard input)".to_string(), text.to_string()),
            (None, None) => {
                return ExecResult::err(
                    format!("Missing filename (\"{} --help\" for help)\n", cmd),
                    1,
                )
                .into();
            }
        };

        let intent = Intent::OpenPager { path, content };
        self.open_modal(intent, raw, exec.is_sudo)
    }

    async fn read_for_pager(
        &self,
        cmd: &str,
        file: &str,
        exec: &ExecutionContext,
    ) -> std::result::Result<(String, String), ExecResult> {
        let path = exec.resolve(file);
        match self.fs.stat(&path).await {
            None => Err(ExecResult::err(
                format!("{}: {}: No such file or directory\n", cmd, file),
                1,
            )),
            Some(meta) if meta.file_type.is_dir() => {
                Err(ExecResult::err(format!("{} is a directory\n", file), 1))
            }
            Some(meta) if meta.is_root_owned() && !exec.is_sudo => {
                Err(permission_denied(cmd, file))
            }
            Some(_) => match self.fs.read_file(&path).await {
                Ok(bytes) => Ok((path, String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => Err(ExecResult::err(format!("{}: {}: {}\n", cmd, file, e), 1)),
            },
        }
    }

    async fn edit(
        &mut self,
        cmd: &str,
        args: &[String],
        exec: &ExecutionContext,
        raw: &str,
    ) -> ClaimOutput {
        let Some(file) = args.iter().find(|a| !a.starts_with('-')) else {
            return ExecResult::err(format!("{}: missing file operand\n", cmd), 1).into();
        };
        let path = exec.resolve(file);

        let existing = self.fs.stat(&path).await;
        if existing.as_ref().is_some_and(|m| m.file_type.is_dir()) {
            return ExecResult::err(format!("{}: {}: Is a directory\n", cmd, file), 1).into();
        }
        if !exec.is_sudo
            && nearest_existing(self.fs.as_ref(), &path)
                .await
                .is_some_and(|m| m.is_root_owned())
        {
            return permission_denied(cmd, file).into();
        }

        let content = match existing {
            Some(_) => match self.fs.read_file(&path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    return ExecResult::err(format!("{}: {}: {}\n", cmd, file, e), 1).into();
                }
            },
            None => String::new(),
        };

        let intent = Intent::OpenEditor {
            path,
            content,
            is_new: existing.is_none(),
        };
        self.open_modal(intent, raw, exec.is_sudo)
    }

    fn open_modal(&mut self, intent: Intent, raw: &str, elevated: bool) -> ClaimOutput {
        self.state.mode = InputMode::AwaitingModal(PendingModal {
            intent: intent.clone(),
            raw: raw.to_string(),
            elevated,
        });
        ClaimOutput {
            result: ExecResult::default(),
            intent: Some(intent),
        }
    }

    async fn ssh(&mut self, args: &[String]) -> ClaimOutput {
        let usage = || ExecResult::err("usage: ssh [-l login_name] [-p port] [user@]hostname\n", 255);
        let parsed = match flags::parse(args, &SSH_FLAGS) {
            Ok(parsed) => parsed,
            Err(_) => return usage().into(),
        };
        let Some(dest) = parsed.positional.first() else {
            return usage().into();
        };
        let (user, host) = parse_destination(dest, &self.config.username);
        let user = parsed.value("-l").unwrap_or(user).to_string();
        let host = host.to_string();

        let Some(remote) = self.responder.lookup(&host) else {
            return ExecResult::err(
                format!("ssh: Could not resolve hostname {}\n", host),
                255,
            )
            .into();
        };
        let view = match self.remote_view(&user, &host, &remote).await {
            Ok(view) => view,
            Err(e) => return ExecResult::err(format!("ssh: {}\n", e), 255).into(),
        };

        let mut exec = ExecutionContext::new(user.clone());
        exec.current_path = "/".to_string();
        self.state.remote = Some(RemoteSession {
            host: host.clone(),
            user: user.clone(),
            started_at: Utc::now(),
            exec,
            fs: view,
            config: self.config.clone().hostname(host.clone()).username(user.clone()),
        });

        #[cfg(feature = "logging")]
        tracing::info!(host = %host, user = %user, "remote session opened");

        let mut banner = remote.banner.clone();
        if !banner.is_empty() && !banner.ends_with('\n') {
            banner.push('\n');
        }
        ClaimOutput {
            result: ExecResult::ok(banner),
            intent: Some(Intent::OpenRemote {
                host,
                user,
                banner: remote.banner,
            }),
        }
    }

    /// The remote user's tree. Every host the user reaches shares it, and
    /// each host's files are seeded into it on the first visit.
    async fn remote_view(
        &mut self,
        user: &str,
        host_name: &str,
        host: &RemoteHost,
    ) -> Result<Arc<RemappedFs>> {
        let root = remote_root(user);
        let inner: Arc<dyn FileSystem> = self.fs.clone();
        let view = Arc::new(RemappedFs::new(inner, root.clone()));
        if !self.fs.exists(&root).await {
            // A restored filesystem lost every seeded tree for this user.
            self.seeded_hosts.retain(|(seeded_user, _)| seeded_user != user);
            self.fs.mkdir_tree(&root).await?;
            view.mkdir_tree(&path::home_dir(user)).await?;
        }
        if self
            .seeded_hosts
            .insert((user.to_string(), host_name.to_string()))
        {
            #[cfg(feature = "logging")]
            tracing::debug!(host = %host_name, user = %user, "seeding remote tree");
            adventure::populate(view.as_ref(), "/", &host.filesystem, user).await?;
        }
        Ok(view)
    }

    async fn scp(&mut self, args: &[String], exec: &ExecutionContext) -> ExecResult {
        let parsed = match flags::parse(args, &FlagSpec::SWITCHES) {
            Ok(parsed) => parsed,
            Err(_) => return scp_usage(),
        };
        if let Some(c) = parsed.unknown_switch(&['r', 'p', 'q']) {
            return ExecResult::err(format!("scp: unknown option -- {}\n", c), 1);
        }
        let recursive = parsed.has(&['r']);
        let [source, dest] = parsed.positional.as_slice() else {
            return scp_usage();
        };

        let default_user = self.config.username.clone();
        let src = parse_scp_operand(source, &default_user);
        let dst = parse_scp_operand(dest, &default_user);
        let (from, to) = match (&src, &dst) {
            (ScpOperand::Local(_), ScpOperand::Local(_))
            | (ScpOperand::Remote { .. }, ScpOperand::Remote { .. }) => {
                return ExecResult::err(
                    "scp: exactly one side must be remote ([user@]host:path)\n",
                    1,
                );
            }
            _ => match (self.scp_path(&src, exec).await, self.scp_path(&dst, exec).await) {
                (Ok(from), Ok(to)) => (from, to),
                (Err(failure), _) | (_, Err(failure)) => return failure,
            },
        };

        let Some(meta) = self.fs.stat(&from).await else {
            return ExecResult::err(
                format!("scp: {}: No such file or directory\n", source),
                1,
            );
        };
        if meta.file_type.is_dir() && !recursive {
            return ExecResult::err(format!("scp: {}: not a regular file\n", source), 1);
        }
        if matches!(src, ScpOperand::Local(_)) && meta.is_root_owned() && !exec.is_sudo {
            return ExecResult::err(format!("scp: {}: Permission denied\n", source), 1);
        }

        let name = path::file_name(&from).to_string();
        let target = match self.fs.stat(&to).await {
            Some(m) if m.file_type.is_dir() => path::join(&to, &name),
            _ => to,
        };
        if matches!(dst, ScpOperand::Local(_))
            && !exec.is_sudo
            && nearest_existing(self.fs.as_ref(), &target)
                .await
                .is_some_and(|m| m.is_root_owned())
        {
            return ExecResult::err(format!("scp: {}: Permission denied\n", dest), 1);
        }

        let owner = match &dst {
            ScpOperand::Local(_) => exec.clone(),
            ScpOperand::Remote { user, .. } => ExecutionContext::new(*user),
        };
        let fs = self.fs.as_ref() as &dyn FileSystem;
        let missing = topmost_missing(fs, &target).await;
        let copied = match fs.copy(&from, &target, recursive).await {
            Ok(()) => claim_created(fs, &owner, missing.as_deref()).await,
            Err(e) => Err(e),
        };
        match copied {
            Ok(()) => ExecResult::ok(format!("{:<32} 100% {:>8}\n", name, meta.size)),
            Err(e) => ExecResult::err(format!("scp: {}: {}\n", dest, e), 1),
        }
    }

    /// Inner-filesystem path of one side of a transfer.
    async fn scp_path(
        &mut self,
        operand: &ScpOperand<'_>,
        exec: &ExecutionContext,
    ) -> std::result::Result<String, ExecResult> {
        match operand {
            ScpOperand::Local(local) => Ok(exec.resolve(local)),
            ScpOperand::Remote { user, host, path } => {
                let Some(remote) = self.responder.lookup(host) else {
                    return Err(ExecResult::err(
                        format!("ssh: Could not resolve hostname {}\n", host),
                        255,
                    ));
                };
                let view = self
                    .remote_view(user, host, &remote)
                    .await
                    .map_err(|e| ExecResult::err(format!("scp: {}\n", e), 1))?;
                let home = path::home_dir(user);
                let resolved = if path.is_empty() {
                    home
                } else {
                    path::resolve(&home, path, user)
                };
                Ok(view.to_inner(&resolved))
            }
        }
    }
}

fn scp_usage() -> ExecResult {
    ExecResult::err("usage: scp [-r] source target\n", 1)
}
