//! Session and terminal builtins (whoami, hostname, date, history, clear, exit)

use async_trait::async_trait;
use chrono::Local;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The whoami builtin - print the effective user.
pub struct Whoami;

#[async_trait]
impl Builtin for Whoami {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(format!("{}\n", ctx.exec.effective_user())))
    }
}

/// The hostname builtin - print the configured machine name.
pub struct Hostname;

#[async_trait]
impl Builtin for Hostname {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        if !ctx.args.is_empty() && !ctx.exec.is_sudo {
            return Ok(ExecResult::err(
                "hostname: you must be root to change the host name\n",
                1,
            ));
        }
        Ok(ExecResult::ok(format!("{}\n", ctx.config.hostname)))
    }
}

/// The date builtin - print the current local time.
///
/// Usage: date [+FORMAT]
///
/// FORMAT uses strftime directives.
pub struct Date;

#[async_trait]
impl Builtin for Date {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let now = Local::now();
        let format = match ctx.args.first() {
            Some(arg) => match arg.strip_prefix('+') {
                Some(fmt) => fmt,
                None => {
                    return Ok(ExecResult::err(
                        format!("date: invalid date '{}'\n", arg),
                        1,
                    ));
                }
            },
            None => "%a %b %e %H:%M:%S %Z %Y",
        };

        let mut rendered = String::new();
        if std::fmt::write(&mut rendered, format_args!("{}", now.format(format))).is_err() {
            return Ok(ExecResult::err(
                format!("date: invalid format '{}'\n", format),
                1,
            ));
        }
        rendered.push('\n');
        Ok(ExecResult::ok(rendered))
    }
}

/// The history builtin - list this session's commands.
///
/// Usage: history [N]
pub struct History;

#[async_trait]
impl Builtin for History {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let count = match ctx.args.first() {
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => {
                    return Ok(ExecResult::err(
                        format!("history: {}: numeric argument required\n", arg),
                        1,
                    ));
                }
            },
            None => None,
        };

        let skip = count.map_or(0, |n| ctx.history.len().saturating_sub(n));
        let output = ctx
            .history
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, line)| format!("{:>5}  {}\n", i + 1, line))
            .collect::<String>();
        Ok(ExecResult::ok(output))
    }
}

/// The clear builtin - ask the terminal to clear the screen.
pub struct Clear;

#[async_trait]
impl Builtin for Clear {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult {
            clear_screen: true,
            ..ExecResult::default()
        })
    }
}

/// The exit builtin outside a remote session.
///
/// A learner's local shell cannot be closed from inside; it just says so.
pub struct Exit;

#[async_trait]
impl Builtin for Exit {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok("logout\n"))
    }
}
