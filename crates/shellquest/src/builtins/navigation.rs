//! Navigation builtins (cd, pwd)

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The cd builtin - change directory.
///
/// With no operand, goes home. The new directory is reported through
/// [`ExecResult::new_path`]; the caller updates the execution context.
pub struct Cd;

#[async_trait]
impl Builtin for Cd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let target = ctx.args.first().map(|s| s.as_str()).unwrap_or("~");
        if ctx.args.len() > 1 {
            return Ok(ExecResult::err("cd: too many arguments\n", 1));
        }

        let path = ctx.resolve(target);
        match ctx.fs.stat(&path).await {
            Some(meta) if meta.file_type.is_dir() => {
                if let Some(denied) = ctx.deny_read("cd", target, &path).await {
                    return Ok(denied);
                }
                Ok(ExecResult::change_dir(path))
            }
            Some(_) => Ok(ExecResult::err(
                format!("cd: {}: Not a directory\n", target),
                1,
            )),
            None => Ok(ExecResult::err(
                format!("cd: {}: No such file or directory\n", target),
                1,
            )),
        }
    }
}

/// The pwd builtin - print working directory.
pub struct Pwd;

#[async_trait]
impl Builtin for Pwd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(format!("{}\n", ctx.exec.current_path)))
    }
}
