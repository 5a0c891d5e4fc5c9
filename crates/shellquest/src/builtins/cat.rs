//! cat builtin command

use async_trait::async_trait;

use super::flags::{self, FlagSpec};
use super::{Builtin, Context, fs_failure};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The cat builtin command.
///
/// Usage: cat [-n] [FILE...]
///
/// With no operand (or `-`) it reads stdin, which a heredoc or `< file`
/// redirection provides.
pub struct Cat;

#[async_trait]
impl Builtin for Cat {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = flags::parse(ctx.args, &FlagSpec::SWITCHES).unwrap_or_default();
        if let Some(c) = parsed.unknown_switch(&['n']) {
            return Ok(ExecResult::err(format!("cat: invalid option -- '{}'\n", c), 1));
        }

        let mut raw = String::new();
        let mut result = ExecResult::default();

        if parsed.positional.is_empty() {
            raw.push_str(ctx.stdin.unwrap_or_default());
        }
        for file in &parsed.positional {
            if file == "-" {
                raw.push_str(ctx.stdin.unwrap_or_default());
                continue;
            }
            let path = ctx.resolve(file);
            if let Some(denied) = ctx.deny_read("cat", file, &path).await {
                result.stderr.push_str(&denied.stderr);
                result.exit_code = 1;
                continue;
            }
            match ctx.fs.read_file(&path).await {
                Ok(content) => raw.push_str(&String::from_utf8_lossy(&content)),
                Err(e) => {
                    result.stderr.push_str(&fs_failure("cat", file, &e).stderr);
                    result.exit_code = 1;
                }
            }
        }

        result.stdout = if parsed.has(&['n']) {
            number_lines(&raw)
        } else {
            raw
        };
        Ok(result)
    }
}

fn number_lines(text: &str) -> String {
    let mut numbered = String::with_capacity(text.len() + 8 * text.lines().count());
    for (i, line) in text.split_inclusive('\n').enumerate() {
        numbered.push_str(&format!("{:>6}\t{}", i + 1, line));
    }
    numbered
}
