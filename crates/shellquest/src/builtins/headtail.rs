//! Head and tail builtins - output first/last lines of input

use async_trait::async_trait;

use super::flags::{self, FlagSpec};
use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// Default number of lines to output
const DEFAULT_LINES: usize = 10;

const HEAD_TAIL_FLAGS: FlagSpec = FlagSpec {
    value_options: &["-n"],
    numeric_shorthand: true,
};

/// The head builtin - output the first N lines of input.
///
/// Usage: head [-n NUM] [FILE...]
///
/// Options:
///   -n NUM   Output the first NUM lines (default: 10)
///   -NUM     Shorthand for -n NUM
pub struct Head;

#[async_trait]
impl Builtin for Head {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        run_head_tail("head", &ctx, take_first_lines).await
    }
}

/// The tail builtin - output the last N lines of input.
///
/// Usage: tail [-n NUM] [FILE...]
///
/// Options:
///   -n NUM   Output the last NUM lines (default: 10)
///   -NUM     Shorthand for -n NUM
pub struct Tail;

#[async_trait]
impl Builtin for Tail {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        run_head_tail("tail", &ctx, take_last_lines).await
    }
}

async fn run_head_tail(
    cmd: &str,
    ctx: &Context<'_>,
    select: fn(&str, usize) -> String,
) -> Result<ExecResult> {
    let parsed = match flags::parse(ctx.args, &HEAD_TAIL_FLAGS) {
        Ok(p) => p,
        Err(opt) => {
            return Ok(ExecResult::err(
                format!("{}: option requires an argument -- '{}'\n", cmd, &opt[1..]),
                1,
            ));
        }
    };
    let num_lines = match parsed.value("-n") {
        Some(raw) => match raw.trim_start_matches('+').parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                return Ok(ExecResult::err(
                    format!("{}: invalid number of lines: '{}'\n", cmd, raw),
                    1,
                ));
            }
        },
        None => parsed.count.unwrap_or(DEFAULT_LINES),
    };

    let files = &parsed.positional;
    if files.is_empty() {
        return Ok(ExecResult::ok(select(
            ctx.stdin.unwrap_or_default(),
            num_lines,
        )));
    }

    let mut result = ExecResult::default();
    let multiple_files = files.len() > 1;
    for (i, file) in files.iter().enumerate() {
        match ctx.read_text(cmd, file).await {
            Ok(text) => {
                if multiple_files {
                    if i > 0 {
                        result.stdout.push('\n');
                    }
                    result.stdout.push_str(&format!("==> {} <==\n", file));
                }
                result.stdout.push_str(&select(&text, num_lines));
            }
            Err(failure) => {
                result.stderr.push_str(&failure.stderr);
                result.exit_code = 1;
            }
        }
    }
    Ok(result)
}

/// Take the first N lines from text
fn take_first_lines(text: &str, n: usize) -> String {
    text.split_inclusive('\n').take(n).collect()
}

/// Take the last N lines from text
fn take_last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].concat()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builtins::testing::Harness;
    use crate::fs::FileSystem;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line{}\n", i)).collect()
    }

    #[tokio::test]
    async fn test_head_default_ten() {
        let h = Harness::new();
        let text = numbered(15);
        let result = h.run_with_stdin(&Head, &[], Some(&text)).await;
        assert_eq!(result.stdout, numbered(10));
    }

    #[tokio::test]
    async fn test_head_n_forms() {
        let h = Harness::new();
        h.fs.write_file("/home/student/f", numbered(5).as_bytes())
            .await
            .unwrap();
        let expected = "line1\nline2\n";
        assert_eq!(h.run(&Head, &["-n", "2", "f"]).await.stdout, expected);
        assert_eq!(h.run(&Head, &["-n2", "f"]).await.stdout, expected);
        assert_eq!(h.run(&Head, &["-2", "f"]).await.stdout, expected);
    }

    #[tokio::test]
    async fn test_tail_last_lines() {
        let h = Harness::new();
        h.fs.write_file("/home/student/f", numbered(5).as_bytes())
            .await
            .unwrap();
        assert_eq!(h.run(&Tail, &["-3", "f"]).await.stdout, "line3\nline4\nline5\n");
    }

    #[tokio::test]
    async fn test_tail_without_trailing_newline() {
        assert_eq!(take_last_lines("a\nb", 1), "b");
        assert_eq!(take_first_lines("a\nb", 5), "a\nb");
    }

    #[tokio::test]
    async fn test_head_multiple_files_and_errors() {
        let h = Harness::new();
        h.fs.write_file("/home/student/a", b"1\n").await.unwrap();
        h.fs.write_file("/home/student/b", b"2\n").await.unwrap();

        let result = h.run(&Head, &["a", "b"]).await;
        assert_eq!(result.stdout, "==> a <==\n1\n\n==> b <==\n2\n");

        let result = h.run(&Head, &["nope"]).await;
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "head: nope: No such file or directory\n");

        let result = h.run(&Head, &["-n", "x", "a"]).await;
        assert!(result.stderr.contains("invalid number of lines"));
    }
}
