//! Word count builtin - count lines, words and bytes

use async_trait::async_trait;

use super::flags::{self, FlagSpec};
use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The wc builtin - print newline, word, and byte counts.
///
/// Usage: wc [-lwc] [FILE...]
///
/// Options:
///   -l, --lines   Print the newline count
///   -w, --words   Print the word count
///   -c, --bytes   Print the byte count
///
/// With no options, prints lines, words, and bytes.
pub struct Wc;

/// Which columns to print
struct Columns {
    lines: bool,
    words: bool,
    bytes: bool,
}

#[derive(Default)]
struct TextCounts {
    lines: usize,
    words: usize,
    bytes: usize,
}

impl TextCounts {
    fn of(text: &str) -> Self {
        Self {
            lines: text.matches('\n').count(),
            words: text.split_whitespace().count(),
            bytes: text.len(),
        }
    }

    fn add(&mut self, other: &TextCounts) {
        self.lines += other.lines;
        self.words += other.words;
        self.bytes += other.bytes;
    }

    fn format(&self, columns: &Columns, name: Option<&str>) -> String {
        let mut line = String::new();
        for (enabled, value) in [
            (columns.lines, self.lines),
            (columns.words, self.words),
            (columns.bytes, self.bytes),
        ] {
            if enabled {
                line.push_str(&format!("{:>8}", value));
            }
        }
        if let Some(name) = name {
            line.push(' ');
            line.push_str(name);
        }
        line.push('\n');
        line
    }
}

#[async_trait]
impl Builtin for Wc {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = flags::parse(ctx.args, &FlagSpec::SWITCHES).unwrap_or_default();
        if let Some(c) = parsed.unknown_switch(&['l', 'w', 'c']) {
            return Ok(ExecResult::err(format!("wc: invalid option -- '{}'\n", c), 1));
        }
        let mut columns = Columns {
            lines: parsed.has(&['l']) || parsed.has_long("lines"),
            words: parsed.has(&['w']) || parsed.has_long("words"),
            bytes: parsed.has(&['c']) || parsed.has_long("bytes"),
        };
        if !columns.lines && !columns.words && !columns.bytes {
            columns = Columns {
                lines: true,
                words: true,
                bytes: true,
            };
        }

        let files = &parsed.positional;
        if files.is_empty() {
            let counts = TextCounts::of(ctx.stdin.unwrap_or_default());
            return Ok(ExecResult::ok(counts.format(&columns, None)));
        }

        let mut result = ExecResult::default();
        let mut total = TextCounts::default();
        for file in files {
            match ctx.read_text("wc", file).await {
                Ok(text) => {
                    let counts = TextCounts::of(&text);
                    total.add(&counts);
                    result.stdout.push_str(&counts.format(&columns, Some(file)));
                }
                Err(failure) => {
                    result.stderr.push_str(&failure.stderr);
                    result.exit_code = 1;
                }
            }
        }
        if files.len() > 1 {
            result.stdout.push_str(&total.format(&columns, Some("total")));
        }
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builtins::testing::Harness;
    use crate::fs::FileSystem;

    #[tokio::test]
    async fn test_wc_all_columns() {
        let h = Harness::new();
        h.fs.write_file("/home/student/f", b"one two\nthree\n").await.unwrap();
        let result = h.run(&Wc, &["f"]).await;
        assert_eq!(result.stdout, "       2       3      14 f\n");
    }

    #[tokio::test]
    async fn test_wc_lines_only_from_stdin() {
        let h = Harness::new();
        let result = h.run_with_stdin(&Wc, &["-l"], Some("a\nb\nc\n")).await;
        assert_eq!(result.stdout, "       3\n");
    }

    #[tokio::test]
    async fn test_wc_total() {
        let h = Harness::new();
        h.fs.write_file("/home/student/a", b"x\n").await.unwrap();
        h.fs.write_file("/home/student/b", b"y\nz\n").await.unwrap();
        let result = h.run(&Wc, &["-l", "a", "b"]).await;
        assert_eq!(result.stdout, "       1 a\n       2 b\n       3 total\n");
    }
}
