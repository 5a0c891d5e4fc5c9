//! grep - Pattern matching builtin
//!
//! Implements grep functionality using the regex crate. A pattern that is
//! not a valid regex is matched literally instead of failing.
//!
//! Usage:
//!   grep pattern file
//!   grep -i pattern file        # case insensitive
//!   grep -v pattern file        # invert match
//!   grep -n pattern file        # show line numbers
//!   grep -c pattern file        # count matches
//!   grep -o pattern file        # only show matching part
//!   grep -l pattern file1 file2 # list matching files
//!   grep -w pattern file        # whole words only
//!   grep -F pattern file        # fixed string match
//!   grep -r pattern dir         # search a directory tree

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::future::Future;
use std::pin::Pin;

use super::{Builtin, Context, fs_failure};
use crate::error::Result;
use crate::interpreter::ExecResult;
use crate::path;

/// grep command - pattern matching
pub struct Grep;

#[derive(Default)]
struct GrepOptions {
    pattern: Option<String>,
    files: Vec<String>,
    ignore_case: bool,
    invert_match: bool,
    line_numbers: bool,
    count_only: bool,
    files_with_matches: bool,
    fixed_strings: bool,
    only_matching: bool,
    word_regex: bool,
    recursive: bool,
}

impl GrepOptions {
    fn parse(args: &[String]) -> std::result::Result<Self, String> {
        let mut opts = GrepOptions::default();
        let mut positional = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                positional.extend(iter.by_ref().cloned());
                break;
            }
            let Some(letters) = arg.strip_prefix('-').filter(|l| !l.is_empty()) else {
                positional.push(arg.clone());
                continue;
            };
            for c in letters.chars() {
                match c {
                    'i' => opts.ignore_case = true,
                    'v' => opts.invert_match = true,
                    'n' => opts.line_numbers = true,
                    'c' => opts.count_only = true,
                    'l' => opts.files_with_matches = true,
                    'o' => opts.only_matching = true,
                    'w' => opts.word_regex = true,
                    'F' => opts.fixed_strings = true,
                    'r' | 'R' => opts.recursive = true,
                    'E' => {}
                    'e' => {
                        let pattern = iter
                            .next()
                            .ok_or_else(|| "option requires an argument -- 'e'".to_string())?;
                        opts.pattern = Some(pattern.clone());
                    }
                    other => return Err(format!("invalid option -- '{}'", other)),
                }
            }
        }

        if opts.pattern.is_none() {
            if positional.is_empty() {
                return Err("Usage: grep [OPTION]... PATTERNS [FILE]...".to_string());
            }
            opts.pattern = Some(positional.remove(0));
        }
        opts.files = positional;
        Ok(opts)
    }

    fn build_regex(&self) -> std::result::Result<Regex, regex::Error> {
        let raw = self.pattern.as_deref().unwrap_or_default();
        let build = |pattern: &str| {
            let pattern = if self.word_regex {
                format!(r"\b(?:{})\b", pattern)
            } else {
                pattern.to_string()
            };
            RegexBuilder::new(&pattern)
                .case_insensitive(self.ignore_case)
                .build()
        };

        if self.fixed_strings {
            build(&regex::escape(raw))
        } else {
            build(raw).or_else(|_| build(&regex::escape(raw)))
        }
    }
}

/// Collect every file beneath `dir`, sorted, with display names.
fn collect_files<'a>(
    ctx: &'a Context<'_>,
    dir: &'a str,
    display: &'a str,
    out: &'a mut Vec<(String, String)>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if !ctx.exec.is_sudo && ctx.fs.stat(dir).await.is_some_and(|m| m.is_root_owned()) {
            return;
        }
        let Ok(mut entries) = ctx.fs.read_dir(dir).await else {
            return;
        };
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for entry in entries {
            let child = path::join(dir, &entry.name);
            let child_display = format!("{}/{}", display.trim_end_matches('/'), entry.name);
            if entry.metadata.file_type.is_dir() {
                collect_files(ctx, &child, &child_display, out).await;
            } else {
                out.push((child, child_display));
            }
        }
    })
}

#[async_trait]
impl Builtin for Grep {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let opts = match GrepOptions::parse(ctx.args) {
            Ok(opts) => opts,
            Err(message) => return Ok(ExecResult::err(format!("grep: {}\n", message), 2)),
        };
        let regex = match opts.build_regex() {
            Ok(regex) => regex,
            Err(e) => return Ok(ExecResult::err(format!("grep: {}\n", e), 2)),
        };

        let mut stderr = String::new();
        let mut inputs: Vec<(String, String)> = Vec::new();

        if opts.files.is_empty() {
            let name = if opts.files_with_matches { "(standard input)" } else { "" };
            inputs.push((name.to_string(), ctx.stdin.unwrap_or_default().to_string()));
        }

        let mut targets: Vec<(String, String)> = Vec::new();
        for file in &opts.files {
            let path = ctx.resolve(file);
            match ctx.fs.stat(&path).await {
                Some(meta) if meta.file_type.is_dir() => {
                    if opts.recursive {
                        collect_files(&ctx, &path, file, &mut targets).await;
                    } else {
                        stderr.push_str(&format!("grep: {}: Is a directory\n", file));
                    }
                }
                _ => targets.push((path, file.clone())),
            }
        }

        for (path, display) in &targets {
            if let Some(denied) = ctx.deny_read("grep", display, path).await {
                stderr.push_str(&denied.stderr);
                continue;
            }
            match ctx.fs.read_file(path).await {
                Ok(content) => {
                    inputs.push((display.clone(), String::from_utf8_lossy(&content).into_owned()))
                }
                Err(e) => stderr.push_str(&fs_failure("grep", display, &e).stderr),
            }
        }

        let show_filename = opts.files.len() > 1 || opts.recursive;
        let mut output = String::new();
        let mut any_match = false;

        for (filename, content) in &inputs {
            let mut match_count = 0;

            for (line_num, line) in content.lines().enumerate() {
                let prefix = {
                    let mut p = String::new();
                    if show_filename {
                        p.push_str(filename);
                        p.push(':');
                    }
                    if opts.line_numbers {
                        p.push_str(&format!("{}:", line_num + 1));
                    }
                    p
                };

                if opts.only_matching && !opts.invert_match {
                    for mat in regex.find_iter(line) {
                        match_count += 1;
                        if !opts.count_only && !opts.files_with_matches {
                            output.push_str(&format!("{}{}\n", prefix, mat.as_str()));
                        }
                    }
                    continue;
                }

                if regex.is_match(line) != opts.invert_match {
                    match_count += 1;
                    if opts.files_with_matches {
                        break;
                    }
                    if !opts.count_only {
                        output.push_str(&format!("{}{}\n", prefix, line));
                    }
                }
            }

            any_match |= match_count > 0;
            if opts.files_with_matches {
                if match_count > 0 {
                    output.push_str(filename);
                    output.push('\n');
                }
            } else if opts.count_only {
                if show_filename {
                    output.push_str(&format!("{}:{}\n", filename, match_count));
                } else {
                    output.push_str(&format!("{}\n", match_count));
                }
            }
        }

        let exit_code = match (any_match, stderr.is_empty()) {
            (true, _) => 0,
            (false, true) => 1,
            (false, false) => 2,
        };
        Ok(ExecResult {
            stdout: output,
            stderr,
            exit_code,
            ..ExecResult::default()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builtins::testing::Harness;
    use crate::fs::FileSystem;

    async fn harness() -> Harness {
        let h = Harness::new();
        h.fs.write_file(
            "/home/student/log.txt",
            b"INFO start\nERROR disk full\ninfo done\nERROR again\n",
        )
        .await
        .unwrap();
        h
    }

    #[tokio::test]
    async fn test_grep_basic() {
        let h = harness().await;
        let result = h.run(&Grep, &["ERROR", "log.txt"]).await;
        assert_eq!(result.stdout, "ERROR disk full\nERROR again\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_grep_no_match_exit_one() {
        let h = harness().await;
        let result = h.run(&Grep, &["WARN", "log.txt"]).await;
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_grep_flags() {
        let h = harness().await;
        assert_eq!(
            h.run(&Grep, &["-i", "info", "log.txt"]).await.stdout,
            "INFO start\ninfo done\n"
        );
        assert_eq!(h.run(&Grep, &["-c", "ERROR", "log.txt"]).await.stdout, "2\n");
        assert_eq!(
            h.run(&Grep, &["-n", "disk", "log.txt"]).await.stdout,
            "2:ERROR disk full\n"
        );
        assert_eq!(
            h.run(&Grep, &["-v", "ERROR", "log.txt"]).await.stdout,
            "INFO start\ninfo done\n"
        );
        assert_eq!(
            h.run(&Grep, &["-o", "ERR[A-Z]+", "log.txt"]).await.stdout,
            "ERROR\nERROR\n"
        );
    }

    #[tokio::test]
    async fn test_grep_invalid_regex_matches_literally() {
        let h = Harness::new();
        h.fs.write_file("/home/student/f", b"a(b\nab\n").await.unwrap();
        let result = h.run(&Grep, &["a(b", "f"]).await;
        assert_eq!(result.stdout, "a(b\n");
    }

    #[tokio::test]
    async fn test_grep_recursive() {
        let h = Harness::new();
        h.fs.mkdir_tree("/home/student/notes/old").await.unwrap();
        h.fs.write_file("/home/student/notes/a", b"key=1\n").await.unwrap();
        h.fs.write_file("/home/student/notes/old/b", b"key=2\nother\n")
            .await
            .unwrap();

        let result = h.run(&Grep, &["-r", "key", "notes"]).await;
        assert_eq!(result.stdout, "notes/a:key=1\nnotes/old/b:key=2\n");

        let result = h.run(&Grep, &["key", "notes"]).await;
        assert_eq!(result.stderr, "grep: notes: Is a directory\n");
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn test_grep_stdin_and_missing_pattern() {
        let h = Harness::new();
        let result = h.run_with_stdin(&Grep, &["b"], Some("a\nb\n")).await;
        assert_eq!(result.stdout, "b\n");

        let result = h.run(&Grep, &[]).await;
        assert_eq!(result.exit_code, 2);
    }
}
