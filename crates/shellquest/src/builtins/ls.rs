//! Directory listing builtins - ls, find, rmdir

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

use super::flags::{self, FlagSpec};
use super::{Builtin, Context};
use crate::error::Result;
use crate::fs::Metadata;
use crate::interpreter::ExecResult;
use crate::path;

/// Options for ls command
struct LsOptions {
    long: bool,
    all: bool,
    recursive: bool,
}

/// The ls builtin - list directory contents.
///
/// Usage: ls [-l] [-a] [-1] [-R] [PATH...]
///
/// Options:
///   -l   Use long listing format
///   -a   Show hidden files (starting with .)
///   -1   One entry per line (always the case here)
///   -R   List subdirectories recursively
pub struct Ls;

#[async_trait]
impl Builtin for Ls {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match flags::parse(ctx.args, &FlagSpec::SWITCHES) {
            Ok(p) => p,
            Err(opt) => {
                return Ok(ExecResult::err(
                    format!("ls: option requires an argument -- '{}'\n", opt),
                    2,
                ));
            }
        };
        if let Some(c) = parsed.unknown_switch(&['l', 'a', '1', 'R']) {
            return Ok(ExecResult::err(format!("ls: invalid option -- '{}'\n", c), 2));
        }
        let opts = LsOptions {
            long: parsed.has(&['l']),
            all: parsed.has(&['a']),
            recursive: parsed.has(&['R']),
        };

        let mut paths: Vec<&str> = parsed.positional.iter().map(String::as_str).collect();
        if paths.is_empty() {
            paths.push(".");
        }

        let mut listing = Listing::default();
        let show_headers = paths.len() > 1 || opts.recursive;

        for (i, operand) in paths.iter().enumerate() {
            let path = ctx.resolve(operand);

            let Some(metadata) = ctx.fs.stat(&path).await else {
                listing.fail(
                    format!("ls: cannot access '{}': No such file or directory\n", operand),
                    2,
                );
                continue;
            };
            if let Some(denied) = ctx.deny_read("ls", operand, &path).await {
                listing.fail(denied.stderr, denied.exit_code);
                continue;
            }

            if metadata.file_type.is_file() {
                listing.entry(operand, &metadata, &opts);
            } else {
                list_directory(&ctx, &path, operand, &mut listing, &opts, show_headers, i > 0)
                    .await;
            }
        }

        Ok(ExecResult {
            stdout: listing.stdout,
            stderr: listing.stderr,
            exit_code: listing.exit_code,
            ..ExecResult::default()
        })
    }
}

#[derive(Default)]
struct Listing {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl Listing {
    fn fail(&mut self, message: String, code: i32) {
        self.stderr.push_str(&message);
        self.exit_code = self.exit_code.max(code);
    }

    fn entry(&mut self, name: &str, metadata: &Metadata, opts: &LsOptions) {
        if opts.long {
            self.stdout.push_str(&format_long_entry(name, metadata));
        } else {
            self.stdout.push_str(name);
            self.stdout.push('\n');
        }
    }
}

fn list_directory<'a>(
    ctx: &'a Context<'_>,
    path: &'a str,
    display_path: &'a str,
    listing: &'a mut Listing,
    opts: &'a LsOptions,
    show_header: bool,
    add_newline: bool,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if add_newline {
            listing.stdout.push('\n');
        }
        if show_header {
            listing.stdout.push_str(&format!("{}:\n", display_path));
        }

        let mut entries = match ctx.fs.read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => {
                listing.fail(
                    format!("ls: cannot open directory '{}': {}\n", display_path, e),
                    2,
                );
                return;
            }
        };
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut subdirs: Vec<(String, String)> = Vec::new();
        for entry in entries.iter().filter(|e| opts.all || !e.name.starts_with('.')) {
            listing.entry(&entry.name, &entry.metadata, opts);
            if opts.recursive && entry.metadata.file_type.is_dir() {
                subdirs.push((
                    path::join(path, &entry.name),
                    path::join(display_path, &entry.name),
                ));
            }
        }

        for (subpath, display) in subdirs {
            if let Some(denied) = ctx.deny_read("ls", &display, &subpath).await {
                listing.stdout.push_str(&format!("\n{}:\n", display));
                listing.fail(denied.stderr, denied.exit_code);
                continue;
            }
            list_directory(ctx, &subpath, &display, listing, opts, true, true).await;
        }
    })
}

fn format_long_entry(name: &str, metadata: &Metadata) -> String {
    format!(
        "{} 1 {:<8} {:>8} {} {}\n",
        metadata.mode_string(),
        metadata.owner,
        metadata.size,
        metadata.modified.format("%b %e %H:%M"),
        name
    )
}

/// Options for find command
struct FindOptions {
    name_pattern: Option<String>,
    type_filter: Option<char>,
    max_depth: Option<usize>,
}

/// The find builtin - search for files.
///
/// Usage: find [PATH...] [-name PATTERN] [-type TYPE] [-maxdepth N]
///
/// Options:
///   -name PATTERN   Match filename against PATTERN (supports * and ?)
///   -type TYPE      Match file type: f (file), d (directory)
///   -maxdepth N     Descend at most N levels
///   -print          Print matching paths (default)
pub struct Find;

#[async_trait]
impl Builtin for Find {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut paths: Vec<String> = Vec::new();
        let mut opts = FindOptions {
            name_pattern: None,
            type_filter: None,
            max_depth: None,
        };

        let mut args = ctx.args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-name" => {
                    let Some(pattern) = args.next() else {
                        return Ok(ExecResult::err("find: missing argument to '-name'\n", 1));
                    };
                    opts.name_pattern = Some(pattern.clone());
                }
                "-type" => {
                    let Some(t) = args.next() else {
                        return Ok(ExecResult::err("find: missing argument to '-type'\n", 1));
                    };
                    opts.type_filter = match t.as_str() {
                        "f" => Some('f'),
                        "d" => Some('d'),
                        _ => {
                            return Ok(ExecResult::err(
                                format!("find: unknown argument to -type: {}\n", t),
                                1,
                            ));
                        }
                    };
                }
                "-maxdepth" => {
                    let Some(n) = args.next() else {
                        return Ok(ExecResult::err(
                            "find: missing argument to '-maxdepth'\n",
                            1,
                        ));
                    };
                    match n.parse::<usize>() {
                        Ok(n) => opts.max_depth = Some(n),
                        Err(_) => {
                            return Ok(ExecResult::err(
                                format!("find: invalid maxdepth value '{}'\n", n),
                                1,
                            ));
                        }
                    }
                }
                "-print" => {}
                s if s.starts_with('-') => {
                    return Ok(ExecResult::err(
                        format!("find: unknown predicate '{}'\n", s),
                        1,
                    ));
                }
                _ => paths.push(arg.clone()),
            }
        }

        if paths.is_empty() {
            paths.push(".".to_string());
        }

        let mut listing = Listing::default();
        for operand in &paths {
            let path = ctx.resolve(operand);
            if !ctx.fs.exists(&path).await {
                listing.fail(
                    format!("find: '{}': No such file or directory\n", operand),
                    1,
                );
                continue;
            }
            find_recursive(&ctx, &path, operand, &opts, 0, &mut listing).await;
        }

        Ok(ExecResult {
            stdout: listing.stdout,
            stderr: listing.stderr,
            exit_code: listing.exit_code,
            ..ExecResult::default()
        })
    }
}

fn find_recursive<'a>(
    ctx: &'a Context<'_>,
    path: &'a str,
    display_path: &'a str,
    opts: &'a FindOptions,
    current_depth: usize,
    listing: &'a mut Listing,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let Some(metadata) = ctx.fs.stat(path).await else {
            return;
        };

        let type_matches = match opts.type_filter {
            Some('f') => metadata.file_type.is_file(),
            Some('d') => metadata.file_type.is_dir(),
            _ => true,
        };
        let name_matches = match &opts.name_pattern {
            Some(pattern) => glob_match(path::file_name(display_path), pattern),
            None => true,
        };
        if type_matches && name_matches {
            listing.stdout.push_str(display_path);
            listing.stdout.push('\n');
        }

        if !metadata.file_type.is_dir() {
            return;
        }
        if opts.max_depth.is_some_and(|max| current_depth >= max) {
            return;
        }
        if !ctx.exec.is_sudo && metadata.is_root_owned() {
            listing.fail(
                format!("find: '{}': Permission denied\n", display_path),
                1,
            );
            return;
        }

        let Ok(mut entries) = ctx.fs.read_dir(path).await else {
            return;
        };
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        for entry in entries {
            let child_path = path::join(path, &entry.name);
            let child_display = if display_path.ends_with('/') {
                format!("{}{}", display_path, entry.name)
            } else {
                format!("{}/{}", display_path, entry.name)
            };
            find_recursive(
                ctx,
                &child_path,
                &child_display,
                opts,
                current_depth + 1,
                listing,
            )
            .await;
        }
    })
}

/// Simple glob pattern matching for find -name
pub(crate) fn glob_match(value: &str, pattern: &str) -> bool {
    let mut value_chars = value.chars().peekable();
    let mut pattern_chars = pattern.chars().peekable();

    loop {
        match (pattern_chars.peek(), value_chars.peek()) {
            (None, None) => return true,
            (None, Some(_)) => return false,
            (Some('*'), _) => {
                pattern_chars.next();
                if pattern_chars.peek().is_none() {
                    return true;
                }
                while value_chars.peek().is_some() {
                    let remaining_value: String = value_chars.clone().collect();
                    let remaining_pattern: String = pattern_chars.clone().collect();
                    if glob_match(&remaining_value, &remaining_pattern) {
                        return true;
                    }
                    value_chars.next();
                }
                let remaining_pattern: String = pattern_chars.collect();
                return glob_match("", &remaining_pattern);
            }
            (Some('?'), Some(_)) => {
                pattern_chars.next();
                value_chars.next();
            }
            (Some('?'), None) => return false,
            (Some(p), Some(v)) => {
                if *p == *v {
                    pattern_chars.next();
                    value_chars.next();
                } else {
                    return false;
                }
            }
            (Some(_), None) => return false,
        }
    }
}

/// The rmdir builtin - remove empty directories.
///
/// Usage: rmdir [-p] DIRECTORY...
///
/// Options:
///   -p   Remove parent directories as well if they become empty
pub struct Rmdir;

#[async_trait]
impl Builtin for Rmdir {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match flags::parse(ctx.args, &FlagSpec::SWITCHES) {
            Ok(p) => p,
            Err(_) => return Ok(ExecResult::err("rmdir: missing operand\n", 1)),
        };
        if parsed.positional.is_empty() {
            return Ok(ExecResult::err("rmdir: missing operand\n", 1));
        }
        let parents = parsed.has(&['p']);

        for dir in &parsed.positional {
            let path = ctx.resolve(dir);
            if path == "/" || path == ctx.exec.current_path {
                return Ok(ExecResult::err(
                    format!("rmdir: failed to remove '{}': Device or resource busy\n", dir),
                    1,
                ));
            }
            if let Some(denied) = ctx.deny_write("rmdir", dir, &path).await {
                return Ok(denied);
            }

            if let Err(e) = ctx.fs.rmdir(&path).await {
                return Ok(ExecResult::err(
                    format!("rmdir: failed to remove '{}': {}\n", dir, e),
                    1,
                ));
            }

            if parents {
                let mut current = path::parent_of(&path).to_string();
                while current != "/" && current != ctx.exec.current_path {
                    if ctx.deny_write("rmdir", dir, &current).await.is_some()
                        || ctx.fs.rmdir(&current).await.is_err()
                    {
                        break;
                    }
                    current = path::parent_of(&current).to_string();
                }
            }
        }

        Ok(ExecResult::ok(String::new()))
    }
}
