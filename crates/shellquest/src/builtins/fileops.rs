//! File operation builtins - mkdir, rm, cp, mv, touch, chmod, chown

use async_trait::async_trait;

use super::flags::{self, FlagSpec, ParsedArgs};
use super::{
    Builtin, Context, chown_tree, claim_created, fs_failure, operand_path, root_owned_descendant,
    topmost_missing,
};
use crate::error::{FsError, Result};
use crate::fs::{DEFAULT_DIR_MODE, FileSystem};
use crate::interpreter::ExecResult;
use crate::path;

fn switches(cmd: &str, args: &[String], allowed: &[char]) -> std::result::Result<ParsedArgs, ExecResult> {
    let parsed = flags::parse(args, &FlagSpec::SWITCHES)
        .map_err(|opt| ExecResult::err(format!("{}: invalid option -- '{}'\n", cmd, opt), 1))?;
    match parsed.unknown_switch(allowed) {
        Some(c) => Err(ExecResult::err(
            format!("{}: invalid option -- '{}'\n", cmd, c),
            1,
        )),
        None => Ok(parsed),
    }
}

/// The mkdir builtin - create directories.
///
/// Usage: mkdir [-p] DIRECTORY...
///
/// Options:
///   -p   Create parent directories as needed, no error if existing
pub struct Mkdir;

#[async_trait]
impl Builtin for Mkdir {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match switches("mkdir", ctx.args, &['p']) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        if parsed.positional.is_empty() {
            return Ok(ExecResult::err("mkdir: missing operand\n", 1));
        }
        let recursive = parsed.has(&['p']);

        for dir in &parsed.positional {
            let path = ctx.resolve(dir);
            if let Some(denied) = ctx.deny_write("mkdir", dir, &path).await {
                return Ok(denied);
            }

            let missing = topmost_missing(ctx.fs.as_ref(), &path).await;
            let created = if recursive {
                ctx.fs.mkdir_tree(&path).await
            } else {
                ctx.fs.mkdir(&path, DEFAULT_DIR_MODE).await
            };
            if let Err(e) = created {
                return Ok(ExecResult::err(
                    format!("mkdir: cannot create directory '{}': {}\n", dir, e),
                    1,
                ));
            }
            claim_created(ctx.fs.as_ref(), ctx.exec, missing.as_deref()).await?;
        }

        Ok(ExecResult::ok(String::new()))
    }
}

/// The rm builtin - remove files or directories.
///
/// Usage: rm [-rf] FILE...
///
/// Options:
///   -r, -R   Remove directories and their contents recursively
///   -f       Ignore nonexistent files
///
/// Recursive removal does not need `-f`.
pub struct Rm;

#[async_trait]
impl Builtin for Rm {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match switches("rm", ctx.args, &['r', 'R', 'f', 'i', 'v']) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let recursive = parsed.has(&['r', 'R']) || parsed.has_long("recursive");
        let force = parsed.has(&['f']) || parsed.has_long("force");

        if parsed.positional.is_empty() {
            if force {
                return Ok(ExecResult::ok(String::new()));
            }
            return Ok(ExecResult::err("rm: missing operand\n", 1));
        }

        let mut result = ExecResult::ok(String::new());
        for file in &parsed.positional {
            let path = ctx.resolve(file);

            if recursive && path == "/" {
                return Ok(ExecResult::err(
                    "rm: it is dangerous to operate recursively on '/'\n",
                    1,
                ));
            }

            let Some(meta) = ctx.fs.stat(&path).await else {
                if !force {
                    result.stderr.push_str(&format!(
                        "rm: cannot remove '{}': No such file or directory\n",
                        file
                    ));
                    result.exit_code = 1;
                }
                continue;
            };

            if let Some(denied) = ctx.deny_write("rm", file, &path).await {
                result.stderr.push_str(&denied.stderr);
                result.exit_code = 1;
                continue;
            }

            let removed = if meta.file_type.is_dir() {
                if !recursive {
                    result
                        .stderr
                        .push_str(&format!("rm: cannot remove '{}': Is a directory\n", file));
                    result.exit_code = 1;
                    continue;
                }
                if !ctx.exec.is_sudo {
                    if let Some(locked) = root_owned_descendant(ctx.fs.as_ref(), &path).await {
                        result.stderr.push_str(&format!(
                            "rm: cannot remove '{}': Permission denied\n",
                            operand_path(file, &path, &locked)
                        ));
                        result.exit_code = 1;
                        continue;
                    }
                }
                ctx.fs.remove_tree(&path).await
            } else {
                ctx.fs.unlink(&path).await
            };

            if let Err(e) = removed {
                result
                    .stderr
                    .push_str(&format!("rm: cannot remove '{}': {}\n", file, e));
                result.exit_code = 1;
            }
        }

        Ok(result)
    }
}

/// Where a copy or move of `source` lands.
async fn final_destination(fs: &dyn FileSystem, source: &str, dest_path: &str) -> String {
    match fs.stat(dest_path).await {
        Some(meta) if meta.file_type.is_dir() => path::join(dest_path, path::file_name(source)),
        _ => dest_path.to_string(),
    }
}

/// Split operands into sources and the destination.
fn sources_and_dest<'p>(
    cmd: &str,
    positional: &'p [String],
) -> std::result::Result<(&'p [String], &'p String), ExecResult> {
    match positional {
        [] => Err(ExecResult::err(format!("{}: missing file operand\n", cmd), 1)),
        [only] => Err(ExecResult::err(
            format!(
                "{}: missing destination file operand after '{}'\n",
                cmd, only
            ),
            1,
        )),
        [sources @ .., dest] => Ok((sources, dest)),
    }
}

/// The cp builtin - copy files and directories.
///
/// Usage: cp [-r] SOURCE... DEST
///
/// Options:
///   -r, -R   Copy directories recursively
pub struct Cp;

#[async_trait]
impl Builtin for Cp {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match switches("cp", ctx.args, &['r', 'R', 'f', 'v']) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let recursive = parsed.has(&['r', 'R']);
        let (sources, dest) = match sources_and_dest("cp", &parsed.positional) {
            Ok(split) => split,
            Err(e) => return Ok(e),
        };

        let dest_path = ctx.resolve(dest);
        let dest_is_dir = ctx
            .fs
            .stat(&dest_path)
            .await
            .is_some_and(|m| m.file_type.is_dir());
        if sources.len() > 1 && !dest_is_dir {
            return Ok(ExecResult::err(
                format!("cp: target '{}' is not a directory\n", dest),
                1,
            ));
        }

        for source in sources {
            let src_path = ctx.resolve(source);
            let Some(meta) = ctx.fs.stat(&src_path).await else {
                return Ok(ExecResult::err(
                    format!("cp: cannot stat '{}': No such file or directory\n", source),
                    1,
                ));
            };
            if let Some(denied) = ctx.deny_read("cp", source, &src_path).await {
                return Ok(denied);
            }
            if meta.file_type.is_dir() && !recursive {
                return Ok(ExecResult::err(
                    format!("cp: -r not specified; omitting directory '{}'\n", source),
                    1,
                ));
            }
            if meta.file_type.is_dir() && !ctx.exec.is_sudo {
                if let Some(locked) = root_owned_descendant(ctx.fs.as_ref(), &src_path).await {
                    return Ok(ExecResult::err(
                        format!(
                            "cp: cannot open '{}' for reading: Permission denied\n",
                            operand_path(source, &src_path, &locked)
                        ),
                        1,
                    ));
                }
            }

            let target = final_destination(ctx.fs.as_ref(), &src_path, &dest_path).await;
            if meta.file_type.is_dir() && path::is_within(&target, &src_path) {
                return Ok(ExecResult::err(
                    format!(
                        "cp: cannot copy a directory, '{}', into itself, '{}'\n",
                        source, dest
                    ),
                    1,
                ));
            }
            if let Some(denied) = ctx.deny_write("cp", dest, &target).await {
                return Ok(denied);
            }

            let missing = topmost_missing(ctx.fs.as_ref(), &target).await;
            if let Err(e) = ctx.fs.copy(&src_path, &target, recursive).await {
                return Ok(ExecResult::err(
                    format!("cp: cannot copy '{}': {}\n", source, e),
                    1,
                ));
            }
            claim_created(ctx.fs.as_ref(), ctx.exec, missing.as_deref()).await?;
        }

        Ok(ExecResult::ok(String::new()))
    }
}

/// The mv builtin - move (rename) files.
///
/// Usage: mv SOURCE... DEST
pub struct Mv;

#[async_trait]
impl Builtin for Mv {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match switches("mv", ctx.args, &['f', 'v', 'i', 'n']) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let (sources, dest) = match sources_and_dest("mv", &parsed.positional) {
            Ok(split) => split,
            Err(e) => return Ok(e),
        };

        let dest_path = ctx.resolve(dest);
        let dest_is_dir = ctx
            .fs
            .stat(&dest_path)
            .await
            .is_some_and(|m| m.file_type.is_dir());
        if sources.len() > 1 && !dest_is_dir {
            return Ok(ExecResult::err(
                format!("mv: target '{}' is not a directory\n", dest),
                1,
            ));
        }

        for source in sources {
            let src_path = ctx.resolve(source);
            if !ctx.fs.exists(&src_path).await {
                return Ok(ExecResult::err(
                    format!("mv: cannot stat '{}': No such file or directory\n", source),
                    1,
                ));
            }
            if let Some(denied) = ctx.deny_write("mv", source, &src_path).await {
                return Ok(denied);
            }

            let target = final_destination(ctx.fs.as_ref(), &src_path, &dest_path).await;
            if let Some(denied) = ctx.deny_write("mv", dest, &target).await {
                return Ok(denied);
            }

            match ctx.fs.rename(&src_path, &target).await {
                Ok(()) => {}
                Err(FsError::InvalidArgument(_)) => {
                    return Ok(ExecResult::err(
                        format!(
                            "mv: cannot move '{}' to a subdirectory of itself, '{}'\n",
                            source, dest
                        ),
                        1,
                    ));
                }
                Err(e) => {
                    return Ok(ExecResult::err(
                        format!("mv: cannot move '{}' to '{}': {}\n", source, dest, e),
                        1,
                    ));
                }
            }
        }

        Ok(ExecResult::ok(String::new()))
    }
}

/// The touch builtin - change file timestamps or create empty files.
///
/// Usage: touch FILE...
pub struct Touch;

#[async_trait]
impl Builtin for Touch {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let files: Vec<_> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        if files.is_empty() {
            return Ok(ExecResult::err("touch: missing file operand\n", 1));
        }

        for file in files {
            let path = ctx.resolve(file);
            if let Some(denied) = ctx.deny_write("touch", file, &path).await {
                return Ok(denied);
            }
            let missing = topmost_missing(ctx.fs.as_ref(), &path).await;
            if let Err(e) = ctx.fs.touch(&path).await {
                return Ok(ExecResult::err(
                    format!("touch: cannot touch '{}': {}\n", file, e),
                    1,
                ));
            }
            claim_created(ctx.fs.as_ref(), ctx.exec, missing.as_deref()).await?;
        }

        Ok(ExecResult::ok(String::new()))
    }
}

/// The chmod builtin - change file mode bits.
///
/// Usage: chmod MODE FILE...
///
/// MODE can be octal (e.g., 755) or symbolic (e.g., u+x, a+r, go-w)
pub struct Chmod;

/// Parse a symbolic mode string and apply it to an existing mode.
/// Handles: [ugoa]*[+-=][rwxX]+ (comma-separated clauses).
/// Examples: +x, u+x, a+r, go-w, u=rwx, ug+rw
fn apply_symbolic_mode(mode_str: &str, current_mode: u32, is_dir: bool) -> Option<u32> {
    let mut mode = current_mode;

    for clause in mode_str.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            return None;
        }

        let mut chars = clause.chars().peekable();

        // No who means all (a)
        let (mut who_u, mut who_g, mut who_o) = (false, false, false);
        while let Some(&c) = chars.peek() {
            match c {
                'u' => who_u = true,
                'g' => who_g = true,
                'o' => who_o = true,
                'a' => (who_u, who_g, who_o) = (true, true, true),
                _ => break,
            }
            chars.next();
        }
        if !(who_u || who_g || who_o) {
            (who_u, who_g, who_o) = (true, true, true);
        }

        let op = chars.next()?;
        if !matches!(op, '+' | '-' | '=') {
            return None;
        }

        let mut perm_bits: u32 = 0;
        for c in chars {
            match c {
                'r' => perm_bits |= 0o4,
                'w' => perm_bits |= 0o2,
                'x' => perm_bits |= 0o1,
                'X' => {
                    if is_dir || current_mode & 0o111 != 0 {
                        perm_bits |= 0o1;
                    }
                }
                _ => return None,
            }
        }

        let mut mask: u32 = 0;
        let mut bits: u32 = 0;
        if who_u {
            mask |= 0o700;
            bits |= perm_bits << 6;
        }
        if who_g {
            mask |= 0o070;
            bits |= perm_bits << 3;
        }
        if who_o {
            mask |= 0o007;
            bits |= perm_bits;
        }

        match op {
            '+' => mode |= bits,
            '-' => mode &= !bits,
            _ => mode = (mode & !mask) | bits,
        }
    }

    Some(mode)
}

#[async_trait]
impl Builtin for Chmod {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let [mode_str, files @ ..] = ctx.args else {
            return Ok(ExecResult::err("chmod: missing operand\n", 1));
        };
        if files.is_empty() {
            return Ok(ExecResult::err(
                format!("chmod: missing operand after '{}'\n", mode_str),
                1,
            ));
        }
        let octal = u32::from_str_radix(mode_str, 8).ok().filter(|m| *m <= 0o7777);

        for file in files {
            let path = ctx.resolve(file);
            let Some(meta) = ctx.fs.stat(&path).await else {
                return Ok(ExecResult::err(
                    format!(
                        "chmod: cannot access '{}': No such file or directory\n",
                        file
                    ),
                    1,
                ));
            };
            if !ctx.exec.is_sudo && meta.is_root_owned() {
                return Ok(ExecResult::err(
                    format!(
                        "chmod: changing permissions of '{}': Operation not permitted\n",
                        file
                    ),
                    1,
                ));
            }

            let mode = match octal {
                Some(m) => m,
                None => match apply_symbolic_mode(
                    mode_str,
                    meta.permissions(),
                    meta.file_type.is_dir(),
                ) {
                    Some(m) => m,
                    None => {
                        return Ok(ExecResult::err(
                            format!("chmod: invalid mode: '{}'\n", mode_str),
                            1,
                        ));
                    }
                },
            };

            if let Err(e) = ctx.fs.chmod(&path, mode).await {
                return Ok(fs_failure("chmod", file, &e));
            }
        }

        Ok(ExecResult::ok(String::new()))
    }
}

/// The chown builtin - change file owner.
///
/// Usage: chown [-R] OWNER[:GROUP] FILE...
///
/// Only root may give files away, so this always needs sudo. The group part
/// is accepted and ignored.
pub struct Chown;

#[async_trait]
impl Builtin for Chown {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let parsed = match switches("chown", ctx.args, &['R', 'v']) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let [spec, files @ ..] = parsed.positional.as_slice() else {
            return Ok(ExecResult::err("chown: missing operand\n", 1));
        };
        if files.is_empty() {
            return Ok(ExecResult::err(
                format!("chown: missing operand after '{}'\n", spec),
                1,
            ));
        }
        let owner = spec.split(':').next().unwrap_or_default();
        if owner.is_empty() {
            return Ok(ExecResult::err(
                format!("chown: invalid user: '{}'\n", spec),
                1,
            ));
        }

        for file in files {
            let path = ctx.resolve(file);
            if !ctx.fs.exists(&path).await {
                return Ok(ExecResult::err(
                    format!(
                        "chown: cannot access '{}': No such file or directory\n",
                        file
                    ),
                    1,
                ));
            }
            if !ctx.exec.is_sudo {
                return Ok(ExecResult::err(
                    format!(
                        "chown: changing ownership of '{}': Operation not permitted\n",
                        file
                    ),
                    1,
                ));
            }

            let changed = if parsed.has(&['R']) {
                chown_tree(ctx.fs.as_ref(), &path, owner).await
            } else {
                ctx.fs.chown(&path, owner).await
            };
            if let Err(e) = changed {
                return Ok(fs_failure("chown", file, &e));
            }
        }

        Ok(ExecResult::ok(String::new()))
    }
}
