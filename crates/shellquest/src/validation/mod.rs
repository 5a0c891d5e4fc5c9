//! Task validation
//!
//! A [`Validator`] is a named predicate over one command's result and the
//! filesystem it left behind. Tasks name a validator (`outputCheck`) and its
//! parameters (`outputCheckParams`) in the adventure definition; both are
//! parsed once, up front, into this closed enum.

mod progress;

pub use progress::{ProgressEvent, ProgressState, ProgressTracker};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, parse_permission_string};
use crate::interpreter::CommandName;
use crate::path;

/// Everything a validator may look at.
pub struct ValidationContext<'a> {
    /// The command line as typed
    pub command: &'a str,
    /// Standard output before any redirection
    pub stdout: &'a str,
    pub stderr: &'a str,
    pub exit_code: i32,
    /// Working directory after the command
    pub cwd: &'a str,
    /// Learner account; relative validator paths resolve against its home
    pub username: &'a str,
    /// Filesystem after the command
    pub fs: &'a dyn FileSystem,
}

impl ValidationContext<'_> {
    /// stdout without its trailing newlines, which patterns anchor against.
    pub fn output(&self) -> &str {
        self.stdout.trim_end_matches('\n')
    }

    fn resolve(&self, target: &str) -> String {
        path::resolve(&path::home_dir(self.username), target, self.username)
    }

    async fn read(&self, target: &str) -> Option<String> {
        let content = self.fs.read_file(&self.resolve(target)).await.ok()?;
        Some(String::from_utf8_lossy(&content).into_owned())
    }
}

/// A named check.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "check", content = "params", rename_all = "camelCase")]
pub enum Validator {
    /// stdout contains `text`
    Contains { text: String },
    /// stdout contains every item
    ContainsAll { items: Vec<String> },
    /// stdout equals `text`, ignoring surrounding whitespace
    Equals { text: String },
    /// stdout has between `min` and `max` lines
    LineCount {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// stdout is not blank
    NotEmpty,
    /// stdout, less trailing newlines, matches the regex `pattern`
    Matches { pattern: Pattern },
    FileExists { path: String },
    DirectoryExists { path: String },
    FileNotExists { path: String },
    FileContains { path: String, text: String },
    /// Permission bits equal `mode`, octal (`755`) or symbolic (`rwxr-xr-x`)
    FileMode { path: String, mode: String },
    DirectoryEmpty { path: String },
    /// The command line used `command`
    CommandUsed { command: String },
    ExitCode { code: i32 },
    CwdIs { path: String },
    StderrContains { text: String },
    /// Every nested check passes
    All { checks: Vec<Validator> },
}

impl Validator {
    /// Parse an `outputCheck` name and its `outputCheckParams`.
    ///
    /// Fails for an unknown name, missing or mistyped parameters, an invalid
    /// regex or an unparseable mode.
    pub fn parse(name: &str, params: Option<&Value>) -> Result<Self> {
        let mut spec = serde_json::Map::new();
        spec.insert("check".to_string(), Value::String(name.to_string()));
        match params {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) if map.is_empty() => {}
            Some(other) => {
                spec.insert("params".to_string(), other.clone());
            }
        }
        let validator: Validator = serde_json::from_value(Value::Object(spec))
            .map_err(|e| Error::Validation(format!("{}: {}", name, e)))?;
        validator.check_params()?;
        Ok(validator)
    }

    fn check_params(&self) -> Result<()> {
        match self {
            Validator::FileMode { mode, .. } => {
                if parse_mode(mode).is_none() {
                    return Err(Error::Validation(format!("fileMode: invalid mode '{}'", mode)));
                }
            }
            Validator::All { checks } => {
                for check in checks {
                    check.check_params()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Evaluate against one command's result.
    pub fn evaluate<'a>(
        &'a self,
        ctx: &'a ValidationContext<'a>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            match self {
                Validator::Contains { text } => ctx.stdout.contains(text.as_str()),
                Validator::ContainsAll { items } => {
                    items.iter().all(|item| ctx.stdout.contains(item.as_str()))
                }
                Validator::Equals { text } => ctx.stdout.trim() == text.trim(),
                Validator::LineCount { min, max } => {
                    let count = ctx.stdout.lines().count();
                    min.is_none_or(|m| count >= m) && max.is_none_or(|m| count <= m)
                }
                Validator::NotEmpty => !ctx.stdout.trim().is_empty(),
                Validator::Matches { pattern } => pattern.is_match(ctx.output()),
                Validator::FileExists { path } => ctx
                    .fs
                    .stat(&ctx.resolve(path))
                    .await
                    .is_some_and(|m| m.file_type.is_file()),
                Validator::DirectoryExists { path } => ctx
                    .fs
                    .stat(&ctx.resolve(path))
                    .await
                    .is_some_and(|m| m.file_type.is_dir()),
                Validator::FileNotExists { path } => !ctx.fs.exists(&ctx.resolve(path)).await,
                Validator::FileContains { path, text } => ctx
                    .read(path)
                    .await
                    .is_some_and(|content| content.contains(text.as_str())),
                Validator::FileMode { path, mode } => {
                    let Some(expected) = parse_mode(mode) else {
                        return false;
                    };
                    ctx.fs
                        .stat(&ctx.resolve(path))
                        .await
                        .is_some_and(|m| m.permissions() == expected)
                }
                Validator::DirectoryEmpty { path } => ctx
                    .fs
                    .read_dir(&ctx.resolve(path))
                    .await
                    .is_ok_and(|entries| entries.is_empty()),
                Validator::CommandUsed { command } => command_used(ctx.command, command),
                Validator::ExitCode { code } => ctx.exit_code == *code,
                Validator::CwdIs { path } => ctx.cwd == ctx.resolve(path),
                Validator::StderrContains { text } => ctx.stderr.contains(text.as_str()),
                Validator::All { checks } => {
                    for check in checks {
                        if !check.evaluate(ctx).await {
                            return false;
                        }
                    }
                    true
                }
            }
        })
    }
}

/// A regex compiled when the validator is parsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(pattern: String) -> std::result::Result<Self, Self::Error> {
        Regex::new(&pattern).map(Self)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// `755` or `rwxr-xr-x` into permission bits.
fn parse_mode(mode: &str) -> Option<u32> {
    if !mode.is_empty() && mode.len() <= 4 && mode.chars().all(|c| c.is_digit(8)) {
        return u32::from_str_radix(mode, 8).ok();
    }
    parse_permission_string(mode)
}

/// Whether `line` ran `command`.
///
/// A multi-word `command` must prefix the line; a single word must be the
/// command name, looking past any `sudo`.
fn command_used(line: &str, command: &str) -> bool {
    let line = line.trim();
    if command.split_whitespace().count() > 1 {
        return line.starts_with(command.trim());
    }
    line.split_whitespace()
        .find(|word| CommandName::parse(word) != Some(CommandName::Sudo))
        .is_some_and(|word| word == command.trim())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use serde_json::json;

    fn ctx<'a>(fs: &'a InMemoryFs, command: &'a str, stdout: &'a str) -> ValidationContext<'a> {
        ValidationContext {
            command,
            stdout,
            stderr: "",
            exit_code: 0,
            cwd: "/home/student",
            username: "student",
            fs,
        }
    }

    #[test]
    fn test_parse_known_validators() {
        assert_eq!(
            Validator::parse("contains", Some(&json!({"text": "hi"}))).unwrap(),
            Validator::Contains {
                text: "hi".to_string()
            }
        );
        assert_eq!(Validator::parse("notEmpty", None).unwrap(), Validator::NotEmpty);
        assert_eq!(
            Validator::parse("notEmpty", Some(&json!({}))).unwrap(),
            Validator::NotEmpty
        );
        let all = Validator::parse(
            "all",
            Some(&json!({"checks": [
                {"check": "exitCode", "params": {"code": 0}},
                {"check": "notEmpty"}
            ]})),
        )
        .unwrap();
        assert!(matches!(all, Validator::All { checks } if checks.len() == 2));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Validator::parse("teleport", None).is_err());
        assert!(Validator::parse("contains", None).is_err());
        assert!(Validator::parse("contains", Some(&json!({"text": 5}))).is_err());
        assert!(Validator::parse("matches", Some(&json!({"pattern": "("}))).is_err());
        assert!(
            Validator::parse("fileMode", Some(&json!({"path": "a", "mode": "rwz"}))).is_err()
        );
    }

    #[test]
    fn test_matches_pattern_compiled_at_parse() {
        let Validator::Matches { pattern } =
            Validator::parse("matches", Some(&json!({"pattern": "^[a-z]+$"}))).unwrap()
        else {
            panic!("expected a matches validator");
        };
        assert_eq!(pattern.as_str(), "^[a-z]+$");
        assert!(pattern.is_match("station"));
        assert!(!pattern.is_match("Station 7"));

        let err = Validator::parse("matches", Some(&json!({"pattern": "[z-a]"}))).unwrap_err();
        assert!(err.to_string().contains("matches"));
    }

    #[tokio::test]
    async fn test_output_validators() {
        let fs = InMemoryFs::new("student");
        let c = ctx(&fs, "ls", "alpha\nbeta\n");

        let check = |name: &str, params: Value| Validator::parse(name, Some(&params)).unwrap();
        assert!(check("contains", json!({"text": "beta"})).evaluate(&c).await);
        assert!(check("containsAll", json!({"items": ["alpha", "beta"]})).evaluate(&c).await);
        assert!(!check("equals", json!({"text": "alpha"})).evaluate(&c).await);
        assert!(check("lineCount", json!({"min": 2, "max": 2})).evaluate(&c).await);
        assert!(!check("lineCount", json!({"min": 3})).evaluate(&c).await);
        assert!(check("matches", json!({"pattern": "beta$"})).evaluate(&c).await);
        assert!(!check("matches", json!({"pattern": "^be"})).evaluate(&c).await);
        assert!(Validator::NotEmpty.evaluate(&c).await);
        assert!(!Validator::NotEmpty.evaluate(&ctx(&fs, "ls", " \n")).await);
    }

    #[tokio::test]
    async fn test_filesystem_validators() {
        let fs = InMemoryFs::new("student");
        fs.mkdir("/home/student/empty", 0o755).await.unwrap();
        fs.write_file("/home/student/run.sh", b"echo hi\n").await.unwrap();
        fs.chmod("/home/student/run.sh", 0o755).await.unwrap();
        let c = ctx(&fs, "chmod +x run.sh", "");

        let check = |name: &str, params: Value| Validator::parse(name, Some(&params)).unwrap();
        assert!(check("fileExists", json!({"path": "run.sh"})).evaluate(&c).await);
        assert!(!check("fileExists", json!({"path": "empty"})).evaluate(&c).await);
        assert!(check("directoryExists", json!({"path": "~/empty"})).evaluate(&c).await);
        assert!(check("fileNotExists", json!({"path": "/tmp/x"})).evaluate(&c).await);
        assert!(
            check("fileContains", json!({"path": "run.sh", "text": "echo"}))
                .evaluate(&c)
                .await
        );
        assert!(
            check("fileMode", json!({"path": "run.sh", "mode": "755"}))
                .evaluate(&c)
                .await
        );
        assert!(
            check("fileMode", json!({"path": "run.sh", "mode": "rwxr-xr-x"}))
                .evaluate(&c)
                .await
        );
        assert!(check("directoryEmpty", json!({"path": "empty"})).evaluate(&c).await);
    }

    #[tokio::test]
    async fn test_advanced_validators() {
        let fs = InMemoryFs::new("student");
        let mut c = ctx(&fs, "sudo cat /root/secret", "");
        c.stderr = "cat: x: Permission denied\n";
        c.exit_code = 1;

        let check = |name: &str, params: Value| Validator::parse(name, Some(&params)).unwrap();
        assert!(check("commandUsed", json!({"command": "cat"})).evaluate(&c).await);
        assert!(check("commandUsed", json!({"command": "sudo cat"})).evaluate(&c).await);
        assert!(!check("commandUsed", json!({"command": "ls"})).evaluate(&c).await);
        assert!(check("exitCode", json!({"code": 1})).evaluate(&c).await);
        assert!(check("cwdIs", json!({"path": "~"})).evaluate(&c).await);
        assert!(check("stderrContains", json!({"text": "denied"})).evaluate(&c).await);
    }
}
