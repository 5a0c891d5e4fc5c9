//! Destructive-command guard
//!
//! Runs before `rm`, `rmdir`, `mv` and `>` reach the dispatcher. A target
//! that is, or contains, a protected path yields a [`DestructiveWarning`];
//! the session then asks for confirmation and only runs the command once
//! the learner agrees.

use crate::fs::FileSystem;
use crate::interpreter::{CommandName, ExecutionContext};
use crate::parser::OutputTarget;
use crate::path;

/// System directories whose loss breaks the machine.
const CRITICAL_PATHS: &[&str] = &["/", "/bin", "/boot", "/etc", "/lib", "/sbin", "/usr"];

/// Directories holding user or service data.
const DANGER_PATHS: &[&str] = &["/home", "/root", "/var", "/opt"];

/// How bad losing the target would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningLevel {
    /// Mission-critical for the current adventure
    Warning,
    /// User data or a file inside a system directory
    Danger,
    /// A system directory
    Critical,
}

impl WarningLevel {
    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            WarningLevel::Warning => "warning",
            WarningLevel::Danger => "danger",
            WarningLevel::Critical => "critical",
        }
    }
}

/// Why a command needs confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructiveWarning {
    pub level: WarningLevel,
    /// Resolved path of the offending target
    pub path: String,
    pub reason: String,
}

/// Classify a command line, returning the most severe warning among its targets.
pub async fn classify(
    argv: &[String],
    stdout: Option<&OutputTarget>,
    exec: &ExecutionContext,
    fs: &dyn FileSystem,
    critical_paths: &[String],
) -> Option<DestructiveWarning> {
    let mut targets: Vec<String> = Vec::new();

    if let Some((name, args)) = argv.split_first() {
        let operands: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
        match CommandName::parse(name) {
            Some(CommandName::Rm) | Some(CommandName::Rmdir) => {
                targets.extend(operands.iter().map(|o| exec.resolve(o)));
            }
            Some(CommandName::Mv) => {
                if let Some((_, sources)) = operands.split_last() {
                    targets.extend(sources.iter().map(|o| exec.resolve(o)));
                }
            }
            _ => {}
        }
    }

    if let Some(target) = stdout.filter(|t| !t.append) {
        let resolved = exec.resolve(&target.path);
        if fs.stat(&resolved).await.is_some_and(|m| m.file_type.is_file()) {
            targets.push(resolved);
        }
    }

    let home = path::home_dir(&exec.username);
    let mission: Vec<String> = critical_paths
        .iter()
        .map(|p| path::resolve(&home, p, &exec.username))
        .collect();

    targets
        .iter()
        .filter_map(|target| classify_path(target, &home, &mission))
        .max_by_key(|w| w.level)
}

fn classify_path(target: &str, home: &str, mission: &[String]) -> Option<DestructiveWarning> {
    let warning = |level, reason: String| {
        Some(DestructiveWarning {
            level,
            path: target.to_string(),
            reason,
        })
    };

    if let Some(system) = CRITICAL_PATHS.iter().find(|p| path::is_within(p, target)) {
        return warning(
            WarningLevel::Critical,
            format!("{} is a critical system directory", system),
        );
    }
    if path::is_within(home, target) {
        return warning(
            WarningLevel::Danger,
            format!("{} is your home directory", home),
        );
    }
    if let Some(data) = DANGER_PATHS.iter().find(|p| path::is_within(p, target)) {
        return warning(WarningLevel::Danger, format!("{} holds user data", data));
    }
    if let Some(system) = CRITICAL_PATHS
        .iter()
        .filter(|p| **p != "/")
        .find(|p| path::is_within(target, p))
    {
        return warning(
            WarningLevel::Danger,
            format!("{} is inside the system directory {}", target, system),
        );
    }
    if let Some(needed) = mission.iter().find(|p| path::is_within(p, target)) {
        return warning(
            WarningLevel::Warning,
            format!("{} is needed for the current mission", needed),
        );
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    async fn check(line: &str, critical: &[&str]) -> Option<DestructiveWarning> {
        let fs = InMemoryFs::new("student");
        fs.write_file("/home/student/keep.txt", b"x").await.unwrap();
        let exec = ExecutionContext::new("student");
        let argv: Vec<String> = line.split_whitespace().map(String::from).collect();
        let critical: Vec<String> = critical.iter().map(|s| s.to_string()).collect();
        classify(&argv, None, &exec, &fs, &critical).await
    }

    #[tokio::test]
    async fn test_root_is_critical() {
        let w = check("rm -rf /", &[]).await.unwrap();
        assert_eq!(w.level, WarningLevel::Critical);
        assert_eq!(w.path, "/");
    }

    #[tokio::test]
    async fn test_system_dirs() {
        assert_eq!(
            check("rmdir /usr", &[]).await.unwrap().level,
            WarningLevel::Critical
        );
        assert_eq!(
            check("rm /etc/hosts", &[]).await.unwrap().level,
            WarningLevel::Danger
        );
    }

    #[tokio::test]
    async fn test_home_is_danger() {
        let w = check("rm -r ~", &[]).await.unwrap();
        assert_eq!(w.level, WarningLevel::Danger);
        assert!(w.reason.contains("home directory"));

        assert_eq!(
            check("rm -r /home", &[]).await.unwrap().level,
            WarningLevel::Danger
        );
    }

    #[tokio::test]
    async fn test_mission_paths_are_warnings() {
        let w = check("rm -r projects", &["projects/report.txt"]).await.unwrap();
        assert_eq!(w.level, WarningLevel::Warning);
        assert_eq!(w.path, "/home/student/projects");

        // mv only guards its sources
        assert!(check("mv a projects", &["projects"]).await.is_none());
    }

    #[tokio::test]
    async fn test_ordinary_commands_pass() {
        assert!(check("rm notes.txt", &[]).await.is_none());
        assert!(check("ls /", &[]).await.is_none());
        assert!(check("cat /etc/hosts", &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_of_existing_file() {
        let fs = InMemoryFs::new("student");
        fs.write_file("/etc/motd", b"hi").await.unwrap();
        let exec = ExecutionContext::new("student");
        let argv = vec!["echo".to_string(), "x".to_string()];

        let target = OutputTarget {
            path: "/etc/motd".to_string(),
            append: false,
        };
        let w = classify(&argv, Some(&target), &exec, &fs, &[]).await.unwrap();
        assert_eq!(w.level, WarningLevel::Danger);

        let append = OutputTarget {
            append: true,
            ..target.clone()
        };
        assert!(classify(&argv, Some(&append), &exec, &fs, &[]).await.is_none());

        let fresh = OutputTarget {
            path: "/etc/new".to_string(),
            append: false,
        };
        assert!(classify(&argv, Some(&fresh), &exec, &fs, &[]).await.is_none());
    }
}
