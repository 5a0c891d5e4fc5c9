//! Logging support for Shellquest
//!
//! Structured logging goes through `tracing` when the `logging` feature is
//! enabled. This module decides what a log line may contain.
//!
//! # Log Levels
//!
//! - **WARN**: malformed adventure content (a broken validator or pattern)
//! - **INFO**: task, mission and sudo outcomes
//! - **DEBUG**: submitted lines and dispatched commands
//!
//! # Redaction
//!
//! A line typed at the sudo password prompt is never logged. Command lines
//! are escaped against log injection and truncated, and `export` of a
//! variable whose name looks secret has its value hidden.

use std::borrow::Cow;
use std::collections::HashSet;

/// Placeholder logged instead of sensitive text.
pub const REDACTED: &str = "[REDACTED]";

/// Configuration for logging behavior
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to redact sensitive data from logs (default: true)
    pub redact_sensitive: bool,

    /// Variable name fragments whose `export`ed values are hidden
    /// (case-insensitive). Default: PASSWORD, PASSWD, SECRET, TOKEN, KEY
    pub redact_env_vars: HashSet<String>,

    /// Whether submitted command lines are logged at all (default: true)
    pub log_commands: bool,

    /// Maximum length of logged values before truncation (default: 200)
    pub max_value_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            redact_sensitive: true,
            redact_env_vars: ["PASSWORD", "PASSWD", "SECRET", "TOKEN", "KEY"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            log_commands: true,
            max_value_length: 200,
        }
    }
}

impl LogConfig {
    /// Create a new log configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable redaction of exported secrets
    ///
    /// Password-prompt input stays hidden regardless.
    pub fn unsafe_disable_redaction(mut self) -> Self {
        self.redact_sensitive = false;
        self
    }

    /// Add a variable name fragment to redact
    pub fn redact_env(mut self, pattern: &str) -> Self {
        self.redact_env_vars.insert(pattern.to_uppercase());
        self
    }

    /// Stop logging command lines
    pub fn without_commands(mut self) -> Self {
        self.log_commands = false;
        self
    }

    /// Set maximum length for logged values
    pub fn max_value_length(mut self, len: usize) -> Self {
        self.max_value_length = len;
        self
    }

    /// Check if a variable name should be redacted
    pub fn should_redact_env(&self, name: &str) -> bool {
        if !self.redact_sensitive {
            return false;
        }
        let upper = name.to_uppercase();
        self.redact_env_vars
            .iter()
            .any(|pattern| upper.contains(pattern))
    }

    /// Render a submitted line for a log event.
    ///
    /// `password_prompt` marks input typed at the sudo prompt.
    pub fn format_line(&self, line: &str, password_prompt: bool) -> String {
        if password_prompt {
            return REDACTED.to_string();
        }
        if !self.log_commands {
            return format!("[line: {} bytes]", line.len());
        }
        let line = self.redact_exports(line);
        let sanitized = sanitize_for_log(&line);
        self.truncate(&sanitized).into_owned()
    }

    /// Hide the value in `export NAME=VALUE` when NAME looks secret.
    fn redact_exports<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut words = line.split_whitespace();
        if words.next() != Some("export") {
            return Cow::Borrowed(line);
        }
        let mut changed = false;
        let rendered: Vec<String> = std::iter::once("export".to_string())
            .chain(words.map(|word| match word.split_once('=') {
                Some((name, _)) if self.should_redact_env(name) => {
                    changed = true;
                    format!("{}={}", name, REDACTED)
                }
                _ => word.to_string(),
            }))
            .collect();
        if changed {
            Cow::Owned(rendered.join(" "))
        } else {
            Cow::Borrowed(line)
        }
    }

    /// Truncate value if it exceeds max length
    ///
    /// Handles UTF-8 char boundaries properly to avoid panics on multi-byte chars.
    fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_value_length {
            Cow::Borrowed(value)
        } else {
            let mut end = self.max_value_length;
            while end > 0 && !value.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!(
                "{}...[truncated {} bytes]",
                &value[..end],
                value.len() - end
            ))
        }
    }
}

/// Escape characters that could forge extra log lines.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect()
}
