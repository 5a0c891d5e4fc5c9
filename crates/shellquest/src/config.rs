//! Session configuration
//!
//! [`ShellConfig`] describes who the learner is and how the session behaves;
//! [`SessionLimits`] caps the resources a single session may accumulate.

use crate::path;

/// Default learner account name.
pub const DEFAULT_USERNAME: &str = "student";
/// Default machine name shown by `hostname` and the prompt.
pub const DEFAULT_HOSTNAME: &str = "shellquest";
/// Default secret accepted at the sudo password prompt.
pub const DEFAULT_SUDO_PASSWORD: &str = "password";

/// How `sudo` elevates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SudoPolicy {
    /// Prompt for the password on every invocation.
    #[default]
    Password,
    /// Elevate immediately without a prompt.
    Passthrough,
}

/// Resource limits for one session
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Maximum number of history entries kept
    /// Default: 1,000
    pub max_history: usize,

    /// Maximum number of lines in a heredoc body
    /// Default: 10,000
    pub max_heredoc_lines: usize,

    /// Maximum size of a single file write, in bytes
    /// Default: 1 MiB
    pub max_write_bytes: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_history: 1_000,
            max_heredoc_lines: 10_000,
            max_write_bytes: 1024 * 1024,
        }
    }
}

impl SessionLimits {
    /// Create new limits with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum history length
    pub fn max_history(mut self, count: usize) -> Self {
        self.max_history = count;
        self
    }

    /// Set maximum heredoc body length
    pub fn max_heredoc_lines(mut self, count: usize) -> Self {
        self.max_heredoc_lines = count;
        self
    }

    /// Set maximum single write size
    pub fn max_write_bytes(mut self, bytes: usize) -> Self {
        self.max_write_bytes = bytes;
        self
    }
}

/// Configuration for a shell session.
///
/// ```
/// use shellquest::{ShellConfig, SudoPolicy};
///
/// let config = ShellConfig::new()
///     .username("ada")
///     .sudo_policy(SudoPolicy::Passthrough);
/// assert_eq!(config.home(), "/home/ada");
/// ```
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Learner account name
    pub username: String,
    /// Machine name
    pub hostname: String,
    /// Secret accepted by the sudo prompt
    pub sudo_password: String,
    /// Elevation behavior
    pub sudo_policy: SudoPolicy,
    /// Session resource limits
    pub limits: SessionLimits,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            sudo_password: DEFAULT_SUDO_PASSWORD.to_string(),
            sudo_policy: SudoPolicy::default(),
            limits: SessionLimits::default(),
        }
    }
}

impl ShellConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the learner account name
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the machine name
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the sudo password
    pub fn sudo_password(mut self, password: impl Into<String>) -> Self {
        self.sudo_password = password.into();
        self
    }

    /// Set the elevation behavior
    pub fn sudo_policy(mut self, policy: SudoPolicy) -> Self {
        self.sudo_policy = policy;
        self
    }

    /// Set session limits
    pub fn limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Home directory of the learner.
    pub fn home(&self) -> String {
        path::home_dir(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.username, "student");
        assert_eq!(config.home(), "/home/student");
        assert_eq!(config.sudo_policy, SudoPolicy::Password);
        assert_eq!(config.limits.max_history, 1_000);
    }

    #[test]
    fn test_builder() {
        let config = ShellConfig::new()
            .hostname("lab")
            .limits(SessionLimits::new().max_history(5).max_write_bytes(10));
        assert_eq!(config.hostname, "lab");
        assert_eq!(config.limits.max_history, 5);
        assert_eq!(config.limits.max_write_bytes, 10);
    }
}
