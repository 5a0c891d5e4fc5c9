//! Remote hosts
//!
//! No networking happens. A [`RemoteResponder`] says which hostnames exist
//! and what they greet a visitor with; the interceptor then runs commands
//! against a remapped corner of the local filesystem.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::adventure::{Adventure, NodeSpec};

/// What a reachable host looks like.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteHost {
    /// Printed on login
    pub banner: String,
    /// Seeded into the visiting user's remote tree on their first visit
    pub filesystem: IndexMap<String, NodeSpec>,
}

/// Response collaborator for `ssh` and `scp`.
pub trait RemoteResponder: Send + Sync {
    /// The host named `host`, if it can be reached.
    fn lookup(&self, host: &str) -> Option<RemoteHost>;
}

/// A fixed table of hosts.
#[derive(Debug, Clone, Default)]
pub struct StaticResponder {
    hosts: HashMap<String, RemoteHost>,
}

impl StaticResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host.
    pub fn host(mut self, name: impl Into<String>, host: RemoteHost) -> Self {
        self.hosts.insert(name.into(), host);
        self
    }

    /// The hosts an adventure declares.
    pub fn from_adventure(adventure: &Adventure) -> Self {
        let hosts = adventure
            .remote_hosts
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    RemoteHost {
                        banner: spec.banner.clone(),
                        filesystem: spec.filesystem.clone(),
                    },
                )
            })
            .collect();
        Self { hosts }
    }
}

impl RemoteResponder for StaticResponder {
    fn lookup(&self, host: &str) -> Option<RemoteHost> {
        self.hosts.get(host).cloned()
    }
}

/// Split `[user@]host` into its parts.
pub fn parse_destination<'a>(dest: &'a str, default_user: &'a str) -> (&'a str, &'a str) {
    match dest.split_once('@') {
        Some((user, host)) if !user.is_empty() => (user, host),
        Some((_, host)) => (default_user, host),
        None => (default_user, dest),
    }
}

/// One side of an `scp` transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScpOperand<'a> {
    Local(&'a str),
    Remote {
        user: &'a str,
        host: &'a str,
        path: &'a str,
    },
}

/// Classify an `scp` operand: `[user@]host:path` is remote, anything else local.
pub fn parse_scp_operand<'a>(operand: &'a str, default_user: &'a str) -> ScpOperand<'a> {
    match operand.split_once(':') {
        Some((dest, path)) if !dest.is_empty() && !dest.contains('/') => {
            let (user, host) = parse_destination(dest, default_user);
            ScpOperand::Remote { user, host, path }
        }
        _ => ScpOperand::Local(operand),
    }
}

/// Directory standing in for a remote user's machine.
pub fn remote_root(user: &str) -> String {
    format!("/remotes/{}/filesystem", user)
}
