//! Adventure definitions
//!
//! An adventure is the declarative document a course is written in: ordered
//! missions of ordered tasks, plus the filesystem the learner starts with.
//! Field names follow the JSON format (`camelCase`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, InMemoryFs, ROOT_OWNER, parse_permission_string};
use crate::path;

/// A complete course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adventure {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub missions: Vec<Mission>,
    #[serde(default)]
    pub initial_file_system: FileSystemSpec,
    /// Hosts `ssh` and `scp` can reach
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub remote_hosts: IndexMap<String, RemoteHostSpec>,
    /// Paths whose removal asks for confirmation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub critical_paths: Vec<String>,
}

/// An ordered group of tasks with its narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub story: String,
    pub tasks: Vec<Task>,
    /// Message shown when the mission is completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<String>,
}

/// A single objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    /// Regex stdout must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_pattern: Option<String>,
    /// Validator name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_check: Option<String>,
    /// Validator parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_check_params: Option<serde_json::Value>,
    /// stdout must not be blank
    #[serde(default)]
    pub require_output: bool,
    #[serde(default)]
    pub hints: Vec<Hint>,
}

/// A hint, revealed one level at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    /// 1 (nudge) to 3 (answer)
    pub level: u8,
    pub text: String,
}

/// Initial filesystem structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileSystemSpec {
    #[serde(default)]
    pub root: IndexMap<String, NodeSpec>,
}

/// A declared file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeSpec {
    File {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        /// `rwxr-xr-x` style
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permissions: Option<String>,
    },
    Directory {
        #[serde(default)]
        children: IndexMap<String, NodeSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permissions: Option<String>,
    },
}

impl NodeSpec {
    fn owner(&self) -> Option<&str> {
        match self {
            NodeSpec::File { owner, .. } | NodeSpec::Directory { owner, .. } => owner.as_deref(),
        }
    }

    fn permissions(&self) -> Option<&str> {
        match self {
            NodeSpec::File { permissions, .. } | NodeSpec::Directory { permissions, .. } => {
                permissions.as_deref()
            }
        }
    }
}

/// A host reachable over `ssh`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHostSpec {
    /// Printed on login
    #[serde(default)]
    pub banner: String,
    /// Seeded into the remote tree on first connection
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub filesystem: IndexMap<String, NodeSpec>,
}

impl Adventure {
    /// Parse and check an adventure document.
    pub fn from_json(json: &str) -> Result<Self> {
        let adventure: Adventure = serde_json::from_str(json)?;
        adventure.check()?;
        Ok(adventure)
    }

    /// Structural checks serde cannot express.
    pub fn check(&self) -> Result<()> {
        if self.missions.is_empty() {
            return Err(Error::Adventure(format!("{}: no missions", self.id)));
        }
        let mut mission_ids = HashSet::new();
        let mut task_ids = HashSet::new();
        for mission in &self.missions {
            if !mission_ids.insert(mission.id.as_str()) {
                return Err(Error::Adventure(format!(
                    "duplicate mission id '{}'",
                    mission.id
                )));
            }
            if mission.tasks.is_empty() {
                return Err(Error::Adventure(format!(
                    "mission '{}' has no tasks",
                    mission.id
                )));
            }
            for task in &mission.tasks {
                if !task_ids.insert(task.id.as_str()) {
                    return Err(Error::Adventure(format!("duplicate task id '{}'", task.id)));
                }
                if let Some(hint) = task.hints.iter().find(|h| !(1..=3).contains(&h.level)) {
                    return Err(Error::Adventure(format!(
                        "task '{}': hint level {} outside 1-3",
                        task.id, hint.level
                    )));
                }
            }
        }
        check_nodes(&self.initial_file_system.root)?;
        for host in self.remote_hosts.values() {
            check_nodes(&host.filesystem)?;
        }
        Ok(())
    }

    /// Index of the mission with this id.
    pub fn mission_index(&self, mission_id: &str) -> Option<usize> {
        self.missions.iter().position(|m| m.id == mission_id)
    }

    /// The task with this id and the index of its mission.
    pub fn find_task(&self, task_id: &str) -> Option<(usize, &Task)> {
        self.missions.iter().enumerate().find_map(|(i, mission)| {
            mission
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .map(|task| (i, task))
        })
    }

    /// Build the starting filesystem for `username`.
    ///
    /// The declared tree is merged into the standard skeleton. Nodes belong
    /// to `username` unless they say otherwise; everything under `/root`
    /// belongs to root.
    pub async fn build_filesystem(&self, username: &str) -> Result<InMemoryFs> {
        let fs = InMemoryFs::new(username);
        populate(&fs, "/", &self.initial_file_system.root, username).await?;
        Ok(fs)
    }
}

fn check_nodes(nodes: &IndexMap<String, NodeSpec>) -> Result<()> {
    for (name, node) in nodes {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(Error::Adventure(format!("invalid node name '{}'", name)));
        }
        if let Some(perms) = node.permissions() {
            if parse_permission_string(perms).is_none() {
                return Err(Error::Adventure(format!(
                    "'{}': invalid permissions '{}'",
                    name, perms
                )));
            }
        }
        if let NodeSpec::Directory { children, .. } = node {
            check_nodes(children)?;
        }
    }
    Ok(())
}

/// Top-level key standing for the learner's home directory.
pub const HOME_KEY: &str = "~";

/// Create `nodes` beneath `base` in `fs`.
pub fn populate<'a>(
    fs: &'a dyn FileSystem,
    base: &'a str,
    nodes: &'a IndexMap<String, NodeSpec>,
    username: &'a str,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(populate_nodes(fs, base, nodes, username))
}

async fn populate_nodes(
    fs: &dyn FileSystem,
    base: &str,
    nodes: &IndexMap<String, NodeSpec>,
    username: &str,
) -> Result<()> {
    for (name, node) in nodes {
        let path = if base == "/" && name == HOME_KEY {
            path::home_dir(username)
        } else {
            path::join(base, name)
        };
        match node {
            NodeSpec::File { content, .. } => {
                fs.write_file(&path, content.as_bytes()).await?;
            }
            NodeSpec::Directory { children, .. } => {
                fs.mkdir_tree(&path).await?;
                populate(fs, &path, children, username).await?;
            }
        }

        let owner = match node.owner() {
            Some(owner) => owner,
            None if path::is_within(&path, "/root") => ROOT_OWNER,
            None => username,
        };
        fs.chown(&path, owner).await?;
        if let Some(mode) = node.permissions().and_then(parse_permission_string) {
            fs.chmod(&path, mode).await?;
        }
    }
    Ok(())
}
