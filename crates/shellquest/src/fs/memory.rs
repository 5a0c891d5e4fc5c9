//! In-memory filesystem implementation

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::{PoisonError, RwLock};

use super::traits::{
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DirEntry, FileSystem, FileType, Metadata, ROOT_OWNER,
    S_IFMT,
};
use crate::error::{FsError, FsResult};
use crate::path;

/// In-memory filesystem.
///
/// A single tree of nodes rooted at `/`. Directory entries keep insertion
/// order; names are unique within a directory and every node has exactly one
/// parent because it is owned by it. New nodes are owned by `default_owner`.
pub struct InMemoryFs {
    root: RwLock<Node>,
    default_owner: String,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    mode: u32,
    owner: String,
    modified: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    File(Vec<u8>),
    Directory(IndexMap<String, Node>),
}

impl Node {
    fn file(content: Vec<u8>, owner: &str) -> Self {
        Self {
            kind: NodeKind::File(content),
            mode: FileType::File.type_bits() | DEFAULT_FILE_MODE,
            owner: owner.to_string(),
            modified: Utc::now(),
        }
    }

    fn directory(mode: u32, owner: &str) -> Self {
        Self {
            kind: NodeKind::Directory(IndexMap::new()),
            mode: FileType::Directory.type_bits() | (mode & 0o7777),
            owner: owner.to_string(),
            modified: Utc::now(),
        }
    }

    fn metadata(&self) -> Metadata {
        let (file_type, size) = match &self.kind {
            NodeKind::File(content) => (FileType::File, content.len() as u64),
            NodeKind::Directory(_) => (FileType::Directory, 0),
        };
        Metadata {
            file_type,
            size,
            mode: self.mode,
            owner: self.owner.clone(),
            modified: self.modified,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new("student")
    }
}

impl InMemoryFs {
    /// Create a filesystem with the standard skeleton for `username`:
    /// `/home/{username}`, `/tmp`, `/etc` and a root-owned `/root`.
    pub fn new(username: &str) -> Self {
        let fs = Self::empty(username);
        {
            let mut root = fs.write_root();
            if let NodeKind::Directory(children) = &mut root.kind {
                let mut home = Node::directory(DEFAULT_DIR_MODE, username);
                if let NodeKind::Directory(users) = &mut home.kind {
                    users.insert(
                        username.to_string(),
                        Node::directory(DEFAULT_DIR_MODE, username),
                    );
                }
                children.insert("home".to_string(), home);
                children.insert("tmp".to_string(), Node::directory(0o777, username));
                children.insert("etc".to_string(), Node::directory(DEFAULT_DIR_MODE, username));
                children.insert("root".to_string(), Node::directory(0o700, ROOT_OWNER));
            }
        }
        fs
    }

    /// Create a filesystem containing only `/`.
    pub fn empty(default_owner: &str) -> Self {
        Self {
            root: RwLock::new(Node::directory(DEFAULT_DIR_MODE, default_owner)),
            default_owner: default_owner.to_string(),
        }
    }

    /// Owner assigned to newly created nodes.
    pub fn default_owner(&self) -> &str {
        &self.default_owner
    }

    /// Deep copy of the whole tree.
    pub fn snapshot(&self) -> Self {
        Self {
            root: RwLock::new(self.read_root().clone()),
            default_owner: self.default_owner.clone(),
        }
    }

    /// Replace the whole tree with the contents of `snapshot`.
    pub fn restore_from(&self, snapshot: &InMemoryFs) {
        let tree = snapshot.read_root().clone();
        *self.write_root() = tree;
    }

    // A poisoned lock only means a panic happened mid-operation elsewhere;
    // every mutation below is applied in one step, so the tree is still whole.
    fn read_root(&self) -> std::sync::RwLockReadGuard<'_, Node> {
        self.root.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_root(&self) -> std::sync::RwLockWriteGuard<'_, Node> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lookup<'a>(root: &'a Node, segments: &[&str], full: &str) -> FsResult<&'a Node> {
    let mut node = root;
    for segment in segments {
        let children = match &node.kind {
            NodeKind::Directory(children) => children,
            NodeKind::File(_) => return Err(FsError::NotADirectory(full.to_string())),
        };
        node = children
            .get(*segment)
            .ok_or_else(|| FsError::NotFound(full.to_string()))?;
    }
    Ok(node)
}

fn lookup_mut<'a>(root: &'a mut Node, segments: &[&str], full: &str) -> FsResult<&'a mut Node> {
    let mut node = root;
    for segment in segments {
        let children = match &mut node.kind {
            NodeKind::Directory(children) => children,
            NodeKind::File(_) => return Err(FsError::NotADirectory(full.to_string())),
        };
        node = children
            .get_mut(*segment)
            .ok_or_else(|| FsError::NotFound(full.to_string()))?;
    }
    Ok(node)
}

/// Children of the parent directory of `segments`, plus the final name.
fn parent_entries<'a, 'p>(
    root: &'a mut Node,
    segments: &[&'p str],
    full: &str,
) -> FsResult<(&'a mut IndexMap<String, Node>, &'p str)> {
    let Some((name, parent)) = segments.split_last() else {
        return Err(FsError::InvalidArgument(full.to_string()));
    };
    let parent = lookup_mut(root, parent, full)?;
    match &mut parent.kind {
        NodeKind::Directory(children) => {
            parent.modified = Utc::now();
            Ok((children, name))
        }
        NodeKind::File(_) => Err(FsError::NotADirectory(full.to_string())),
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let root = self.read_root();
        match &lookup(&root, &path::segments(path), path)?.kind {
            NodeKind::File(content) => Ok(content.clone()),
            NodeKind::Directory(_) => Err(FsError::IsADirectory(path.to_string())),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> FsResult<()> {
        let segments = path::segments(path);
        if segments.is_empty() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let mut root = self.write_root();
        let (entries, name) = parent_entries(&mut root, &segments, path)?;
        match entries.get_mut(name) {
            Some(Node {
                kind: NodeKind::Directory(_),
                ..
            }) => Err(FsError::IsADirectory(path.to_string())),
            Some(node) => {
                node.kind = NodeKind::File(content.to_vec());
                node.modified = Utc::now();
                Ok(())
            }
            None => {
                entries.insert(
                    name.to_string(),
                    Node::file(content.to_vec(), &self.default_owner),
                );
                Ok(())
            }
        }
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> FsResult<()> {
        let segments = path::segments(path);
        if segments.is_empty() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let mut root = self.write_root();
        let (entries, name) = parent_entries(&mut root, &segments, path)?;
        match entries.get_mut(name) {
            Some(node) => match &mut node.kind {
                NodeKind::File(existing) => {
                    existing.extend_from_slice(content);
                    node.modified = Utc::now();
                    Ok(())
                }
                NodeKind::Directory(_) => Err(FsError::IsADirectory(path.to_string())),
            },
            None => {
                entries.insert(
                    name.to_string(),
                    Node::file(content.to_vec(), &self.default_owner),
                );
                Ok(())
            }
        }
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        let segments = path::segments(path);
        if segments.is_empty() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let mut root = self.write_root();
        let (entries, name) = parent_entries(&mut root, &segments, path)?;
        if entries.contains_key(name) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        entries.insert(name.to_string(), Node::directory(mode, &self.default_owner));
        Ok(())
    }

    async fn mkdir_tree(&self, path: &str) -> FsResult<()> {
        let mut root = self.write_root();
        let mut node: &mut Node = &mut root;
        for segment in path::segments(path) {
            let children = match &mut node.kind {
                NodeKind::Directory(children) => children,
                NodeKind::File(_) => return Err(FsError::NotADirectory(path.to_string())),
            };
            node = children
                .entry(segment.to_string())
                .or_insert_with(|| Node::directory(DEFAULT_DIR_MODE, &self.default_owner));
        }
        if node.is_dir() {
            Ok(())
        } else {
            Err(FsError::NotADirectory(path.to_string()))
        }
    }

    async fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let root = self.read_root();
        match &lookup(&root, &path::segments(path), path)?.kind {
            NodeKind::Directory(children) => Ok(children
                .iter()
                .map(|(name, node)| DirEntry {
                    name: name.clone(),
                    metadata: node.metadata(),
                })
                .collect()),
            NodeKind::File(_) => Err(FsError::NotADirectory(path.to_string())),
        }
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        let segments = path::segments(path);
        let mut root = self.write_root();
        let (entries, name) = parent_entries(&mut root, &segments, path)?;
        let is_dir = entries
            .get(name)
            .map(Node::is_dir)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if is_dir {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        entries.shift_remove(name);
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        let segments = path::segments(path);
        let mut root = self.write_root();
        let (entries, name) = parent_entries(&mut root, &segments, path)?;
        match entries.get(name).map(|n| &n.kind) {
            None => return Err(FsError::NotFound(path.to_string())),
            Some(NodeKind::File(_)) => return Err(FsError::NotADirectory(path.to_string())),
            Some(NodeKind::Directory(children)) if !children.is_empty() => {
                return Err(FsError::NotEmpty(path.to_string()));
            }
            Some(NodeKind::Directory(_)) => {}
        }
        entries.shift_remove(name);
        Ok(())
    }

    async fn remove_tree(&self, path: &str) -> FsResult<()> {
        let segments = path::segments(path);
        let mut root = self.write_root();
        let (entries, name) = parent_entries(&mut root, &segments, path)?;
        entries
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = path::normalize(from);
        let to = path::normalize(to);
        if from == to {
            return Ok(());
        }
        if from == "/" || to == "/" || path::is_within(&to, &from) {
            return Err(FsError::InvalidArgument(to));
        }
        let from_segments = path::segments(&from);
        let to_segments = path::segments(&to);

        let mut root = self.write_root();

        // Validate both ends before detaching anything.
        let source_is_dir = lookup(&root, &from_segments, &from)?.is_dir();
        match lookup(&root, &to_segments, &to) {
            Ok(dest) => match (&dest.kind, source_is_dir) {
                (NodeKind::Directory(_), false) => return Err(FsError::IsADirectory(to)),
                (NodeKind::File(_), true) => return Err(FsError::NotADirectory(to)),
                (NodeKind::Directory(children), true) if !children.is_empty() => {
                    return Err(FsError::NotEmpty(to));
                }
                _ => {}
            },
            Err(FsError::NotFound(_)) => {
                let parent = lookup(&root, &to_segments[..to_segments.len() - 1], &to)?;
                if !parent.is_dir() {
                    return Err(FsError::NotADirectory(to));
                }
            }
            Err(e) => return Err(e),
        }

        let (entries, name) = parent_entries(&mut root, &from_segments, &from)?;
        let mut node = entries
            .shift_remove(name)
            .ok_or_else(|| FsError::NotFound(from.clone()))?;
        node.modified = Utc::now();
        let (entries, name) = parent_entries(&mut root, &to_segments, &to)?;
        entries.insert(name.to_string(), node);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str, recursive: bool) -> FsResult<()> {
        let to_segments = path::segments(to);
        let mut root = self.write_root();
        let mut node = lookup(&root, &path::segments(from), from)?.clone();
        if node.is_dir() && !recursive {
            return Err(FsError::IsADirectory(from.to_string()));
        }
        node.modified = Utc::now();
        node.owner = self.default_owner.clone();

        let (entries, name) = parent_entries(&mut root, &to_segments, to)?;
        if let Some(existing) = entries.get(name) {
            match (existing.is_dir(), node.is_dir()) {
                (true, false) => return Err(FsError::IsADirectory(to.to_string())),
                (false, true) => return Err(FsError::NotADirectory(to.to_string())),
                _ => {}
            }
        }
        entries.insert(name.to_string(), node);
        Ok(())
    }

    async fn stat(&self, path: &str) -> Option<Metadata> {
        let root = self.read_root();
        lookup(&root, &path::segments(path), path)
            .ok()
            .map(Node::metadata)
    }

    async fn exists(&self, path: &str) -> bool {
        let root = self.read_root();
        lookup(&root, &path::segments(path), path).is_ok()
    }

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        let mut root = self.write_root();
        let node = lookup_mut(&mut root, &path::segments(path), path)?;
        node.mode = (node.mode & S_IFMT) | (mode & 0o7777);
        Ok(())
    }

    async fn chown(&self, path: &str, owner: &str) -> FsResult<()> {
        let mut root = self.write_root();
        let node = lookup_mut(&mut root, &path::segments(path), path)?;
        node.owner = owner.to_string();
        Ok(())
    }

    async fn touch(&self, path: &str) -> FsResult<()> {
        {
            let mut root = self.write_root();
            if let Ok(node) = lookup_mut(&mut root, &path::segments(path), path) {
                node.modified = Utc::now();
                return Ok(());
            }
        }
        self.write_file(path, &[]).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read_file() {
        let fs = InMemoryFs::default();

        fs.write_file("/tmp/test.txt", b"hello world").await.unwrap();

        let content = fs.read_file("/tmp/test.txt").await.unwrap();
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn test_write_over_directory_fails() {
        let fs = InMemoryFs::default();
        let err = fs.write_file("/tmp", b"x").await.unwrap_err();
        assert_eq!(err.code(), "EISDIR");
    }

    #[tokio::test]
    async fn test_mkdir_errors() {
        let fs = InMemoryFs::default();

        let err = fs.mkdir("/nope/child", 0o755).await.unwrap_err();
        assert_eq!(err.code(), "ENOENT");

        fs.write_file("/tmp/file", b"").await.unwrap();
        let err = fs.mkdir("/tmp/file/child", 0o755).await.unwrap_err();
        assert_eq!(err.code(), "ENOTDIR");

        let err = fs.mkdir("/tmp", 0o755).await.unwrap_err();
        assert_eq!(err.code(), "EEXIST");
    }

    #[tokio::test]
    async fn test_mkdir_tree_is_idempotent() {
        let fs = InMemoryFs::default();
        fs.mkdir_tree("/a/b/c").await.unwrap();
        fs.mkdir_tree("/a/b/c").await.unwrap();
        assert!(fs.stat("/a/b/c").await.unwrap().file_type.is_dir());
    }

    #[tokio::test]
    async fn test_read_dir_keeps_insertion_order() {
        let fs = InMemoryFs::empty("student");
        fs.mkdir("/d", 0o755).await.unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs.write_file(&format!("/d/{}", name), b"").await.unwrap();
        }
        let names: Vec<_> = fs
            .read_dir("/d")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_unlink_directory_fails() {
        let fs = InMemoryFs::default();
        assert_eq!(fs.unlink("/tmp").await.unwrap_err().code(), "EISDIR");
    }

    #[tokio::test]
    async fn test_rmdir_requires_empty() {
        let fs = InMemoryFs::default();
        fs.mkdir("/tmp/d", 0o755).await.unwrap();
        fs.write_file("/tmp/d/f", b"x").await.unwrap();
        assert_eq!(fs.rmdir("/tmp/d").await.unwrap_err().code(), "ENOTEMPTY");
        fs.unlink("/tmp/d/f").await.unwrap();
        fs.rmdir("/tmp/d").await.unwrap();
        assert!(!fs.exists("/tmp/d").await);
    }

    #[tokio::test]
    async fn test_rename_overwrites_file() {
        let fs = InMemoryFs::default();
        fs.write_file("/tmp/a", b"a").await.unwrap();
        fs.write_file("/tmp/b", b"b").await.unwrap();
        fs.rename("/tmp/a", "/tmp/b").await.unwrap();
        assert!(!fs.exists("/tmp/a").await);
        assert_eq!(fs.read_file("/tmp/b").await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_rename_into_own_subtree_fails() {
        let fs = InMemoryFs::default();
        fs.mkdir_tree("/tmp/a/b").await.unwrap();
        let err = fs.rename("/tmp/a", "/tmp/a/b/c").await.unwrap_err();
        assert_eq!(err.code(), "EINVAL");
        assert!(fs.exists("/tmp/a/b").await);
    }

    #[tokio::test]
    async fn test_copy_directory_requires_recursive() {
        let fs = InMemoryFs::default();
        fs.mkdir_tree("/tmp/src/inner").await.unwrap();
        fs.write_file("/tmp/src/inner/f", b"data").await.unwrap();

        assert_eq!(
            fs.copy("/tmp/src", "/tmp/dst", false).await.unwrap_err().code(),
            "EISDIR"
        );
        fs.copy("/tmp/src", "/tmp/dst", true).await.unwrap();
        assert_eq!(fs.read_file("/tmp/dst/inner/f").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_chmod_preserves_type_bits() {
        let fs = InMemoryFs::default();
        fs.chmod("/tmp", 0o700).await.unwrap();
        let meta = fs.stat("/tmp").await.unwrap();
        assert!(meta.file_type.is_dir());
        assert_eq!(meta.mode & S_IFMT, super::super::traits::S_IFDIR);
        assert_eq!(meta.permissions(), 0o700);
    }

    #[tokio::test]
    async fn test_restore_from_snapshot() {
        let fs = InMemoryFs::default();
        fs.write_file("/tmp/keep", b"1").await.unwrap();
        let snap = fs.snapshot();

        fs.remove_tree("/tmp").await.unwrap();
        assert!(!fs.exists("/tmp/keep").await);

        fs.restore_from(&snap);
        assert_eq!(fs.read_file("/tmp/keep").await.unwrap(), b"1");
    }

    #[tokio::test]
    async fn test_stat_never_fails() {
        let fs = InMemoryFs::default();
        assert!(fs.stat("/does/not/exist").await.is_none());
        assert!(fs.stat("/root").await.unwrap().is_root_owned());
    }
}
