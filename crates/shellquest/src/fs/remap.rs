//! Subtree-rooted filesystem view
//!
//! [`RemappedFs`] presents a directory of another filesystem as if it were
//! `/`. Remote sessions run the regular builtins against it so that the
//! "remote machine" is just a sandboxed corner of the learner's own tree.

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::{DirEntry, FileSystem, Metadata};
use crate::error::{FsError, FsResult};
use crate::path;

/// A [`FileSystem`] whose root is a subtree of an inner filesystem.
///
/// Paths are normalized before they are joined to the root, so `..` can
/// never climb out of the subtree. Error paths are reported in the view's
/// own coordinates.
pub struct RemappedFs {
    inner: Arc<dyn FileSystem>,
    root: String,
}

impl RemappedFs {
    /// Create a view of `inner` rooted at `root`.
    pub fn new(inner: Arc<dyn FileSystem>, root: impl Into<String>) -> Self {
        Self {
            inner,
            root: path::normalize(&root.into()),
        }
    }

    /// Root of the view inside the inner filesystem.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Map a view path to the inner filesystem.
    pub fn to_inner(&self, view_path: &str) -> String {
        let normalized = path::normalize(view_path);
        if normalized == "/" {
            self.root.clone()
        } else if self.root == "/" {
            normalized
        } else {
            format!("{}{}", self.root, normalized)
        }
    }

    fn to_view(&self, inner_path: &str) -> String {
        match inner_path.strip_prefix(self.root.as_str()) {
            Some("") => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => inner_path.to_string(),
        }
    }

    fn map_err(&self, err: FsError) -> FsError {
        let view = self.to_view(err.path());
        match err {
            FsError::NotFound(_) => FsError::NotFound(view),
            FsError::NotADirectory(_) => FsError::NotADirectory(view),
            FsError::IsADirectory(_) => FsError::IsADirectory(view),
            FsError::AlreadyExists(_) => FsError::AlreadyExists(view),
            FsError::NotEmpty(_) => FsError::NotEmpty(view),
            FsError::InvalidArgument(_) => FsError::InvalidArgument(view),
            FsError::TooLarge(_) => FsError::TooLarge(view),
        }
    }

    fn ensure_not_root(&self, view_path: &str) -> FsResult<()> {
        if path::normalize(view_path) == "/" {
            Err(FsError::InvalidArgument("/".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FileSystem for RemappedFs {
    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        self.inner
            .read_file(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> FsResult<()> {
        self.inner
            .write_file(&self.to_inner(path), content)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> FsResult<()> {
        self.inner
            .append_file(&self.to_inner(path), content)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        self.inner
            .mkdir(&self.to_inner(path), mode)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn mkdir_tree(&self, path: &str) -> FsResult<()> {
        self.inner
            .mkdir_tree(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.inner
            .read_dir(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        self.inner
            .unlink(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        self.ensure_not_root(path)?;
        self.inner
            .rmdir(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn remove_tree(&self, path: &str) -> FsResult<()> {
        self.ensure_not_root(path)?;
        self.inner
            .remove_tree(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        self.ensure_not_root(from)?;
        self.ensure_not_root(to)?;
        self.inner
            .rename(&self.to_inner(from), &self.to_inner(to))
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn copy(&self, from: &str, to: &str, recursive: bool) -> FsResult<()> {
        self.ensure_not_root(to)?;
        self.inner
            .copy(&self.to_inner(from), &self.to_inner(to), recursive)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn stat(&self, path: &str) -> Option<Metadata> {
        self.inner.stat(&self.to_inner(path)).await
    }

    async fn exists(&self, path: &str) -> bool {
        self.inner.exists(&self.to_inner(path)).await
    }

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        self.inner
            .chmod(&self.to_inner(path), mode)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn chown(&self, path: &str, owner: &str) -> FsResult<()> {
        self.inner
            .chown(&self.to_inner(path), owner)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn touch(&self, path: &str) -> FsResult<()> {
        self.inner
            .touch(&self.to_inner(path))
            .await
            .map_err(|e| self.map_err(e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    async fn setup() -> (Arc<InMemoryFs>, RemappedFs) {
        let inner = Arc::new(InMemoryFs::default());
        inner
            .mkdir_tree("/remotes/admin/filesystem/var/log")
            .await
            .unwrap();
        let view = RemappedFs::new(inner.clone(), "/remotes/admin/filesystem");
        (inner, view)
    }

    #[tokio::test]
    async fn test_writes_land_in_subtree() {
        let (inner, view) = setup().await;
        view.write_file("/var/log/syslog", b"boot").await.unwrap();
        assert_eq!(
            inner
                .read_file("/remotes/admin/filesystem/var/log/syslog")
                .await
                .unwrap(),
            b"boot"
        );
    }

    #[tokio::test]
    async fn test_dotdot_cannot_escape() {
        let (_inner, view) = setup().await;
        assert_eq!(view.to_inner("/../../etc"), "/remotes/admin/filesystem/etc");
        assert!(!view.exists("/../home").await);
    }

    #[tokio::test]
    async fn test_errors_use_view_paths() {
        let (_inner, view) = setup().await;
        let err = view.read_file("/missing").await.unwrap_err();
        assert_eq!(err.path(), "/missing");
    }

    #[tokio::test]
    async fn test_root_cannot_be_removed() {
        let (_inner, view) = setup().await;
        assert_eq!(view.remove_tree("/").await.unwrap_err().code(), "EINVAL");
    }
}
