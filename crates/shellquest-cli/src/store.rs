//! Progress saved as one JSON file per adventure

use shellquest::{PersistedProgress, ProgressStore, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores progress under a directory as `{adventure-id}.json`.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, adventure_id: &str) -> PathBuf {
        let name: String = adventure_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl ProgressStore for JsonDirStore {
    fn load(&self, adventure_id: &str) -> Result<Option<PersistedProgress>> {
        match std::fs::read_to_string(self.path_for(adventure_id)) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, adventure_id: &str, progress: &PersistedProgress) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(adventure_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(progress)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn clear(&self, adventure_id: &str) -> Result<()> {
        remove_if_present(&self.path_for(adventure_id))
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
