//! Filesystem-backed object storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ObjectStore, PipelineError};
use crate::utils::sanitize_filename;

/// Build the per-user, timestamp-qualified storage key for a document.
///
/// Shape: `{user_id}/harvest/{yyyymmdd-HHMMSS}-{sanitized filename}`.
pub fn storage_key(user_id: &str, now: DateTime<Utc>, filename: &str) -> String {
    format!(
        "{}/harvest/{}-{}",
        sanitize_filename(user_id),
        now.format("%Y%m%d-%H%M%S"),
        sanitize_filename(filename)
    )
}

/// Object store rooted at a local directory. Keys map to relative paths.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Absolute path an object key resolves to.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        content: &[u8],
        _content_type: &str,
    ) -> Result<(), PipelineError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
