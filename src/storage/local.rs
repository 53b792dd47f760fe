use std::path::PathBuf;

use async_trait::async_trait;

use super::{public_url, validate_key, ObjectStorage, StorageError, StoredObject};

/// Writes objects under a root directory; URLs are `{public_base}/{key}`
pub struct LocalDiskStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalDiskStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        validate_key(key)?;

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(key, size, content_type, path = %path.display(), "object stored");

        Ok(StoredObject {
            key: key.to_string(),
            url: public_url(&self.public_base, key),
        })
    }

    fn name(&self) -> &'static str {
        "local_disk"
    }
}
