use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{public_url, validate_key, ObjectStorage, StorageError, StoredObject};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in memory; used in tests to assert what reached storage
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredBlob>>,
    public_base: String,
}

impl MemoryStorage {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            public_base: public_base.into(),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        validate_key(key)?;

        self.objects.write().await.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );

        Ok(StoredObject {
            key: key.to_string(),
            url: public_url(&self.public_base, key),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
