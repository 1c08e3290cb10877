use super::{public_url, ObjectStorage, StorageResult, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

/// In-process object storage. Objects are served back by the media route.
pub struct MemoryObjectStorage {
    base_url: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<String> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(public_url(&self.base_url, key))
    }

    async fn download(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        Ok(self.objects.get(key).map(|entry| entry.value().clone()))
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
