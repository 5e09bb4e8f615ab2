use super::backend::ObjectStore;
use crate::types::UploadReceipt;
use crate::types::error::UploadError;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory object store for testing/development
#[derive(Clone, Default)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    puts: Arc<RwLock<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    /// Number of PUTs received, successful or not
    pub async fn put_count(&self) -> usize {
        *self.puts.read().await
    }
}

#[async_trait::async_trait]
impl ObjectStore for InMemoryStore {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<UploadReceipt, UploadError> {
        *self.puts.write().await += 1;

        let bytes_sent = data.len() as u64;
        self.objects.write().await.insert(key.to_string(), data);

        Ok(UploadReceipt {
            key: key.to_string(),
            status: 200,
            bytes_sent,
        })
    }
}
