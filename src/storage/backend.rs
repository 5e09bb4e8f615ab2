use crate::types::UploadReceipt;
use crate::types::error::UploadError;
use bytes::Bytes;

/// Object store trait - implement this for different upload targets
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<UploadReceipt, UploadError>;
}
