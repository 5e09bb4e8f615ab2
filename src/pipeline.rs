use crate::archive::{Archiver, TarArchiver};
use crate::config::BackupSettings;
use crate::encrypt::{Encryptor, GpgEncryptor};
use crate::storage::{BucketStore, ObjectStore};
use crate::types::error::{BackupError, UploadError};
use crate::types::{ArchiveArtifact, EncryptedArtifact, RunReport};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// One backup run: archive, encrypt, upload, clean up
///
/// Steps run strictly in order and the first failure ends the run.
#[derive(Clone)]
pub struct Pipeline {
    settings: Arc<BackupSettings>,
    archiver: Arc<dyn Archiver>,
    encryptor: Arc<dyn Encryptor>,
    store: Arc<dyn ObjectStore>,
}

impl Pipeline {
    pub fn new(
        settings: Arc<BackupSettings>,
        archiver: Arc<dyn Archiver>,
        encryptor: Arc<dyn Encryptor>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            settings,
            archiver,
            encryptor,
            store,
        }
    }

    /// Wire up tar, gpg and the bucket uploader from the settings
    pub fn from_settings(settings: BackupSettings) -> Result<Self, BackupError> {
        let archiver = Arc::new(TarArchiver::new(
            settings.tools.tar.clone(),
            settings.archive.format,
        ));
        let encryptor = Arc::new(GpgEncryptor::new(
            settings.tools.gpg.clone(),
            &settings.encryption,
        ));
        let store = Arc::new(BucketStore::new(&settings.bucket)?);

        Ok(Self::new(Arc::new(settings), archiver, encryptor, store))
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    pub async fn run(&self, inputs: &[PathBuf]) -> Result<RunReport, BackupError> {
        let started = Instant::now();
        let archive_settings = &self.settings.archive;

        // Format was validated when the settings were loaded
        let timestamp = chrono::Local::now()
            .format(&archive_settings.timestamp_format)
            .to_string();
        let archive_path = archive_settings.archive_path(&timestamp);

        tokio::fs::create_dir_all(&archive_settings.backup_dir)
            .await
            .map_err(|source| BackupError::BackupDir {
                path: archive_settings.backup_dir.clone(),
                source,
            })?;

        let archive = self
            .archiver
            .create(&archive_path, inputs)
            .await
            .map_err(BackupError::Archive)?;
        tracing::info!(
            "Archive created: {} ({} bytes)",
            archive.path.display(),
            archive.size
        );

        let encrypted = self
            .encryptor
            .encrypt(&archive)
            .await
            .map_err(BackupError::Encrypt)?;
        tracing::info!(
            "Encrypted artifact created: {} ({} bytes)",
            encrypted.path.display(),
            encrypted.size
        );

        let key = object_key(&encrypted.path)?;
        let data = read_payload(&encrypted).await?;
        let sha256 = hex::encode(Sha256::digest(&data));

        let receipt = self.store.put_object(&key, data).await?;
        tracing::info!(
            "Upload accepted: key={}, status={}",
            receipt.key,
            receipt.status
        );

        self.cleanup(&archive, &encrypted).await?;

        Ok(RunReport {
            key: receipt.key,
            bytes_sent: receipt.bytes_sent,
            sha256,
            elapsed: started.elapsed(),
        })
    }

    async fn cleanup(
        &self,
        archive: &ArchiveArtifact,
        encrypted: &EncryptedArtifact,
    ) -> Result<(), BackupError> {
        if self.settings.archive.cleanup {
            remove(&archive.path).await?;
        }
        if self.settings.encryption.cleanup {
            remove(&encrypted.path).await?;
        }
        Ok(())
    }
}

/// Object key is the encrypted file's name
fn object_key(path: &Path) -> Result<String, UploadError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| UploadError::InvalidKey {
            path: path.to_path_buf(),
        })
}

async fn read_payload(artifact: &EncryptedArtifact) -> Result<Bytes, UploadError> {
    let data = tokio::fs::read(&artifact.path)
        .await
        .map_err(|source| UploadError::Payload {
            path: artifact.path.clone(),
            source,
        })?;

    let actual = data.len() as u64;
    if actual != artifact.size {
        return Err(UploadError::PayloadChanged {
            path: artifact.path.clone(),
            expected: artifact.size,
            actual,
        });
    }

    Ok(Bytes::from(data))
}

async fn remove(path: &Path) -> Result<(), BackupError> {
    tracing::info!("Removing {}", path.display());
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| BackupError::Cleanup {
            path: path.to_path_buf(),
            source,
        })
}
