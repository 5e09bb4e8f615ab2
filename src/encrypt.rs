use crate::config::{EncryptionMethod, EncryptionSettings};
use crate::process;
use crate::types::error::ProcessError;
use crate::types::{ArchiveArtifact, EncryptedArtifact};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Extension appended to the archive name for the gpg output
pub const ENCRYPTED_EXTENSION: &str = "gpg";

/// Protects the archive before upload
#[async_trait::async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt(&self, archive: &ArchiveArtifact) -> Result<EncryptedArtifact, ProcessError>;
}

/// Encryptor backed by the system `gpg`
pub struct GpgEncryptor {
    program: String,
    method: EncryptionMethod,
    recipient: Option<String>,
    user_id: Option<String>,
}

impl GpgEncryptor {
    pub fn new(program: impl Into<String>, settings: &EncryptionSettings) -> Self {
        Self {
            program: program.into(),
            method: settings.method,
            recipient: settings.recipient.clone(),
            user_id: settings.user_id.clone(),
        }
    }

    /// `<archive>.gpg`, next to the archive
    pub fn output_path(archive: &Path) -> PathBuf {
        let mut name = archive.as_os_str().to_os_string();
        name.push(".");
        name.push(ENCRYPTED_EXTENSION);
        PathBuf::from(name)
    }

    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--batch".into(),
            "--yes".into(),
            "--output".into(),
            output.into(),
        ];

        match self.method {
            EncryptionMethod::Encrypt => {
                if let Some(recipient) = &self.recipient {
                    args.push("--recipient".into());
                    args.push(recipient.into());
                }
                if let Some(user_id) = &self.user_id {
                    args.push("--local-user".into());
                    args.push(user_id.into());
                    args.push("--sign".into());
                }
                args.push("--encrypt".into());
            }
            EncryptionMethod::Sign => {
                if let Some(user_id) = &self.user_id {
                    args.push("--local-user".into());
                    args.push(user_id.into());
                }
                args.push("--sign".into());
            }
        }

        args.push(input.into());
        args
    }
}

#[async_trait::async_trait]
impl Encryptor for GpgEncryptor {
    async fn encrypt(&self, archive: &ArchiveArtifact) -> Result<EncryptedArtifact, ProcessError> {
        let output = Self::output_path(&archive.path);
        tracing::info!(
            "Applying gpg {} to {} ({} bytes)",
            self.method,
            archive.path.display(),
            archive.size
        );

        let args = self.arguments(&archive.path, &output);
        let result = process::run(&self.program, &args).await?.check()?;

        let metadata = tokio::fs::metadata(&output)
            .await
            .map_err(|source| ProcessError::MissingOutput {
                command: result.command,
                path: output.clone(),
                source,
            })?;

        Ok(EncryptedArtifact {
            path: output,
            size: metadata.len(),
        })
    }
}
