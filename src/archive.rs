use crate::process;
use crate::types::ArchiveArtifact;
use crate::types::error::{ConfigError, ProcessError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Compression applied by tar, chosen from the configured extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveFormat {
    /// Map a file extension to an archive format
    ///
    /// `zip` and `7z` are known but not implemented; anything else is unsupported.
    pub fn from_extension(extension: &str) -> Result<Self, ConfigError> {
        match extension.to_ascii_lowercase().as_str() {
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "tar.bz2" | "tbz2" => Ok(ArchiveFormat::TarBz2),
            "tar.xz" | "txz" => Ok(ArchiveFormat::TarXz),
            "zip" | "7z" => Err(ConfigError::NotImplemented(extension.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
        }
    }

    /// tar mode flags for creating an archive of this format
    fn create_flags(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "-cf",
            ArchiveFormat::TarGz => "-czf",
            ArchiveFormat::TarBz2 => "-cjf",
            ArchiveFormat::TarXz => "-cJf",
        }
    }
}

/// Builds the archive from the input paths
#[async_trait::async_trait]
pub trait Archiver: Send + Sync {
    async fn create(
        &self,
        output: &Path,
        inputs: &[PathBuf],
    ) -> Result<ArchiveArtifact, ProcessError>;
}

/// Archiver backed by the system `tar`
pub struct TarArchiver {
    program: String,
    format: ArchiveFormat,
}

impl TarArchiver {
    pub fn new(program: impl Into<String>, format: ArchiveFormat) -> Self {
        Self {
            program: program.into(),
            format,
        }
    }

    pub fn arguments(&self, output: &Path, inputs: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.format.create_flags().into(), output.into()];
        args.push("--".into());
        args.extend(inputs.iter().map(OsString::from));
        args
    }
}

#[async_trait::async_trait]
impl Archiver for TarArchiver {
    async fn create(
        &self,
        output: &Path,
        inputs: &[PathBuf],
    ) -> Result<ArchiveArtifact, ProcessError> {
        tracing::info!(
            "Archiving {} path(s) into {}",
            inputs.len(),
            output.display()
        );

        let args = self.arguments(output, inputs);
        let result = process::run(&self.program, &args).await?.check()?;

        let metadata = tokio::fs::metadata(output)
            .await
            .map_err(|source| ProcessError::MissingOutput {
                command: result.command,
                path: output.to_path_buf(),
                source,
            })?;

        Ok(ArchiveArtifact {
            path: output.to_path_buf(),
            size: metadata.len(),
        })
    }
}
