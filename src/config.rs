use crate::archive::ArchiveFormat;
use crate::auth::Credentials;
use crate::storage::is_safe_key;
use crate::types::error::ConfigError;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Storage domain used when the bucket section names no endpoint
pub const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";

const DEFAULT_TAR: &str = "tar";
const DEFAULT_GPG: &str = "gpg";

/// Settings file as written on disk
///
/// Every field is optional here so that validation can name the missing
/// field and its section instead of failing inside the deserializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<BucketConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub name: Option<String>,
    pub extension: Option<String>,
    #[serde(alias = "timestamp-format")]
    pub timestamp_format: Option<String>,
    #[serde(alias = "backup-dir")]
    pub backup_dir: Option<String>,
    #[serde(default)]
    pub cleanup: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketConfig {
    pub bucket: Option<String>,
    pub key: Option<String>,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(alias = "user-id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub cleanup: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpg: Option<String>,
}

impl Config {
    /// Read a settings file; `.yml`/`.yaml` files are parsed as YAML, anything else as JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yml") | Some("yaml")
        );

        let parsed = if is_yaml {
            serde_yml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Validate the raw file contents into immutable run settings
    pub fn into_settings(self) -> Result<BackupSettings, ConfigError> {
        let archive = self.archive.ok_or(ConfigError::MissingSection { section: "archive" })?;
        let bucket = self.bucket.ok_or(ConfigError::MissingSection { section: "bucket" })?;
        let encryption = self
            .encryption
            .ok_or(ConfigError::MissingSection { section: "encryption" })?;
        let tools = self.tools.unwrap_or_default();

        let archive = ArchiveSettings::try_from(archive)?;
        let bucket = BucketSettings::try_from(bucket)?;
        let encryption = EncryptionSettings::try_from(encryption)?;

        let tools = ToolSettings {
            tar: optional(tools.tar).unwrap_or_else(|| DEFAULT_TAR.to_string()),
            gpg: optional(tools.gpg).unwrap_or_else(|| DEFAULT_GPG.to_string()),
        };

        Ok(BackupSettings {
            archive,
            bucket,
            encryption,
            tools,
        })
    }
}

/// Validated settings for one backup run
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub archive: ArchiveSettings,
    pub bucket: BucketSettings,
    pub encryption: EncryptionSettings,
    pub tools: ToolSettings,
}

impl BackupSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::from_file(path)?.into_settings()
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub name: String,
    pub extension: String,
    pub format: ArchiveFormat,
    pub timestamp_format: String,
    pub backup_dir: PathBuf,
    pub cleanup: bool,
}

impl ArchiveSettings {
    /// Archive file name: `<name>_<timestamp>.<extension>`
    pub fn file_name(&self, timestamp: &str) -> String {
        format!("{}_{}.{}", self.name, timestamp, self.extension)
    }

    pub fn archive_path(&self, timestamp: &str) -> PathBuf {
        self.backup_dir.join(self.file_name(timestamp))
    }
}

impl TryFrom<ArchiveConfig> for ArchiveSettings {
    type Error = ConfigError;

    fn try_from(raw: ArchiveConfig) -> Result<Self, Self::Error> {
        const SECTION: &str = "archive";

        let name = required(raw.name, SECTION, "name")?;
        let extension = required(raw.extension, SECTION, "extension")?;
        let extension = extension.trim_start_matches('.').to_string();
        let timestamp_format = required(raw.timestamp_format, SECTION, "timestamp_format")?;
        let backup_dir = required(raw.backup_dir, SECTION, "backup_dir")?;

        if StrftimeItems::new(&timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimestampFormat(timestamp_format));
        }

        // The archive file name becomes the object key
        let sample = chrono::Local::now().format(&timestamp_format).to_string();
        for (field, value) in [
            ("name", &name),
            ("extension", &extension),
            ("timestamp_format", &sample),
        ] {
            if !is_safe_key(value) {
                return Err(ConfigError::UnsafeKeyPart {
                    field,
                    value: value.clone(),
                });
            }
        }

        let format = ArchiveFormat::from_extension(&extension)?;

        Ok(Self {
            name,
            extension,
            format,
            timestamp_format,
            backup_dir: PathBuf::from(backup_dir),
            cleanup: raw.cleanup,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BucketSettings {
    pub bucket: String,
    pub credentials: Credentials,
    pub endpoint: String,
    pub path_style: bool,
}

impl TryFrom<BucketConfig> for BucketSettings {
    type Error = ConfigError;

    fn try_from(raw: BucketConfig) -> Result<Self, Self::Error> {
        const SECTION: &str = "bucket";

        let secret = required(raw.secret, SECTION, "secret")?;
        let bucket = required(raw.bucket, SECTION, "bucket")?;
        let key = required(raw.key, SECTION, "key")?;
        let endpoint = optional(raw.endpoint)
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            bucket,
            credentials: Credentials::new(key, secret),
            endpoint,
            path_style: raw.path_style,
        })
    }
}

/// How the archive is protected before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    Sign,
    Encrypt,
}

impl FromStr for EncryptionMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign" => Ok(EncryptionMethod::Sign),
            "encrypt" => Ok(EncryptionMethod::Encrypt),
            other => Err(ConfigError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMethod::Sign => write!(f, "sign"),
            EncryptionMethod::Encrypt => write!(f, "encrypt"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncryptionSettings {
    pub method: EncryptionMethod,
    pub recipient: Option<String>,
    pub user_id: Option<String>,
    pub cleanup: bool,
}

impl TryFrom<EncryptionConfig> for EncryptionSettings {
    type Error = ConfigError;

    fn try_from(raw: EncryptionConfig) -> Result<Self, Self::Error> {
        let method = raw.method.ok_or(ConfigError::MissingField {
            section: "encryption",
            field: "method",
        })?;
        let method = method.trim().parse::<EncryptionMethod>()?;
        let recipient = optional(raw.recipient);

        if method == EncryptionMethod::Encrypt && recipient.is_none() {
            return Err(ConfigError::MissingRecipient);
        }

        Ok(Self {
            method,
            recipient,
            user_id: optional(raw.user_id),
            cleanup: raw.cleanup,
        })
    }
}

/// External programs invoked by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub tar: String,
    pub gpg: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tar: DEFAULT_TAR.to_string(),
            gpg: DEFAULT_GPG.to_string(),
        }
    }
}

fn required(
    value: Option<String>,
    section: &'static str,
    field: &'static str,
) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::MissingField { section, field })?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyField { section, field });
    }
    Ok(value)
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
