use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised while loading and validating the settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("missing required section `{section}`")]
    MissingSection { section: &'static str },

    #[error("missing required field `{field}` in section `{section}`")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    #[error("field `{field}` in section `{section}` must not be empty")]
    EmptyField {
        section: &'static str,
        field: &'static str,
    },

    #[error("invalid encryption method '{0}' in section `encryption`, expected 'sign' or 'encrypt'")]
    InvalidMethod(String),

    #[error("encryption method 'encrypt' requires field `recipient` in section `encryption`")]
    MissingRecipient,

    #[error("invalid timestamp format '{0}' in section `archive`")]
    InvalidTimestampFormat(String),

    #[error("field `{field}` in section `archive` yields '{value}', which cannot be used in an object key")]
    UnsafeKeyPart { field: &'static str, value: String },

    #[error("archive format '{0}' is not implemented")]
    NotImplemented(String),

    #[error("unsupported archive format '{0}'")]
    UnsupportedFormat(String),
}

/// Errors raised by external tool invocations (tar, gpg)
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{command}' failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("command '{command}' did not produce '{}': {source}", path.display())]
    MissingOutput {
        command: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Exit code of the failed command, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Failed { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Errors raised while signing or verifying a request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid authorization header: {0}")]
    InvalidHeader(String),

    #[error("the request signature does not match")]
    SignatureDoesNotMatch,
}

/// Errors raised while transmitting the payload to the bucket
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read payload '{}': {source}", path.display())]
    Payload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("payload '{}' changed size: expected {expected} bytes, read {actual}", path.display())]
    PayloadChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("object key could not be derived from '{}'", path.display())]
    InvalidKey { path: PathBuf },

    #[error("object key '{0}' contains characters that would need URL encoding")]
    UnsafeKey(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Transport(String),
}

/// Top-level error for a backup run
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to prepare backup directory '{}': {source}", path.display())]
    BackupDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archiving failed: {0}")]
    Archive(#[source] ProcessError),

    #[error("encryption failed: {0}")]
    Encrypt(#[source] ProcessError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("failed to remove '{}': {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    /// Process exit code reported for this failure
    pub fn exit_code(&self) -> u8 {
        1
    }
}
