use std::path::PathBuf;
use std::time::Duration;

/// Archive produced by the archiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    pub size: u64,
}

/// Encrypted or signed archive; this is the exact upload payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArtifact {
    pub path: PathBuf,
    pub size: u64,
}

/// A single authenticated PUT, built once per upload attempt
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: &'static str,
    pub url: String,
    pub date: String,
    pub authorization: String,
    pub content_length: u64,
}

impl SignedRequest {
    /// Render the request headers as an HTTP header block
    ///
    /// Each header is on its own CRLF-terminated line and the block ends with
    /// an empty line.
    pub fn header_block(&self) -> String {
        format!(
            "Date: {}\r\nContent-Length: {}\r\nAuthorization: {}\r\n\r\n",
            self.date, self.content_length, self.authorization
        )
    }
}

/// Outcome of an accepted upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub status: u16,
    pub bytes_sent: u64,
}

/// Summary of a completed backup run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub key: String,
    pub bytes_sent: u64,
    pub sha256: String,
    pub elapsed: Duration,
}
