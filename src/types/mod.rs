pub mod error;
pub mod models;

pub use models::{ArchiveArtifact, EncryptedArtifact, RunReport, SignedRequest, UploadReceipt};
