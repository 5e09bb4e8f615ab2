// Library exports for integration tests
pub mod archive;
pub mod auth;
pub mod config;
pub mod encrypt;
pub mod pipeline;
pub mod process;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use archive::{ArchiveFormat, Archiver, TarArchiver};
pub use auth::Credentials;
pub use config::{BackupSettings, Config, EncryptionMethod};
pub use encrypt::{Encryptor, GpgEncryptor};
pub use pipeline::Pipeline;
pub use storage::{BucketStore, InMemoryStore, ObjectStore};
pub use types::error::BackupError;
