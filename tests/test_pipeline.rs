mod helpers;

use axum::http::StatusCode;
use helpers::{TEST_ACCESS_KEY_ID, TEST_BUCKET, TEST_SECRET_ACCESS_KEY, TestBucket};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use vaultput::process;
use vaultput::types::error::{ProcessError, UploadError};
use vaultput::types::{ArchiveArtifact, EncryptedArtifact};
use vaultput::{
    Archiver, BackupError, BackupSettings, BucketStore, Config, Encryptor, GpgEncryptor,
    InMemoryStore, Pipeline, TarArchiver,
};

/// Archiver that always fails with a real non-zero exit status
#[derive(Default)]
struct FailingArchiver {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Archiver for FailingArchiver {
    async fn create(
        &self,
        _output: &Path,
        _inputs: &[PathBuf],
    ) -> Result<ArchiveArtifact, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        process::run("false", &[]).await?.check()?;
        unreachable!("`false` always exits non-zero")
    }
}

/// Stand-in for gpg: copies the archive to `<archive>.gpg`
#[derive(Default)]
struct CopyEncryptor {
    fail: bool,
    calls: AtomicUsize,
}

impl CopyEncryptor {
    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Encryptor for CopyEncryptor {
    async fn encrypt(&self, archive: &ArchiveArtifact) -> Result<EncryptedArtifact, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            process::run("false", &[]).await?.check()?;
        }

        let output = GpgEncryptor::output_path(&archive.path);
        let mut data = b"-----ENCRYPTED-----\n".to_vec();
        data.extend(std::fs::read(&archive.path).unwrap());
        std::fs::write(&output, &data).unwrap();

        Ok(EncryptedArtifact {
            path: output,
            size: data.len() as u64,
        })
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    inputs: Vec<PathBuf>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"remember the milk").unwrap();

        let folder = dir.path().join("photos");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("cat.jpg"), vec![7u8; 4096]).unwrap();

        Self {
            inputs: vec![file, folder],
            dir,
        }
    }

    fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Write a JSON config for the `nightly` backup and load it
    fn settings(&self, endpoint: &str, cleanup: bool) -> BackupSettings {
        let config = serde_json::json!({
            "archive": {
                "name": "nightly",
                "extension": "tar.gz",
                "timestamp_format": "%Y%m%d-%H%M%S",
                "backup_dir": self.backup_dir(),
                "cleanup": cleanup
            },
            "bucket": {
                "bucket": TEST_BUCKET,
                "key": TEST_ACCESS_KEY_ID,
                "secret": TEST_SECRET_ACCESS_KEY,
                "endpoint": endpoint,
                "path_style": true
            },
            "encryption": {
                "method": "encrypt",
                "recipient": "ops@example.com",
                "cleanup": cleanup
            }
        });

        let path = self.dir.path().join("vaultput.json");
        std::fs::write(&path, config.to_string()).unwrap();
        BackupSettings::from_file(&path).unwrap()
    }

    fn backup_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.backup_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[tokio::test]
async fn test_nightly_backup_end_to_end() {
    let fixture = Fixture::new();
    let server = TestBucket::start().await;
    let settings = fixture.settings(&server.endpoint(), false);

    let archiver = Arc::new(TarArchiver::new(
        settings.tools.tar.clone(),
        settings.archive.format,
    ));
    let store = Arc::new(BucketStore::new(&settings.bucket).unwrap());
    let pipeline = Pipeline::new(
        Arc::new(settings),
        archiver,
        Arc::new(CopyEncryptor::default()),
        store,
    );

    let report = pipeline.run(&fixture.inputs).await.unwrap();

    let files = fixture.backup_files();
    assert_eq!(files.len(), 2, "one archive and one encrypted file: {files:?}");
    let archive = files.iter().find(|f| f.ends_with(".tar.gz")).unwrap();
    let encrypted = files.iter().find(|f| f.ends_with(".tar.gz.gpg")).unwrap();
    assert!(archive.starts_with("nightly_"));
    assert_eq!(encrypted, &format!("{}.gpg", archive));

    let puts = server.puts();
    assert_eq!(puts.len(), 1, "exactly one PUT");
    assert_eq!(puts[0].key, *encrypted);
    assert_eq!(report.key, *encrypted);

    let on_disk = std::fs::metadata(fixture.backup_dir().join(encrypted))
        .unwrap()
        .len();
    assert_eq!(report.bytes_sent, on_disk);
    assert_eq!(puts[0].body.len() as u64, on_disk);
    assert_eq!(report.sha256.len(), 64);
}

#[tokio::test]
async fn test_cleanup_removes_flagged_files_after_upload() {
    let fixture = Fixture::new();
    let settings = fixture.settings("unused.example.com", true);
    let store = InMemoryStore::new();

    let pipeline = Pipeline::new(
        Arc::new(settings.clone()),
        Arc::new(TarArchiver::new("tar", settings.archive.format)),
        Arc::new(CopyEncryptor::default()),
        Arc::new(store.clone()),
    );

    let report = pipeline.run(&fixture.inputs).await.unwrap();

    assert!(fixture.backup_files().is_empty());
    assert_eq!(store.put_count().await, 1);
    assert_eq!(
        store.get(&report.key).await.unwrap().len() as u64,
        report.bytes_sent
    );
}

#[tokio::test]
async fn test_archiver_failure_stops_pipeline() {
    let fixture = Fixture::new();
    let settings = fixture.settings("unused.example.com", false);
    let archiver = Arc::new(FailingArchiver::default());
    let encryptor = Arc::new(CopyEncryptor::default());
    let store = InMemoryStore::new();

    let pipeline = Pipeline::new(
        Arc::new(settings),
        archiver.clone(),
        encryptor.clone(),
        Arc::new(store.clone()),
    );

    let err = pipeline.run(&fixture.inputs).await.unwrap_err();

    match &err {
        BackupError::Archive(process_err) => assert_eq!(process_err.exit_code(), Some(1)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 1);
    assert_eq!(archiver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(encryptor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.put_count().await, 0);
}

#[tokio::test]
async fn test_encryptor_failure_stops_pipeline() {
    let fixture = Fixture::new();
    let settings = fixture.settings("unused.example.com", true);
    let encryptor = Arc::new(CopyEncryptor::failing());
    let store = InMemoryStore::new();

    let pipeline = Pipeline::new(
        Arc::new(settings.clone()),
        Arc::new(TarArchiver::new("tar", settings.archive.format)),
        encryptor.clone(),
        Arc::new(store.clone()),
    );

    let err = pipeline.run(&fixture.inputs).await.unwrap_err();

    assert!(matches!(err, BackupError::Encrypt(_)));
    assert_eq!(encryptor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.put_count().await, 0);
    // cleanup only runs after a successful upload
    assert_eq!(fixture.backup_files().len(), 1);
}

#[tokio::test]
async fn test_upload_rejection_fails_run_and_keeps_files() {
    let fixture = Fixture::new();
    let server = TestBucket::start_with_response(StatusCode::FORBIDDEN, "denied").await;
    let settings = fixture.settings(&server.endpoint(), true);

    let pipeline = Pipeline::new(
        Arc::new(settings.clone()),
        Arc::new(TarArchiver::new("tar", settings.archive.format)),
        Arc::new(CopyEncryptor::default()),
        Arc::new(BucketStore::new(&settings.bucket).unwrap()),
    );

    let err = pipeline.run(&fixture.inputs).await.unwrap_err();

    match err {
        BackupError::Upload(UploadError::Rejected { status, body }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "denied");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.puts().len(), 1);
    assert_eq!(fixture.backup_files().len(), 2);
}

#[tokio::test]
async fn test_from_settings_wires_real_tools() {
    let fixture = Fixture::new();
    fixture.settings("unused.example.com", false);
    let written = std::fs::read_to_string(fixture.dir.path().join("vaultput.json")).unwrap();
    let mut config: Config = serde_json::from_str(&written).unwrap();
    config.tools = Some(vaultput::config::ToolsConfig {
        tar: Some("tar".to_string()),
        gpg: Some("vaultput-no-such-gpg".to_string()),
    });

    let pipeline = Pipeline::from_settings(config.into_settings().unwrap()).unwrap();
    assert_eq!(pipeline.settings().tools.gpg, "vaultput-no-such-gpg");

    let err = pipeline.run(&fixture.inputs).await.unwrap_err();
    assert!(matches!(
        err,
        BackupError::Encrypt(ProcessError::Spawn { .. })
    ));
}
