use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vaultput::{BackupError, BackupSettings, Pipeline};

const DEFAULT_LOG_LEVEL: &str = "info";

/// vaultput: archive, encrypt and upload files to a storage bucket
#[derive(Parser, Debug)]
#[command(name = "vaultput", version)]
#[command(about = "Archive files, encrypt or sign the archive with gpg, and upload it to a bucket", long_about = None)]
struct Cli {
    /// Log filter, e.g. "info" or "vaultput=debug"
    #[arg(long, env = "VAULTPUT_LOG", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Path to the configuration file
    config: PathBuf,

    /// Files and directories to include in the archive
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Backup failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<(), BackupError> {
    let settings = BackupSettings::from_file(&cli.config)?;
    tracing::info!("Loaded configuration from {}", cli.config.display());
    tracing::info!(
        "Using bucket: {} ({})",
        settings.bucket.bucket,
        settings.bucket.endpoint
    );
    tracing::info!("Using access key: {}", settings.bucket.credentials.access_key_id);

    let pipeline = Pipeline::from_settings(settings)?;
    let report = pipeline.run(&cli.paths).await?;

    println!(
        "Backup uploaded as {} in {:.2}s ({} bytes, sha256 {})",
        report.key,
        report.elapsed.as_secs_f64(),
        report.bytes_sent,
        report.sha256
    );
    Ok(())
}
