//! Command-line front-end for the study downloader
//!
//! Connection settings can also come from a `.env` file:
//!
//! ```text
//! DICOM_CREDENTIALS=/path/to/service_account.json
//! DICOM_STORE=projects/p/locations/l/datasets/d/dicomStores/s
//! DICOM_API_BASE_URL=https://healthcare.googleapis.com/v1
//! ```

use anyhow::{Context, bail};
use clap::Parser;
use dicom_downloader::{
    ConsoleProgressReporter, DownloadConfig, FailurePolicy, IntoSessionCallbacks, StudyDownloader, spawn_download,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "dicom-dl", version, about = "Download a DICOM study from a Cloud Healthcare DICOM store")]
struct Args {
    /// Service account JSON key
    #[arg(long, env = "DICOM_CREDENTIALS")]
    credentials: PathBuf,

    /// Store path: projects/{p}/locations/{l}/datasets/{d}/dicomStores/{s}
    #[arg(long, env = "DICOM_STORE")]
    store: String,

    /// Study Instance UID to download
    #[arg(long)]
    study: String,

    /// Folder the study is written into
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Timeout in seconds for token and listing requests
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Timeout in seconds for each instance download
    #[arg(long)]
    instance_timeout: Option<u64>,

    /// Instances requested per listing page
    #[arg(long)]
    page_size: Option<usize>,

    /// Stop at the first instance that fails
    #[arg(long)]
    strict: bool,

    /// Print progress percentages and debug logs
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> anyhow::Result<DownloadConfig> {
        let mut config = DownloadConfig::from_env().context("Invalid DICOM_* environment settings")?;
        if let Some(secs) = self.request_timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.instance_timeout {
            config.instance_timeout = Duration::from_secs(secs);
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if self.strict {
            config.failure_policy = FailurePolicy::AbortOnFirstError;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads its env fallbacks
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let config = args.config()?;

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping after the current instance...");
            on_interrupt.cancel();
        }
    });

    let callbacks = ConsoleProgressReporter::new(args.verbose).into_callbacks();
    let downloader = StudyDownloader::with_callbacks(&args.credentials, args.store.as_str(), callbacks)
        .with_config(config)
        .with_cancellation(cancellation);

    let report = spawn_download(Arc::new(downloader), args.study.as_str(), &args.output)
        .await
        .context("Download task panicked")?;

    if let Some(error) = &report.error {
        bail!("{}", error.detailed_report());
    }
    if report.metrics.failed() > 0 {
        bail!(
            "{} of {} instances could not be downloaded",
            report.metrics.failed(),
            report.metrics.listed
        );
    }
    Ok(())
}
