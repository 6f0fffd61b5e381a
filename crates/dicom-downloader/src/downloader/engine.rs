//! Study download sessions
//!
//! The call chain for one session:
//!
//! Caller
//! ↓
//! StudyDownloader::download (this file)
//! ↓
//! StorePath::parse (store.rs)
//! ↓
//! TokenProvider / ServiceAccountTokenProvider (api/auth.rs)
//! ↓
//! DicomWebClient (api/dicomweb.rs)
//! ↓
//! write_response_to_file (core/files.rs)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::downloader::api::{DicomWebClient, InstanceReference, ServiceAccountTokenProvider, TokenProvider};
use crate::downloader::config::{DownloadConfig, FailurePolicy};
use crate::downloader::core::files::{ensure_dir, write_response_to_file};
use crate::downloader::core::{
    AccessToken, DownloadError, HttpClient, LogFn, ProgressFn, ProgressTracker, Result,
    SessionCallbacks, SessionMetrics, SessionMetricsSnapshot, SessionState,
};
use crate::downloader::store::StorePath;

/// Outcome of one `download` call
#[derive(Debug)]
pub struct SessionReport {
    /// Terminal state, either `Done` or `Failed`
    pub state: SessionState,
    /// Stage the session was in when it failed
    pub failed_stage: Option<SessionState>,
    pub error: Option<DownloadError>,
    pub metrics: SessionMetricsSnapshot,
    /// Instance files written, in listing order
    pub files: Vec<PathBuf>,
}

impl SessionReport {
    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }

    /// Done with every listed instance on disk
    pub fn is_complete(&self) -> bool {
        self.is_done() && self.metrics.failed() == 0
    }
}

/// Mutable bookkeeping for the session in flight
struct SessionRun {
    stage: SessionState,
    files: Vec<PathBuf>,
}

/// Downloads every instance of a study from one DICOM store
///
/// The progress updater and log sink are the session's only outputs besides
/// the files on disk. A downloader runs one session at a time; its metrics
/// describe the most recent one.
pub struct StudyDownloader {
    credential_path: PathBuf,
    store_path: String,
    callbacks: SessionCallbacks,
    config: DownloadConfig,
    token_provider: Option<Arc<dyn TokenProvider>>,
    cancellation: Option<CancellationToken>,
    metrics: Arc<SessionMetrics>,
}

impl std::fmt::Debug for StudyDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyDownloader")
            .field("credential_path", &self.credential_path)
            .field("store_path", &self.store_path)
            .field("config", &self.config)
            .field("custom_token_provider", &self.token_provider.is_some())
            .finish_non_exhaustive()
    }
}

impl StudyDownloader {
    /// Create a downloader for the store at `store_path`
    ///
    /// Nothing is read or parsed until [`download`](Self::download) runs.
    pub fn new<P, S>(credential_path: P, store_path: S, progress: ProgressFn, log: LogFn) -> Self
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        Self::with_callbacks(credential_path, store_path, SessionCallbacks::new(progress, log))
    }

    /// Create a downloader from an already bundled pair of callbacks
    pub fn with_callbacks<P, S>(credential_path: P, store_path: S, callbacks: SessionCallbacks) -> Self
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        Self {
            credential_path: credential_path.into(),
            store_path: store_path.into(),
            callbacks,
            config: DownloadConfig::default(),
            token_provider: None,
            cancellation: None,
            metrics: Arc::new(SessionMetrics::default()),
        }
    }

    pub fn with_config(mut self, config: DownloadConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `provider` instead of exchanging the credential file
    pub fn with_token_provider<T: TokenProvider + 'static>(mut self, provider: T) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Stop before the next instance fetch once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Counters for the current or most recent session
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Download every instance of `study_id` into `output_folder`
    ///
    /// Never returns an error: failures are reported through the log sink
    /// and the returned [`SessionReport`]. A final log line is always emitted.
    pub async fn download(&self, study_id: &str, output_folder: impl AsRef<Path>) -> SessionReport {
        let output_folder = output_folder.as_ref();
        self.metrics.reset();

        let mut run = SessionRun {
            stage: SessionState::Parsing,
            files: Vec::new(),
        };
        let result = self.run(study_id, output_folder, &mut run).await;
        let metrics = self.metrics.snapshot();

        match result {
            Ok(()) => {
                if metrics.all_writes_failed() {
                    self.log_warn(&format!(
                        "All {} instances failed to write to {}; check that the folder is writable and has free space",
                        metrics.listed,
                        output_folder.display()
                    ));
                }
                self.log_info(&format!(
                    "Download finished: {} of {} instances saved to {} ({} failed, {} bytes)",
                    metrics.succeeded,
                    metrics.listed,
                    output_folder.display(),
                    metrics.failed(),
                    metrics.bytes_written
                ));
                SessionReport {
                    state: SessionState::Done,
                    failed_stage: None,
                    error: None,
                    metrics,
                    files: run.files,
                }
            }
            Err(e) => {
                error!("Session failed while {}: {}", run.stage, e.detailed_report());
                let line = match e.suggestion() {
                    Some(suggestion) => format!("Download failed while {}: {} ({})", run.stage, e, suggestion),
                    None => format!("Download failed while {}: {}", run.stage, e),
                };
                self.callbacks.append_log(&line);
                SessionReport {
                    state: SessionState::Failed,
                    failed_stage: Some(run.stage),
                    error: Some(e),
                    metrics,
                    files: run.files,
                }
            }
        }
    }

    async fn run(&self, study_id: &str, output_folder: &Path, run: &mut SessionRun) -> Result<()> {
        self.enter(run, SessionState::Parsing);
        let store = StorePath::parse(&self.store_path)?;
        let study_id = study_id.trim();
        if study_id.is_empty() {
            return Err(DownloadError::InvalidStudyId);
        }
        self.config.validate()?;
        debug!("Resolved store {}", store);

        self.enter(run, SessionState::Authenticating);
        let http = HttpClient::from_config(&self.config)?;
        let token = self.obtain_token(&http).await?;
        self.log_info("Access token obtained");

        self.enter(run, SessionState::Listing);
        let client = DicomWebClient::new(http, &store, &self.config);
        let listing = client.list_study_instances(&token, study_id).await?;
        if listing.skipped > 0 {
            self.log_warn(&format!(
                "Skipped {} listing entries without a series or SOP instance UID",
                listing.skipped
            ));
        }

        let total = listing.instances.len();
        self.metrics.record_listed(total);
        if total == 0 {
            self.callbacks.report_progress(1.0);
            self.log_info(&format!("No instances found for study {}", study_id));
            return Ok(());
        }
        self.log_info(&format!(
            "Found {} instances in study {} across {} listing page(s)",
            total, study_id, listing.pages
        ));

        self.enter(run, SessionState::Fetching);
        if let Err(e) = ensure_dir(output_folder).await {
            // Each instance will fail to write and be logged on its own
            self.log_warn(&format!("Could not create output folder: {}", e));
        }

        let mut tracker = ProgressTracker::new(total);
        for (index, instance) in listing.instances.iter().enumerate() {
            if let Some(cancellation) = &self.cancellation {
                if cancellation.is_cancelled() {
                    return Err(DownloadError::Cancelled {
                        reason: format!("stopped after {} of {} instances", index, total),
                    });
                }
            }

            let position = index + 1;
            let dest = output_folder.join(instance.relative_path());
            let outcome = self.fetch_instance(&client, &token, instance, &dest).await;

            let failure = match outcome {
                Ok(size) => {
                    self.metrics.record_success(size);
                    self.log_info(&format!("[{}/{}] Saved {} ({} bytes)", position, total, dest.display(), size));
                    run.files.push(dest);
                    None
                }
                Err(e) => {
                    self.metrics.record_failure(&e);
                    self.log_warn(&format!("[{}/{}] Failed {}: {}", position, total, instance, e));
                    Some(e)
                }
            };

            self.callbacks.report_progress(tracker.advance());

            if let Some(e) = failure {
                if self.config.failure_policy == FailurePolicy::AbortOnFirstError {
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn obtain_token(&self, http: &HttpClient) -> Result<AccessToken> {
        match &self.token_provider {
            Some(provider) => provider.access_token().await,
            None => {
                ServiceAccountTokenProvider::new(&self.credential_path, self.config.clone())
                    .with_http_client(http.clone())
                    .access_token()
                    .await
            }
        }
    }

    async fn fetch_instance(
        &self,
        client: &DicomWebClient,
        token: &AccessToken,
        instance: &InstanceReference,
        dest: &Path,
    ) -> Result<u64> {
        let (url, response) = client.fetch_instance(token, instance).await?;
        write_response_to_file(response, url.as_str(), dest).await
    }

    fn enter(&self, run: &mut SessionRun, stage: SessionState) {
        run.stage = stage;
        let line = match stage {
            SessionState::Parsing => format!("Parsing store path {}", self.store_path.trim()),
            SessionState::Authenticating => format!("Authenticating with {}", self.credential_path.display()),
            SessionState::Listing => "Listing study instances".to_string(),
            SessionState::Fetching => "Fetching instances".to_string(),
            SessionState::Done | SessionState::Failed => return,
        };
        self.log_info(&line);
    }

    fn log_info(&self, line: &str) {
        info!("{}", line);
        self.callbacks.append_log(line);
    }

    fn log_warn(&self, line: &str) {
        warn!("{}", line);
        self.callbacks.append_log(line);
    }
}

/// Run a session on the tokio runtime, off the caller's task
pub fn spawn_download<S, P>(downloader: Arc<StudyDownloader>, study_id: S, output_folder: P) -> JoinHandle<SessionReport>
where
    S: Into<String>,
    P: Into<PathBuf>,
{
    let study_id = study_id.into();
    let output_folder = output_folder.into();
    tokio::spawn(async move { downloader.download(&study_id, &output_folder).await })
}
