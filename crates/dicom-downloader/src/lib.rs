//! DICOM Study Downloader
//!
//! This library downloads every instance of a study from a Google Cloud
//! Healthcare API DICOM store. It authenticates with a service-account key,
//! pages through the study's instances over DICOMweb, and writes each
//! instance to disk while reporting progress and log lines to the caller.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dicom_downloader::{StudyDownloader, spawn_download};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let downloader = StudyDownloader::new(
//!     "/path/to/service_account.json",
//!     "projects/my-project/locations/us-central1/datasets/imaging/dicomStores/clinical",
//!     Arc::new(|fraction: f64| println!("{:.0}%", fraction * 100.0)),
//!     Arc::new(|line: &str| println!("{}", line)),
//! );
//!
//! // Run the session in the background and wait for its report
//! let handle = spawn_download(Arc::new(downloader), "1.2.840.113619.2.55.3", "/path/to/output");
//! let report = handle.await.expect("download task panicked");
//! println!("{} instances saved", report.metrics.succeeded);
//! # }
//! ```
//!
//! # Features
//!
//! - **Service-account auth**: RS256-signed JWT exchanged for a bearer token
//! - **Paginated listing**: QIDO-RS search pages followed to the end
//! - **Streaming writes**: each instance streamed to a temp file and renamed into place
//! - **Lenient or strict**: skip failed instances or stop at the first one
//! - **Cancellation**: stop cleanly between instances
//! - **Async/await**: Full async support with Tokio runtime

pub mod downloader;

// Re-export commonly used types for convenience
pub use downloader::{
    AccessToken, ConsoleProgressReporter, DownloadConfig, DownloadError, ErrorKind, FailurePolicy,
    IntoSessionCallbacks, LogFn, ProgressFn, Result, SessionCallbacks, SessionReport,
    SessionReporter, SessionState, StaticTokenProvider, StorePath, StudyDownloader,
    TokenProvider, get_access_token, spawn_download,
};
