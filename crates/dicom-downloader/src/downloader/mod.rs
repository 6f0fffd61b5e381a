//! Downloader module
//!
//! This module contains the study download session and everything it is
//! built from: core types, configuration, store paths and the remote APIs.

pub mod api;
pub mod config;
pub mod core;
pub mod engine;
pub mod store;

// Re-export main types for convenience
pub use api::{
    DicomWebClient, InstanceListing, InstanceReference, ServiceAccountCredential,
    ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider, get_access_token,
};
pub use config::{DownloadConfig, DownloadConfigBuilder, FailurePolicy};
pub use core::{
    AccessToken, CompositeProgressReporter, ConsoleProgressReporter, DownloadError, ErrorKind,
    ErrorSeverity, FileOperation, IntoSessionCallbacks, LogFn, NullProgressReporter, ProgressFn,
    ProgressTracker, Result, SessionCallbacks, SessionMetrics, SessionMetricsSnapshot,
    SessionReporter, SessionState,
};
pub use engine::{SessionReport, StudyDownloader, spawn_download};
pub use store::StorePath;

#[cfg(test)]
mod test_support;
