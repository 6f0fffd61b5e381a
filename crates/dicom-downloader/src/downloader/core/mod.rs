//! Core types used throughout the downloader system
//!
//! This module contains the fundamental types that all other modules depend on.

pub mod error;
pub mod files;
pub mod http;
pub mod metrics;
pub mod progress;

// Re-export main types for convenience
pub use error::{DownloadError, ErrorKind, ErrorSeverity, FileOperation, Result};
pub use http::{HttpClient, RequestFailure};
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use progress::{
    CompositeProgressReporter, ConsoleProgressReporter, IntoSessionCallbacks, LogFn,
    NullProgressReporter, ProgressFn, ProgressTracker, SessionCallbacks, SessionReporter,
};

use std::fmt;
use std::time::Instant;

/// A bearer token for the Healthcare API
///
/// Lives only in memory for the duration of one session.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            secret: secret.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Instant) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Stages of a download session, entered strictly in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Parsing,
    Authenticating,
    Listing,
    Fetching,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Parsing => write!(f, "parsing store path"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Listing => write!(f, "listing instances"),
            SessionState::Fetching => write!(f, "fetching instances"),
            SessionState::Done => write!(f, "done"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}
