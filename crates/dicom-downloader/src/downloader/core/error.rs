//! Error types for the study downloader with stage context and recovery information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while downloading a study
///
/// Every variant maps onto one [`ErrorKind`], which decides whether the
/// failure ends the whole session or only the current instance.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The credential document could not be read from disk
    #[error("Failed to read service account credential '{path}'")]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential document is not a usable service account key
    #[error("Invalid service account credential '{path}': {reason}")]
    CredentialFormat {
        path: PathBuf,
        reason: String,
    },

    /// The private key could not sign the token assertion
    #[error("Failed to sign token assertion for '{client_email}'")]
    CredentialSigning {
        client_email: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// The token endpoint rejected the assertion or could not be reached
    #[error("Token exchange with '{url}' failed: {detail}")]
    TokenExchange {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    /// Store resource path does not follow projects/../locations/../datasets/../dicomStores/..
    #[error("Invalid DICOM store path '{path}': {reason}")]
    InvalidStorePath {
        path: String,
        reason: String,
    },

    /// Study identifier was empty after trimming
    #[error("Study instance UID must not be empty")]
    InvalidStudyId,

    /// Instance enumeration failed
    #[error("Listing instances at '{url}' failed: {detail}")]
    Listing {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    /// A single instance could not be retrieved
    #[error("Fetching instance '{url}' failed: {detail}")]
    InstanceFetch {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Permission denied errors with suggestions
    #[error("Permission denied {operation} '{path}': {suggestion}")]
    PermissionDenied {
        path: PathBuf,
        operation: FileOperation,
        suggestion: String,
        #[source]
        source: std::io::Error,
    },

    /// URL parsing errors with helpful suggestions
    #[error("Invalid URL '{url}': {suggestion}")]
    InvalidUrl {
        url: String,
        suggestion: String,
        #[source]
        source: url::ParseError,
    },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// Download cancelled by the caller
    #[error("Download cancelled: {reason}")]
    Cancelled {
        reason: String,
    },
}

/// Taxonomy of failures, one per stage of a download session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Credential,
    Parse,
    Listing,
    InstanceFetch,
    Write,
    Configuration,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Credential => write!(f, "credential error"),
            ErrorKind::Parse => write!(f, "parse error"),
            ErrorKind::Listing => write!(f, "listing error"),
            ErrorKind::InstanceFetch => write!(f, "instance fetch error"),
            ErrorKind::Write => write!(f, "write error"),
            ErrorKind::Configuration => write!(f, "configuration error"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Move,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Build a file system error, promoting permission failures to [`DownloadError::PermissionDenied`]
    pub fn file_system<P: Into<PathBuf>>(path: P, operation: FileOperation, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            DownloadError::PermissionDenied {
                suggestion: format!("Check that the output folder '{}' is writable", path.display()),
                path,
                operation,
                source,
            }
        } else {
            DownloadError::FileSystem { path, operation, source }
        }
    }

    /// Which stage of the session this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::CredentialRead { .. }
            | DownloadError::CredentialFormat { .. }
            | DownloadError::CredentialSigning { .. }
            | DownloadError::TokenExchange { .. } => ErrorKind::Credential,
            DownloadError::InvalidStorePath { .. } | DownloadError::InvalidStudyId => ErrorKind::Parse,
            DownloadError::Listing { .. } => ErrorKind::Listing,
            DownloadError::InstanceFetch { .. } => ErrorKind::InstanceFetch,
            DownloadError::FileSystem { .. } | DownloadError::PermissionDenied { .. } => ErrorKind::Write,
            DownloadError::InvalidUrl { .. } | DownloadError::Configuration { .. } => ErrorKind::Configuration,
            DownloadError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Fatal errors end the session; per-instance errors are logged and skipped
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::InstanceFetch | ErrorKind::Write)
    }

    /// HTTP status returned by the remote side, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::TokenExchange { status, .. }
            | DownloadError::Listing { status, .. }
            | DownloadError::InstanceFetch { status, .. } => *status,
            _ => None,
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::CredentialRead { .. } => "credential_read",
            DownloadError::CredentialFormat { .. } => "credential_format",
            DownloadError::CredentialSigning { .. } => "credential_signing",
            DownloadError::TokenExchange { .. } => "token_exchange",
            DownloadError::InvalidStorePath { .. } => "invalid_store_path",
            DownloadError::InvalidStudyId => "invalid_study_id",
            DownloadError::Listing { .. } => "listing",
            DownloadError::InstanceFetch { .. } => "instance_fetch",
            DownloadError::FileSystem { .. } => "file_system",
            DownloadError::PermissionDenied { .. } => "permission_denied",
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::Configuration { .. } => "configuration",
            DownloadError::Cancelled { .. } => "cancelled",
        }
    }

    /// Get severity level for error prioritization
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DownloadError::InstanceFetch { .. } => ErrorSeverity::Medium,
            DownloadError::FileSystem { .. } => ErrorSeverity::Medium,
            DownloadError::Cancelled { .. } => ErrorSeverity::Low,
            DownloadError::PermissionDenied { .. } => ErrorSeverity::Critical,
            DownloadError::CredentialRead { .. }
            | DownloadError::CredentialFormat { .. }
            | DownloadError::CredentialSigning { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            DownloadError::CredentialRead { .. } => {
                Some("Check the service account JSON path")
            }
            DownloadError::CredentialFormat { .. } => {
                Some("Download a fresh JSON key for the service account from the cloud console")
            }
            DownloadError::TokenExchange { status: Some(400 | 401), .. } => {
                Some("The key may be revoked or expired; create a new service account key")
            }
            DownloadError::InvalidStorePath { .. } => {
                Some("Use the form projects/{project}/locations/{location}/datasets/{dataset}/dicomStores/{store}")
            }
            DownloadError::Listing { status: Some(403), .. } => {
                Some("Grant the service account the Healthcare DICOM Viewer role on the store")
            }
            DownloadError::Listing { status: Some(404), .. } => {
                Some("Verify the DICOM store path and that the store exists")
            }
            DownloadError::InvalidUrl { suggestion, .. } => Some(suggestion),
            DownloadError::PermissionDenied { suggestion, .. } => Some(suggestion),
            DownloadError::Configuration { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Kind: {}\n", self.kind()));
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));
        report.push_str(&format!("Fatal: {}\n", self.is_fatal()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<url::ParseError> for DownloadError {
    fn from(error: url::ParseError) -> Self {
        let suggestion = match error {
            url::ParseError::EmptyHost => "URL must have a valid hostname",
            url::ParseError::InvalidPort => "Port number must be between 1 and 65535",
            url::ParseError::RelativeUrlWithoutBase => "URL must be absolute (include http:// or https://)",
            _ => "Check URL format and try again",
        }.to_string();

        DownloadError::InvalidUrl {
            url: "<unparseable>".to_string(),
            suggestion,
            source: error,
        }
    }
}

/// Describe a transport-level reqwest failure for log output
pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_instance_errors_are_not_fatal() {
        let fetch = DownloadError::InstanceFetch {
            url: "https://example.com/i".to_string(),
            status: Some(500),
            detail: "HTTP 500".to_string(),
        };
        let write = DownloadError::file_system(
            "/tmp/x.dcm",
            FileOperation::Write,
            std::io::Error::other("disk full"),
        );

        assert!(!fetch.is_fatal());
        assert!(!write.is_fatal());
        assert_eq!(write.kind(), ErrorKind::Write);
        assert_eq!(fetch.status(), Some(500));
    }

    #[test]
    fn stage_errors_are_fatal() {
        let listing = DownloadError::Listing {
            url: "https://example.com/studies/1/instances".to_string(),
            status: Some(404),
            detail: "not found".to_string(),
        };

        assert!(listing.is_fatal());
        assert!(DownloadError::InvalidStudyId.is_fatal());
        assert_eq!(listing.kind(), ErrorKind::Listing);
        assert!(listing.suggestion().is_some());
    }

    #[test]
    fn permission_denied_is_promoted() {
        let err = DownloadError::file_system(
            "/readonly/out.dcm",
            FileOperation::Create,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );

        match &err {
            DownloadError::PermissionDenied { operation, .. } => assert_eq!(*operation, FileOperation::Create),
            other => panic!("Expected PermissionDenied, got {:?}", other),
        }
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn detailed_report_includes_root_cause() {
        let err = DownloadError::CredentialRead {
            path: PathBuf::from("/missing.json"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };

        let report = err.detailed_report();
        assert!(report.contains("Kind: credential error"));
        assert!(report.contains("Root cause:"));
        assert!(report.contains("Suggestion:"));
    }
}
