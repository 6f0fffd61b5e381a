//! Configuration types for the study downloader

use std::time::Duration;

use crate::downloader::core::{DownloadError, Result};

/// Healthcare API root used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "https://healthcare.googleapis.com/v1";

/// OAuth scope granting read access to Healthcare API stores
pub const CLOUD_HEALTHCARE_SCOPE: &str = "https://www.googleapis.com/auth/cloud-healthcare";

/// What a session does when a single instance fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and move on to the next instance
    #[default]
    Continue,
    /// Fail the whole session on the first instance error
    AbortOnFirstError,
}

/// Configuration for download sessions
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Healthcare API root, e.g. `https://healthcare.googleapis.com/v1`
    pub api_base_url: String,
    /// OAuth scope requested for the access token
    pub scope: String,
    /// Timeout for the token exchange and listing calls
    pub request_timeout: Duration,
    /// Timeout for a single instance download (payloads can be large)
    pub instance_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Number of instances requested per listing page
    pub page_size: usize,
    /// Upper bound on listing pages, so a misbehaving server cannot page forever
    pub max_pages: usize,
    /// Lifetime requested for the signed token assertion
    pub assertion_lifetime: Duration,
    pub failure_policy: FailurePolicy,
}

impl DownloadConfig {
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }

    /// Build a configuration from environment variables, loading `.env` if present
    ///
    /// Recognised variables: `DICOM_API_BASE_URL`, `DICOM_REQUEST_TIMEOUT_SECS`,
    /// `DICOM_INSTANCE_TIMEOUT_SECS`, `DICOM_PAGE_SIZE`. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present

        let mut builder = Self::builder();
        if let Ok(base_url) = std::env::var("DICOM_API_BASE_URL") {
            builder = builder.api_base_url(base_url);
        }
        if let Some(secs) = env_number("DICOM_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_number("DICOM_INSTANCE_TIMEOUT_SECS")? {
            builder = builder.instance_timeout(Duration::from_secs(secs));
        }
        if let Some(size) = env_number("DICOM_PAGE_SIZE")? {
            builder = builder.page_size(size as usize);
        }
        builder.build()
    }

    /// Check the configuration for values that would break a session
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.api_base_url).map_err(|e| DownloadError::InvalidUrl {
            url: self.api_base_url.clone(),
            suggestion: "API base URL must be absolute, e.g. https://healthcare.googleapis.com/v1".to_string(),
            source: e,
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(DownloadError::Configuration {
                message: format!("unsupported API base URL scheme '{}'", base.scheme()),
                field: Some("api_base_url".to_string()),
                suggestion: Some("Use an http or https URL".to_string()),
            });
        }
        if self.page_size == 0 {
            return Err(DownloadError::Configuration {
                message: "page size must be at least 1".to_string(),
                field: Some("page_size".to_string()),
                suggestion: None,
            });
        }
        if self.max_pages == 0 {
            return Err(DownloadError::Configuration {
                message: "max pages must be at least 1".to_string(),
                field: Some("max_pages".to_string()),
                suggestion: None,
            });
        }
        for (field, value) in [
            ("request_timeout", self.request_timeout),
            ("instance_timeout", self.instance_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(DownloadError::Configuration {
                    message: format!("{} must be greater than zero", field),
                    field: Some(field.to_string()),
                    suggestion: Some("Timeouts keep a session from hanging on an unresponsive endpoint".to_string()),
                });
            }
        }
        Ok(())
    }

    /// API base without a trailing slash
    pub(crate) fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            scope: CLOUD_HEALTHCARE_SCOPE.to_string(),
            request_timeout: Duration::from_secs(30),
            instance_timeout: Duration::from_secs(600), // 10 minutes for large multiframe objects
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("dicom-downloader/", env!("CARGO_PKG_VERSION")).to_string(),
            page_size: 1000,
            max_pages: 10_000,
            assertion_lifetime: Duration::from_secs(3600),
            failure_policy: FailurePolicy::Continue,
        }
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|_| DownloadError::Configuration {
            message: format!("{} must be a whole number, got '{}'", name, value),
            field: Some(name.to_string()),
            suggestion: None,
        }),
        Err(_) => Ok(None),
    }
}

/// Builder for [`DownloadConfig`]
#[derive(Debug, Clone, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn scope<S: Into<String>>(mut self, scope: S) -> Self {
        self.config.scope = scope.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn instance_timeout(mut self, timeout: Duration) -> Self {
        self.config.instance_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<DownloadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DownloadConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.api_base(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn builder_rejects_zero_page_size() {
        let result = DownloadConfig::builder().page_size(0).build();
        match result {
            Err(DownloadError::Configuration { field, .. }) => assert_eq!(field.as_deref(), Some("page_size")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn builder_rejects_relative_base_url() {
        let result = DownloadConfig::builder().api_base_url("healthcare/v1").build();
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let result = DownloadConfig::builder().instance_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(DownloadError::Configuration { .. })));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base() {
        let config = DownloadConfig::builder()
            .api_base_url("http://127.0.0.1:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(config.api_base(), "http://127.0.0.1:8080/v1");
    }
}
