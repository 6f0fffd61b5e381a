//! Service account authentication for the Healthcare API
//!
//! This module turns a service-account key file into a bearer token:
//! - Loading and checking the JSON key document
//! - Signing an RS256 JWT assertion scoped to the Healthcare API
//! - Exchanging the assertion at the key's token endpoint
//!
//! The key is read once per session and dropped as soon as the token is minted.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::{AccessToken, DownloadError, HttpClient, Result};

/// Token endpoint used when the key document does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// A service-account key document
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredential {
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub client_email: String,
    private_key: String,
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Claims of the signed assertion sent to the token endpoint
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    token_type: Option<String>,
}

impl ServiceAccountCredential {
    /// Load a key document from disk
    pub async fn from_file(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DownloadError::CredentialRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::from_json(path, &text)
    }

    /// Parse a key document; `path` is only used for error context
    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        let credential: Self = serde_json::from_str(text).map_err(|e| DownloadError::CredentialFormat {
            path: path.to_path_buf(),
            reason: format!("not a service account JSON document: {}", e),
        })?;

        let format_error = |reason: &str| DownloadError::CredentialFormat {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if let Some(ref account_type) = credential.account_type {
            if account_type != "service_account" {
                return Err(format_error(&format!("expected type 'service_account', found '{}'", account_type)));
            }
        }
        if credential.client_email.trim().is_empty() {
            return Err(format_error("client_email is empty"));
        }
        if credential.private_key.trim().is_empty() {
            return Err(format_error("private_key is empty"));
        }
        if credential.token_uri.trim().is_empty() {
            return Err(format_error("token_uri is empty"));
        }

        Ok(credential)
    }

    /// Build and sign the RS256 assertion for the given scope
    fn signed_assertion(&self, scope: &str, lifetime: Duration) -> Result<String> {
        let signing_error = |source| DownloadError::CredentialSigning {
            client_email: self.client_email.clone(),
            source,
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(signing_error)?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let iat = jsonwebtoken::get_current_timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat,
            exp: iat + lifetime.as_secs(),
        };

        jsonwebtoken::encode(&header, &claims, &key).map_err(signing_error)
    }

    /// Exchange a signed assertion for an access token
    pub async fn exchange(&self, http: &HttpClient, config: &DownloadConfig) -> Result<AccessToken> {
        let assertion = self.signed_assertion(&config.scope, config.assertion_lifetime)?;
        let requested_at = Instant::now();

        debug!("Requesting access token for {} from {}", self.client_email, self.token_uri);

        let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
        let response = http
            .post_form(&self.token_uri, &form)
            .await
            .map_err(|failure| DownloadError::TokenExchange {
                url: self.token_uri.clone(),
                status: failure.status,
                detail: failure.detail,
            })?;

        let status = response.status().as_u16();
        let token: TokenResponse = response.json().await.map_err(|e| DownloadError::TokenExchange {
            url: self.token_uri.clone(),
            status: Some(status),
            detail: format!("malformed token response: {}", e),
        })?;

        if token.access_token.is_empty() {
            return Err(DownloadError::TokenExchange {
                url: self.token_uri.clone(),
                status: None,
                detail: "token response did not contain an access token".to_string(),
            });
        }
        if let Some(ref token_type) = token.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(DownloadError::TokenExchange {
                    url: self.token_uri.clone(),
                    status: None,
                    detail: format!("unexpected token type '{}'", token_type),
                });
            }
        }

        info!("Access token obtained for {}", self.client_email);

        let mut access_token = AccessToken::new(token.access_token);
        if let Some(expires_in) = token.expires_in {
            access_token = access_token.with_expiry(requested_at + Duration::from_secs(expires_in));
        }
        Ok(access_token)
    }
}

/// Source of bearer tokens for a session
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Mint or return a token valid for the rest of the session
    async fn access_token(&self) -> Result<AccessToken>;
}

/// Provider that reads a service-account key file on each call
///
/// A session calls it exactly once and reuses the token for every request.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenProvider {
    credential_path: PathBuf,
    config: DownloadConfig,
    http: Option<HttpClient>,
}

impl ServiceAccountTokenProvider {
    pub fn new<P: Into<PathBuf>>(credential_path: P, config: DownloadConfig) -> Self {
        Self {
            credential_path: credential_path.into(),
            config,
            http: None,
        }
    }

    /// Send the exchange through an existing client instead of building one
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn credential_path(&self) -> &Path {
        &self.credential_path
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<AccessToken> {
        let credential = ServiceAccountCredential::from_file(&self.credential_path).await?;
        let http = match &self.http {
            Some(http) => http.clone(),
            None => HttpClient::from_config(&self.config)?,
        };
        credential.exchange(&http, &self.config).await
    }
}

/// Provider returning a token minted elsewhere
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}

/// Load the key at `credential_path` and exchange it for a Healthcare API token
pub async fn get_access_token(credential_path: &Path, config: &DownloadConfig) -> Result<AccessToken> {
    ServiceAccountTokenProvider::new(credential_path, config.clone())
        .access_token()
        .await
}
