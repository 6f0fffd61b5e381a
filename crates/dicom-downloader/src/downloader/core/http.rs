//! HTTP utilities
//!
//! One reqwest client per session, configured from [`DownloadConfig`].
//! Requests report failures as a [`RequestFailure`] so each stage can wrap
//! them into its own error variant.

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::error::describe_transport_error;
use crate::downloader::core::{AccessToken, DownloadError, Result};

/// Longest slice of an error body kept for log output
const MAX_ERROR_BODY: usize = 512;

/// Why a request did not produce a successful response
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    /// HTTP status, `None` when the request never got a response
    pub status: Option<u16>,
    pub detail: String,
}

impl RequestFailure {
    pub(crate) fn transport(error: &reqwest::Error) -> Self {
        Self {
            status: None,
            detail: describe_transport_error(error),
        }
    }
}

/// HTTP client shared by the token exchange, listing and fetch calls
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    instance_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client from download configuration
    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DownloadError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                field: None,
                suggestion: None,
            })?;

        Ok(Self {
            client,
            instance_timeout: config.instance_timeout,
        })
    }

    /// POST a URL-encoded form without authentication
    pub async fn post_form<F: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &F,
    ) -> std::result::Result<Response, RequestFailure> {
        debug!("POST {}", url);
        send_checked(self.client.post(url).form(form)).await
    }

    /// GET with a bearer token and an optional Accept header
    pub async fn get_authorized(
        &self,
        url: &str,
        token: &AccessToken,
        accept: Option<&str>,
    ) -> std::result::Result<Response, RequestFailure> {
        debug!("GET {}", url);
        let mut request = self.client.get(url).bearer_auth(token.secret());
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        send_checked(request).await
    }

    /// GET a binary payload, using the longer instance timeout
    pub async fn get_binary(
        &self,
        url: &str,
        token: &AccessToken,
        accept: &str,
    ) -> std::result::Result<Response, RequestFailure> {
        debug!("GET {} (binary, timeout {:?})", url, self.instance_timeout);
        let request = self
            .client
            .get(url)
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, accept)
            .timeout(self.instance_timeout);
        send_checked(request).await
    }
}

/// Send a request and turn transport errors and non-2xx statuses into a RequestFailure
async fn send_checked(request: RequestBuilder) -> std::result::Result<Response, RequestFailure> {
    let response = request.send().await.map_err(|e| RequestFailure::transport(&e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    let detail = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, truncate(body, MAX_ERROR_BODY))
    };

    Err(RequestFailure {
        status: Some(status.as_u16()),
        detail,
    })
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[tokio::test]
    async fn non_success_status_captures_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("store not found"))
            .mount(&server)
            .await;

        let client = HttpClient::from_config(&DownloadConfig::default()).unwrap();
        let token = AccessToken::new("abc");
        let failure = client
            .get_authorized(&format!("{}/missing", server.uri()), &token, None)
            .await
            .unwrap_err();

        assert_eq!(failure.status, Some(404));
        assert!(failure.detail.contains("store not found"));
    }

    #[tokio::test]
    async fn bearer_and_accept_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .and(header("authorization", "Bearer abc"))
            .and(header("accept", "application/dicom; transfer-syntax=*"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"DICM".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::from_config(&DownloadConfig::default()).unwrap();
        let token = AccessToken::new("abc");
        let response = client
            .get_binary(&format!("{}/blob", server.uri()), &token, "application/dicom; transfer-syntax=*")
            .await
            .unwrap();

        assert_eq!(response.bytes().await.unwrap().as_ref(), b"DICM");
    }

    #[tokio::test]
    async fn unreachable_host_has_no_status() {
        let config = DownloadConfig::builder()
            .connect_timeout(Duration::from_millis(200))
            .request_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let client = HttpClient::from_config(&config).unwrap();

        // Port 9 (discard) on localhost is almost never listening
        let failure = client
            .get_authorized("http://127.0.0.1:9/", &AccessToken::new("abc"), None)
            .await
            .unwrap_err();
        assert_eq!(failure.status, None);
    }
}
