//! DICOMweb client for a Healthcare API DICOM store
//!
//! Listing uses QIDO-RS (`GET .../studies/{study}/instances`) paged with
//! `limit`/`offset`; retrieval uses WADO-RS with a DICOM `Accept` header.

use reqwest::Response;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};
use url::Url;

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::error::describe_transport_error;
use crate::downloader::core::files::sanitize_component;
use crate::downloader::core::{AccessToken, DownloadError, HttpClient, Result};
use crate::downloader::store::StorePath;

/// Accept header asking for the stored DICOM object in its original transfer syntax
pub const DICOM_ACCEPT: &str = "application/dicom; transfer-syntax=*";

/// Accept header for QIDO-RS search results
pub const DICOM_JSON_ACCEPT: &str = "application/dicom+json";

const STUDY_INSTANCE_UID: &str = "0020000D";
const SERIES_INSTANCE_UID: &str = "0020000E";
const SOP_INSTANCE_UID: &str = "00080018";

/// One attribute of a DICOM JSON object
#[derive(Debug, Clone, Deserialize)]
pub struct DicomAttribute {
    pub vr: Option<String>,
    #[serde(rename = "Value", default)]
    pub value: Vec<serde_json::Value>,
}

/// A DICOM JSON object keyed by tag (`"0020000E"`)
pub type DicomJsonObject = HashMap<String, DicomAttribute>;

fn first_string(object: &DicomJsonObject, tag: &str) -> Option<String> {
    object
        .get(tag)?
        .value
        .first()?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identity of one downloadable instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceReference {
    pub study_uid: String,
    pub series_uid: String,
    pub sop_instance_uid: String,
}

impl InstanceReference {
    pub fn new<S: Into<String>>(study_uid: S, series_uid: S, sop_instance_uid: S) -> Self {
        Self {
            study_uid: study_uid.into(),
            series_uid: series_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
        }
    }

    /// Read the identifiers from a QIDO-RS result entry
    ///
    /// The study UID falls back to the one that was searched for. Returns
    /// `None` when the series or SOP instance UID is missing.
    pub fn from_dicom_json(object: &DicomJsonObject, study_uid: &str) -> Option<Self> {
        Some(Self {
            study_uid: first_string(object, STUDY_INSTANCE_UID).unwrap_or_else(|| study_uid.to_string()),
            series_uid: first_string(object, SERIES_INSTANCE_UID)?,
            sop_instance_uid: first_string(object, SOP_INSTANCE_UID)?,
        })
    }

    /// Output location relative to the output folder: `{study}/{series}/{sop}.dcm`
    ///
    /// Derived only from the instance identity, so reruns produce the same names
    /// and distinct instances never share one.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(sanitize_component(&self.study_uid))
            .join(sanitize_component(&self.series_uid))
            .join(format!("{}.dcm", sanitize_component(&self.sop_instance_uid)))
    }
}

impl fmt::Display for InstanceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series_uid, self.sop_instance_uid)
    }
}

/// Everything a listing pass returned
#[derive(Debug, Clone, Default)]
pub struct InstanceListing {
    /// Instances in the order the store returned them
    pub instances: Vec<InstanceReference>,
    /// Entries dropped because they lacked series or SOP instance UIDs
    pub skipped: usize,
    /// Listing pages that returned at least one entry
    pub pages: usize,
}

/// Client for the DICOMweb surface of one store
#[derive(Debug, Clone)]
pub struct DicomWebClient {
    http: HttpClient,
    root: String,
    page_size: usize,
    max_pages: usize,
}

impl DicomWebClient {
    pub fn new(http: HttpClient, store: &StorePath, config: &DownloadConfig) -> Self {
        Self {
            http,
            root: store.dicomweb_url(config.api_base()),
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.root).map_err(|e| DownloadError::InvalidUrl {
            url: self.root.clone(),
            suggestion: "Check the configured API base URL".to_string(),
            source: e,
        })?;
        url.path_segments_mut()
            .map_err(|_| DownloadError::Configuration {
                message: format!("'{}' cannot be used as a DICOMweb root", self.root),
                field: Some("api_base_url".to_string()),
                suggestion: None,
            })?
            .extend(segments);
        Ok(url)
    }

    /// QIDO-RS search URL for one page of a study's instances
    pub fn study_instances_url(&self, study_uid: &str, offset: usize) -> Result<Url> {
        let mut url = self.url_with_segments(&["studies", study_uid, "instances"])?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    /// WADO-RS retrieve URL for one instance
    pub fn instance_url(&self, instance: &InstanceReference) -> Result<Url> {
        self.url_with_segments(&[
            "studies",
            &instance.study_uid,
            "series",
            &instance.series_uid,
            "instances",
            &instance.sop_instance_uid,
        ])
    }

    /// List every instance of a study, following pages until one comes back empty
    ///
    /// Servers may return fewer entries than `limit` and still have more, so
    /// only an empty page (or 204) ends the listing. The next offset is the
    /// number of entries received so far.
    pub async fn list_study_instances(&self, token: &AccessToken, study_uid: &str) -> Result<InstanceListing> {
        let mut listing = InstanceListing::default();
        let mut offset = 0;

        loop {
            let url = self.study_instances_url(study_uid, offset)?;
            let page = self.fetch_listing_page(token, &url).await?;
            if page.is_empty() {
                break;
            }

            listing.pages += 1;
            if listing.pages > self.max_pages {
                return Err(DownloadError::Listing {
                    url: url.to_string(),
                    status: None,
                    detail: format!("listing did not finish within {} pages", self.max_pages),
                });
            }
            let page_len = page.len();
            debug!("Listing page {} returned {} entries", listing.pages, page_len);
            if page_len < self.page_size {
                debug!("Short listing page at offset {}, requesting more", offset);
            }

            for entry in &page {
                match InstanceReference::from_dicom_json(entry, study_uid) {
                    Some(instance) => listing.instances.push(instance),
                    None => {
                        warn!("Skipping listing entry without series/SOP instance UID");
                        listing.skipped += 1;
                    }
                }
            }

            offset += page_len;
        }

        Ok(listing)
    }

    async fn fetch_listing_page(&self, token: &AccessToken, url: &Url) -> Result<Vec<DicomJsonObject>> {
        let listing_error = |status: Option<u16>, detail: String| DownloadError::Listing {
            url: url.to_string(),
            status,
            detail,
        };

        let response = self
            .http
            .get_authorized(url.as_str(), token, Some(DICOM_JSON_ACCEPT))
            .await
            .map_err(|failure| listing_error(failure.status, failure.detail))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| listing_error(Some(status), describe_transport_error(&e)))?;

        // 204 No Content and an empty body both mean "no matches"
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&body)
            .map_err(|e| listing_error(Some(status), format!("malformed listing response: {}", e)))
    }

    /// Start retrieving one instance; the body is streamed by the caller
    pub async fn fetch_instance(&self, token: &AccessToken, instance: &InstanceReference) -> Result<(Url, Response)> {
        let url = self.instance_url(instance)?;
        let response = self
            .http
            .get_binary(url.as_str(), token, DICOM_ACCEPT)
            .await
            .map_err(|failure| DownloadError::InstanceFetch {
                url: url.to_string(),
                status: failure.status,
                detail: failure.detail,
            })?;
        Ok((url, response))
    }
}
