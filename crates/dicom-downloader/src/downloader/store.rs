//! DICOM store resource paths
//!
//! A store is addressed as
//! `projects/{project}/locations/{location}/datasets/{dataset}/dicomStores/{store}`.
//! Parsing is pure so it can run before any network call is made.

use std::fmt;
use std::str::FromStr;

use crate::downloader::core::{DownloadError, Result};

/// Keyword markers in the order they must appear
const MARKERS: [&str; 4] = ["projects", "locations", "datasets", "dicomStores"];

/// A parsed DICOM store resource path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    pub project: String,
    pub location: String,
    pub dataset: String,
    pub dicom_store: String,
}

impl StorePath {
    /// Parse a store resource path
    ///
    /// Surrounding whitespace and a leading `/` are ignored, as is anything
    /// after the store id (for example a trailing `/dicomWeb`).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let segments: Vec<&str> = trimmed.split('/').collect();

        if segments.len() < MARKERS.len() * 2 {
            return Err(invalid(raw, format!(
                "expected {} segments, found {}",
                MARKERS.len() * 2,
                segments.len()
            )));
        }

        let mut values = [""; 4];
        for (i, marker) in MARKERS.iter().enumerate() {
            let key = segments[i * 2];
            let value = segments[i * 2 + 1].trim();
            if key != *marker {
                return Err(invalid(raw, format!("expected '{}' at segment {}, found '{}'", marker, i * 2 + 1, key)));
            }
            if value.is_empty() {
                return Err(invalid(raw, format!("'{}' value is empty", marker)));
            }
            values[i] = value;
        }

        let [project, location, dataset, dicom_store] = values;
        Ok(Self {
            project: project.to_string(),
            location: location.to_string(),
            dataset: dataset.to_string(),
            dicom_store: dicom_store.to_string(),
        })
    }

    /// Root of the DICOMweb surface for this store under the given API base
    pub fn dicomweb_url(&self, api_base: &str) -> String {
        format!("{}/{}/dicomWeb", api_base.trim_end_matches('/'), self)
    }
}

impl FromStr for StorePath {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/datasets/{}/dicomStores/{}",
            self.project, self.location, self.dataset, self.dicom_store
        )
    }
}

fn invalid(raw: &str, reason: String) -> DownloadError {
    DownloadError::InvalidStorePath {
        path: raw.to_string(),
        reason,
    }
}
