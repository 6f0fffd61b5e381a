//! Fixtures shared by the unit and session tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::downloader::core::SessionCallbacks;
use crate::downloader::store::StorePath;

/// Public half of the throwaway key in `testdata/service_account.json`
pub const TEST_PUBLIC_KEY: &str = include_str!("../../testdata/test_key.pub.pem");

const SERVICE_ACCOUNT_JSON: &str = include_str!("../../testdata/service_account.json");

pub const TEST_STORE: &str = "projects/p/locations/l/datasets/d/dicomStores/s";

pub fn store_path() -> StorePath {
    StorePath::parse(TEST_STORE).unwrap()
}

/// Write the fixture key document into `dir`, pointing it at `token_uri`
pub fn write_credential(dir: &Path, token_uri: &str) -> PathBuf {
    let mut document: serde_json::Value = serde_json::from_str(SERVICE_ACCOUNT_JSON).unwrap();
    document["token_uri"] = serde_json::Value::String(token_uri.to_string());

    let path = dir.join("service_account.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    path
}

/// One QIDO-RS result entry in DICOM JSON form
pub fn instance_entry(study: &str, series: &str, sop: &str) -> serde_json::Value {
    serde_json::json!({
        "0020000D": {"vr": "UI", "Value": [study]},
        "0020000E": {"vr": "UI", "Value": [series]},
        "00080018": {"vr": "UI", "Value": [sop]},
        "00080016": {"vr": "UI", "Value": ["1.2.840.10008.5.1.4.1.1.2"]}
    })
}

/// Records every progress fraction and log line a session emits
#[derive(Debug, Default, Clone)]
pub struct ProgressCapture {
    fractions: Arc<Mutex<Vec<f64>>>,
    lines: Arc<Mutex<Vec<String>>>,
}

impl ProgressCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> SessionCallbacks {
        let fractions = self.fractions.clone();
        let lines = self.lines.clone();
        SessionCallbacks::new(
            Arc::new(move |fraction| fractions.lock().unwrap().push(fraction)),
            Arc::new(move |line| lines.lock().unwrap().push(line.to_string())),
        )
    }

    pub fn fractions(&self) -> Vec<f64> {
        self.fractions.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count_lines_containing(&self, needle: &str) -> usize {
        self.lines.lock().unwrap().iter().filter(|line| line.contains(needle)).count()
    }

    pub fn last_line(&self) -> Option<String> {
        self.lines.lock().unwrap().last().cloned()
    }
}
