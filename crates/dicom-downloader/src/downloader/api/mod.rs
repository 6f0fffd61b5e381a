//! Clients for the remote services a session talks to
//!
//! - `auth`: service-account token exchange
//! - `dicomweb`: instance listing and retrieval against a DICOM store

pub mod auth;
pub mod dicomweb;

pub use auth::{
    DEFAULT_TOKEN_URI, ServiceAccountCredential, ServiceAccountTokenProvider, StaticTokenProvider,
    TokenProvider, get_access_token,
};
pub use dicomweb::{DicomWebClient, InstanceListing, InstanceReference};
