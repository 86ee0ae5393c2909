//! Upload client for the processing endpoint
//!
//! Sends finished audio as multipart form data to `POST /process/` and
//! interprets the JSON reply:
//! - non-2xx status → `UploadError::Http`
//! - `status` other than "success" → `UploadError::Rejected`
//! - otherwise an `UploadOutcome`, with `redirect_url` resolved to an absolute URL

mod client;
mod types;

pub use client::{UploadClient, UploadConfig, DEFAULT_FILE_NAME};
pub use types::{ProcessResponse, UploadOutcome, STATUS_SUCCESS};
