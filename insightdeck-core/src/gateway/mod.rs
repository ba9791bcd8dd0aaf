//! # HTTP gateway
//!
//! Upload a spreadsheet, run the pipeline on it, then download or list the
//! generated PDF reports.

mod server;
mod store;

pub use server::{AppState, MAX_UPLOAD_BYTES, router, serve};
pub use store::{ReportStore, is_allowed_upload, sanitize_file_name};
