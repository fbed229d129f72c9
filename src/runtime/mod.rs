//! API surface models for the request layer.

pub mod api;

pub use api::{error_response, health, submit_report, AdmissionRequest, AdmissionResponse, ErrorResponse, Health};
