//! HTTP API for the upscaler service
//!
//! [`ImageJobService`] implements the upload, upscale and download flow;
//! [`routes::router`] exposes it over axum.

pub mod error;
pub mod routes;
pub mod service;

// Re-export commonly used types
pub use error::ApiError;
pub use routes::{router, RouterConfig};
pub use service::{HealthStatus, ImageJobService, UploadReceipt, UpscaleOutcome};
