//! Hardware detection for the upscaler service
//!
//! This crate decides which device the inference backend runs on and
//! collects a short host summary for the startup log.

pub mod capabilities;
pub mod detector;

// Re-export commonly used types
pub use capabilities::HostSummary;
pub use detector::{detect_device, is_cuda_available};
