//! Weight artifact lifecycle management for the upscaler service
//!
//! This crate makes sure the pretrained network's parameter file exists
//! locally, fetching it once and serving the cached copy afterwards.

pub mod artifact;
pub mod downloader;

// Re-export commonly used types
pub use artifact::WeightArtifact;
pub use downloader::WeightStore;
