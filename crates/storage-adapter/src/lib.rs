//! File storage for the upscaler service
//!
//! Uploaded originals and upscaled outputs live in two flat directories.
//! This crate guards access to them by plain file names only.

pub mod filesystem;
pub mod sanitize;

// Re-export commonly used types
pub use filesystem::{Entry, FileStore};
pub use sanitize::sanitize_filename;
