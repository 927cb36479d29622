//! Common utilities and types for the upscaler service
//!
//! This crate provides shared functionality used across the workspace,
//! including the error taxonomy, device/precision types and small helpers.

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use types::*;
