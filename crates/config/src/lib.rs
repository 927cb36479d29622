//! Configuration management for the upscaler service
//!
//! This crate provides functionality for loading the service configuration
//! from built-in defaults, an optional TOML file and the environment.

pub mod manager;
pub mod schema;
pub mod validation;

// Re-export commonly used types
pub use manager::{ConfigManager, ENV_PREFIX};
pub use schema::{
    BackendChoice, FilterChoice, LogFormat, LoggingConfig, ModelConfig, ServerConfig,
    ServiceConfig, StorageConfig,
};
pub use validation::validate;
