//! Typed configuration schema
//!
//! Every section carries serde defaults so a partial file (or none at all)
//! still produces a complete [`ServiceConfig`].

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Upload and output directories
    pub storage: StorageConfig,

    /// Model construction parameters
    pub model: ModelConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Upload and output directories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded originals
    pub upload_dir: PathBuf,

    /// Directory holding upscaled results
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// Inference backend implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Classical resampling, no weights required
    Interpolation,
    /// ONNX network loaded from the weight artifact
    Onnx,
}

/// Resampling filter of the interpolation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterChoice {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

/// Model construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Integer upscaling factor
    pub scale: u32,

    /// Tile edge in input pixels, 0 disables tiling
    pub tile_size: u32,

    /// Context pixels added around each tile
    pub tile_pad: u32,

    /// Use fp16 when an accelerated device is present
    pub half_precision: bool,

    /// Backend implementation
    pub backend: BackendChoice,

    /// Filter used by the interpolation backend
    pub interpolation_filter: FilterChoice,

    /// Directory caching the weight artifact
    pub weights_dir: PathBuf,

    /// File name of the weight artifact
    pub weights_name: String,

    /// Remote location of the weight artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_url: Option<String>,

    /// Expected SHA-256 of the weight artifact, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_sha256: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scale: 4,
            tile_size: 256,
            tile_pad: 10,
            half_precision: true,
            backend: BackendChoice::Interpolation,
            interpolation_filter: FilterChoice::CatmullRom,
            weights_dir: PathBuf::from("weights"),
            weights_name: "RealESRGAN_x4plus.onnx".to_string(),
            weights_url: None,
            weights_sha256: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Write daily-rolling files here instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}
