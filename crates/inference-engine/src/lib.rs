//! Tiled super-resolution inference for the upscaler service
//!
//! This crate owns the loaded network ([`ModelHandle`]) and the tiling
//! pipeline ([`TiledUpscaler`]) that splits an image into padded tiles,
//! runs each through an [`InferenceBackend`] and stitches the results.

pub mod backend;
pub mod handle;
pub mod image_io;
pub mod interpolation;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod tensor;
pub mod tiling;
pub mod upscaler;

// Re-export commonly used types
pub use backend::{build_backend, BackendSpec, InferenceBackend};
pub use handle::{ModelHandle, ModelSettings};
pub use image_io::ImageInput;
pub use interpolation::{InterpolationBackend, InterpolationFilter};
pub use tensor::ImageTensor;
pub use upscaler::{TiledUpscaler, UpscalerOptions};
