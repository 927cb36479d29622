//! Inference backend abstraction

use std::path::Path;

use common::error::{Error, Result};
use common::types::{Device, Precision};

use crate::interpolation::{InterpolationBackend, InterpolationFilter};
use crate::tensor::ImageTensor;

/// A network that maps an image tile to a tile `scale` times larger.
///
/// Backends are driven by one caller at a time; the owning
/// [`ModelHandle`](crate::ModelHandle) serializes access.
pub trait InferenceBackend: Send {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Upscales `tile` by `scale` in both dimensions
    fn enhance(&mut self, tile: &ImageTensor, scale: u32) -> Result<ImageTensor>;

    /// Input width and height must be a multiple of this value
    fn alignment(&self) -> u32 {
        1
    }

    /// Device the backend executes on
    fn device(&self) -> Device {
        Device::Cpu
    }
}

/// Which backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSpec {
    /// Classical resampling, no weights required
    Interpolation(InterpolationFilter),
    /// ONNX network loaded from a weight artifact
    Onnx,
}

impl BackendSpec {
    /// Returns true if the backend is built from a weight artifact
    pub fn needs_weights(&self) -> bool {
        matches!(self, BackendSpec::Onnx)
    }

    /// Returns true if the backend can use a GPU
    pub fn supports_acceleration(&self) -> bool {
        matches!(self, BackendSpec::Onnx)
    }
}

/// Builds a backend for `spec`.
///
/// `weights` must point at the installed artifact when
/// [`BackendSpec::needs_weights`] is true.
pub fn build_backend(
    spec: BackendSpec,
    weights: Option<&Path>,
    device: Device,
    precision: Precision,
) -> Result<Box<dyn InferenceBackend>> {
    match spec {
        BackendSpec::Interpolation(filter) => Ok(Box::new(InterpolationBackend::new(filter))),
        BackendSpec::Onnx => {
            let path = weights.ok_or_else(|| {
                Error::ModelLoad("ONNX backend requires a weight artifact".to_string())
            })?;
            build_onnx(path, device, precision)
        }
    }
}

#[cfg(feature = "onnx")]
fn build_onnx(path: &Path, device: Device, precision: Precision) -> Result<Box<dyn InferenceBackend>> {
    let backend = crate::onnx::OnnxBackend::load(path, device, precision)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx(path: &Path, _device: Device, _precision: Precision) -> Result<Box<dyn InferenceBackend>> {
    Err(Error::Config(format!(
        "Cannot load {}: built without the `onnx` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_needs_no_weights() {
        let spec = BackendSpec::Interpolation(InterpolationFilter::Nearest);
        assert!(!spec.needs_weights());
        let backend = build_backend(spec, None, Device::Cpu, Precision::Full).unwrap();
        assert_eq!(backend.name(), "nearest");
    }

    #[test]
    fn test_onnx_without_weights_fails() {
        let result = build_backend(BackendSpec::Onnx, None, Device::Cpu, Precision::Full);
        assert!(matches!(result, Err(Error::ModelLoad(_))));
    }
}
