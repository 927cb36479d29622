//! ONNX Runtime backend
//!
//! Loads an exported super-resolution network (RealESRGAN and friends) and
//! runs it on CUDA when available, falling back to the CPU provider.

use std::path::Path;

use half::f16;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use common::error::{Error, Result};
use common::types::{Device, Precision};

use crate::backend::InferenceBackend;
use crate::tensor::{ImageTensor, CHANNELS};

/// Network executed through an ONNX Runtime session
pub struct OnnxBackend {
    session: Session,
    input_name: String,
    output_name: String,
    device: Device,
    precision: Precision,
}

impl OnnxBackend {
    /// Loads the network stored at `path`
    pub fn load(path: &Path, device: Device, precision: Precision) -> Result<Self> {
        let model_error = |stage: &str, e: ort::Error| {
            Error::ModelLoad(format!("{} ({}): {}", stage, path.display(), e))
        };

        let builder = Session::builder()
            .map_err(|e| model_error("Failed to create session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_error("Failed to set optimization level", e))?;

        let builder = match device {
            Device::Cpu => builder.with_execution_providers([CPUExecutionProvider::default().build()]),
            Device::Cuda(id) => builder.with_execution_providers([
                CUDAExecutionProvider::default().with_device_id(id as i32).build(),
                CPUExecutionProvider::default().build(),
            ]),
        }
        .map_err(|e| model_error("Failed to configure execution providers", e))?;

        let session = builder
            .commit_from_file(path)
            .map_err(|e| model_error("Failed to load model", e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| Error::ModelLoad(format!("{} declares no inputs", path.display())))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| Error::ModelLoad(format!("{} declares no outputs", path.display())))?;

        info!(
            "Loaded ONNX model {} on {} ({}), input '{}', output '{}'",
            path.display(),
            device,
            precision,
            input_name,
            output_name
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            device,
            precision,
        })
    }

    fn run_full(&mut self, tile: &ImageTensor) -> Result<(Vec<i64>, Vec<f32>)> {
        let shape = [1usize, CHANNELS, tile.height() as usize, tile.width() as usize];
        let input = Tensor::from_array((shape, tile.to_vec()))
            .map_err(|e| Error::Inference(format!("Failed to build input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| Error::Inference(format!("Session run failed: {}", e)))?;
        let (out_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("Failed to read output: {}", e)))?;

        Ok((out_shape.to_vec(), data.to_vec()))
    }

    fn run_half(&mut self, tile: &ImageTensor) -> Result<(Vec<i64>, Vec<f32>)> {
        let shape = [1usize, CHANNELS, tile.height() as usize, tile.width() as usize];
        let input = Tensor::from_array((shape, tile.to_f16()))
            .map_err(|e| Error::Inference(format!("Failed to build input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| Error::Inference(format!("Session run failed: {}", e)))?;
        let (out_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f16>()
            .map_err(|e| Error::Inference(format!("Failed to read output: {}", e)))?;

        Ok((out_shape.to_vec(), data.iter().map(|v| v.to_f32()).collect()))
    }
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn enhance(&mut self, tile: &ImageTensor, scale: u32) -> Result<ImageTensor> {
        let (shape, data) = match self.precision {
            Precision::Full => self.run_full(tile)?,
            Precision::Half => self.run_half(tile)?,
        };

        let expected = [
            1,
            CHANNELS as i64,
            (tile.height() * scale) as i64,
            (tile.width() * scale) as i64,
        ];
        if shape != expected {
            return Err(Error::Inference(format!(
                "Model produced shape {:?}, expected {:?}; is the network trained for x{}?",
                shape, expected, scale
            )));
        }
        debug!("ONNX tile {}x{} -> {:?}", tile.width(), tile.height(), shape);

        ImageTensor::from_vec(tile.width() * scale, tile.height() * scale, data)
    }

    fn device(&self) -> Device {
        self.device
    }
}
