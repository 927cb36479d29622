//! Loaded model state

use parking_lot::Mutex;
use tracing::trace;

use common::error::Result;
use common::types::{Device, Precision};

use crate::backend::InferenceBackend;
use crate::tensor::ImageTensor;

/// Settings fixed when a model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSettings {
    /// Upscale factor of the network
    pub scale: u32,
    /// Device selected at load time
    pub device: Device,
    /// Numeric precision in use
    pub precision: Precision,
    /// Core tile edge length, 0 disables tiling
    pub tile_size: u32,
    /// Context pixels around each tile
    pub tile_pad: u32,
}

/// A backend plus the settings it was loaded with.
///
/// Only one upscale runs at a time; concurrent callers wait on the lock.
pub struct ModelHandle {
    backend: Mutex<Box<dyn InferenceBackend>>,
    backend_name: String,
    settings: ModelSettings,
}

impl ModelHandle {
    pub fn new(backend: Box<dyn InferenceBackend>, settings: ModelSettings) -> Self {
        let backend_name = backend.name().to_string();
        Self {
            backend: Mutex::new(backend),
            backend_name,
            settings,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Runs `f` with exclusive access to the backend
    pub fn with_backend<T>(&self, f: impl FnOnce(&mut dyn InferenceBackend) -> Result<T>) -> Result<T> {
        let mut guard = self.backend.lock();
        trace!("Acquired backend {}", self.backend_name);
        f(guard.as_mut())
    }

    /// Runs a single tile through the backend
    pub fn enhance(&self, tile: &ImageTensor) -> Result<ImageTensor> {
        let scale = self.settings.scale;
        self.with_backend(|backend| backend.enhance(tile, scale))
    }
}
