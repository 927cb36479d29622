//! Tiled upscaling pipeline
//!
//! [`TiledUpscaler`] owns the process-wide [`ModelHandle`]. Each call
//! decodes its input to RGB, runs every planned tile through the backend
//! while holding the handle's lock, keeps the core of each output tile and
//! pastes it into the enlarged canvas.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info};

use common::error::{Error, Result};
use common::types::{Device, Precision, MAX_SCALE};
use common::utils::{format_duration, measure_execution_time};
use hardware_profiler::detect_device;
use model_manager::{WeightArtifact, WeightStore};

use crate::backend::{build_backend, BackendSpec, InferenceBackend};
use crate::handle::{ModelHandle, ModelSettings};
use crate::image_io::{encode_to_path, ImageInput};
use crate::interpolation::InterpolationFilter;
use crate::tensor::ImageTensor;
use crate::tiling::plan_tiles;

/// Construction parameters for [`TiledUpscaler`]
#[derive(Debug, Clone)]
pub struct UpscalerOptions {
    /// Upscale factor
    pub scale: u32,
    /// Core tile edge length, 0 processes the whole image at once
    pub tile_size: u32,
    /// Context pixels added around each tile
    pub tile_pad: u32,
    /// Use half precision when running on an accelerated device
    pub half_precision: bool,
    /// Backend to construct
    pub backend: BackendSpec,
    /// Weight artifact for backends that need one
    pub weights: Option<WeightArtifact>,
    /// Directory the weight artifact is cached in
    pub weights_dir: PathBuf,
}

impl Default for UpscalerOptions {
    fn default() -> Self {
        Self {
            scale: 4,
            tile_size: 0,
            tile_pad: 10,
            half_precision: true,
            backend: BackendSpec::Interpolation(InterpolationFilter::CatmullRom),
            weights: None,
            weights_dir: PathBuf::from("weights"),
        }
    }
}

impl UpscalerOptions {
    /// Checks the options for consistency
    pub fn validate(&self) -> Result<()> {
        self.validate_shape()?;
        if self.backend.needs_weights() && self.weights.is_none() {
            return Err(Error::Config(
                "The selected backend requires a weight artifact".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks scale and tiling parameters only
    pub fn validate_shape(&self) -> Result<()> {
        if self.scale == 0 || self.scale > MAX_SCALE {
            return Err(Error::Config(format!(
                "Scale must be between 1 and {}, got {}",
                MAX_SCALE, self.scale
            )));
        }
        if self.tile_size > 0 && self.tile_pad >= self.tile_size {
            return Err(Error::Config(format!(
                "Tile padding ({}) must be smaller than the tile size ({})",
                self.tile_pad, self.tile_size
            )));
        }
        Ok(())
    }
}

/// Upscaler sharing one loaded model between all callers
pub struct TiledUpscaler {
    handle: ModelHandle,
}

impl TiledUpscaler {
    /// Resolves device and precision, installs weights if required and
    /// loads the backend. Expected to run once per process.
    pub async fn load(options: UpscalerOptions) -> Result<Self> {
        options.validate()?;

        let device = if options.backend.supports_acceleration() {
            detect_device()
        } else {
            Device::Cpu
        };
        let precision = Precision::resolve(options.half_precision, device);

        let weights_path = match (&options.weights, options.backend.needs_weights()) {
            (Some(artifact), true) => {
                let store = WeightStore::new(&options.weights_dir)?;
                Some(store.ensure(artifact).await?)
            }
            _ => None,
        };

        let backend = build_backend(options.backend, weights_path.as_deref(), device, precision)?;
        let handle = ModelHandle::new(backend, Self::settings_for(&options, device, precision));

        info!(
            "Model ready: backend {}, x{}, {} {}, tile {} pad {}",
            handle.backend_name(),
            options.scale,
            device,
            precision,
            options.tile_size,
            options.tile_pad
        );

        Ok(Self { handle })
    }

    /// Wraps an already constructed backend
    pub fn with_backend(backend: Box<dyn InferenceBackend>, options: &UpscalerOptions) -> Result<Self> {
        options.validate_shape()?;

        let device = backend.device();
        let precision = Precision::resolve(options.half_precision, device);
        let handle = ModelHandle::new(backend, Self::settings_for(options, device, precision));
        Ok(Self { handle })
    }

    fn settings_for(options: &UpscalerOptions, device: Device, precision: Precision) -> ModelSettings {
        ModelSettings {
            scale: options.scale,
            device,
            precision,
            tile_size: options.tile_size,
            tile_pad: options.tile_pad,
        }
    }

    pub fn scale(&self) -> u32 {
        self.handle.settings().scale
    }

    pub fn device(&self) -> Device {
        self.handle.settings().device
    }

    pub fn settings(&self) -> &ModelSettings {
        self.handle.settings()
    }

    pub fn backend_name(&self) -> &str {
        self.handle.backend_name()
    }

    /// Upscales `input` by the model's scale factor
    pub fn upscale(&self, input: impl Into<ImageInput>) -> Result<RgbImage> {
        let image = input.into().into_rgb()?;
        let (w, h) = image.dimensions();

        let (output, elapsed) = measure_execution_time(|| self.run(&image))?;
        info!(
            "Upscaled {}x{} -> {}x{} in {}",
            w,
            h,
            output.width(),
            output.height(),
            format_duration(elapsed)
        );
        Ok(output)
    }

    /// Decodes `input`, upscales it and encodes the result to `output`
    pub fn upscale_and_save(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        let image = self.upscale(input)?;
        encode_to_path(&image, output)?;
        Ok(output.to_path_buf())
    }

    fn run(&self, image: &RgbImage) -> Result<RgbImage> {
        let settings = *self.handle.settings();
        let scale = settings.scale;
        let (w, h) = image.dimensions();

        let (out_w, out_h) = match (w.checked_mul(scale), h.checked_mul(scale)) {
            (Some(ow), Some(oh)) => (ow, oh),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "{}x{} image is too large for x{}",
                    w, h, scale
                )))
            }
        };

        let input = ImageTensor::from_rgb(image);
        let tiles = plan_tiles(w, h, settings.tile_size, settings.tile_pad);
        debug!("Processing {}x{} image in {} tile(s)", w, h, tiles.len());

        self.handle.with_backend(|backend| {
            let mut canvas = ImageTensor::zeros(out_w, out_h);

            for (index, tile) in tiles.iter().enumerate() {
                let padded = tile.padded;
                let patch = input.crop(padded.x, padded.y, padded.width, padded.height)?;
                let enhanced = enhance_tile(backend, &patch, scale)?;

                let (off_x, off_y) = tile.core_offset();
                let core = enhanced.crop(
                    off_x * scale,
                    off_y * scale,
                    tile.core.width * scale,
                    tile.core.height * scale,
                )?;
                canvas.paste(&core, tile.core.x * scale, tile.core.y * scale)?;

                debug!("Tile {}/{} done", index + 1, tiles.len());
            }

            canvas.to_rgb()
        })
    }
}

/// Runs one tile, satisfying the backend's alignment by edge replication
fn enhance_tile(backend: &mut dyn InferenceBackend, tile: &ImageTensor, scale: u32) -> Result<ImageTensor> {
    let (w, h) = (tile.width(), tile.height());
    let align = backend.alignment().max(1);
    let pad_right = (align - w % align) % align;
    let pad_bottom = (align - h % align) % align;

    let aligned = tile.pad_edge(pad_right, pad_bottom);
    let output = backend.enhance(&aligned, scale)?;

    let expected = (aligned.width() * scale, aligned.height() * scale);
    if (output.width(), output.height()) != expected {
        return Err(Error::Inference(format!(
            "Backend {} returned {}x{} for a {}x{} tile at x{}",
            backend.name(),
            output.width(),
            output.height(),
            aligned.width(),
            aligned.height(),
            scale
        )));
    }

    if pad_right == 0 && pad_bottom == 0 {
        Ok(output)
    } else {
        output.crop(0, 0, w * scale, h * scale)
    }
}
