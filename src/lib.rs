//! Main integration module for the upscaler service
//!
//! This module wires configuration, model loading, storage and the HTTP
//! router together and provides the entry points used by the binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::Router;
use tracing::{debug, info, warn};

use api_gateway::{router, ImageJobService, RouterConfig};
use hardware_profiler::HostSummary;
use inference_engine::{BackendSpec, InterpolationFilter, TiledUpscaler, UpscalerOptions};
use model_manager::{WeightArtifact, WeightStore};
use service_config::{BackendChoice, FilterChoice, ModelConfig, ServiceConfig};
use storage_adapter::FileStore;

/// Translates the model section into upscaler construction options
pub fn upscaler_options(model: &ModelConfig) -> UpscalerOptions {
    let backend = match model.backend {
        BackendChoice::Interpolation => BackendSpec::Interpolation(filter_for(model.interpolation_filter)),
        BackendChoice::Onnx => BackendSpec::Onnx,
    };

    UpscalerOptions {
        scale: model.scale,
        tile_size: model.tile_size,
        tile_pad: model.tile_pad,
        half_precision: model.half_precision,
        backend,
        weights: backend.needs_weights().then(|| weight_artifact(model)),
        weights_dir: model.weights_dir.clone(),
    }
}

fn filter_for(choice: FilterChoice) -> InterpolationFilter {
    match choice {
        FilterChoice::Nearest => InterpolationFilter::Nearest,
        FilterChoice::Triangle => InterpolationFilter::Triangle,
        FilterChoice::CatmullRom => InterpolationFilter::CatmullRom,
        FilterChoice::Lanczos3 => InterpolationFilter::Lanczos3,
    }
}

/// The configured weight artifact
pub fn weight_artifact(model: &ModelConfig) -> WeightArtifact {
    let artifact = match &model.weights_url {
        Some(url) => WeightArtifact::new(model.weights_name.clone(), url.clone()),
        None => WeightArtifact::local(model.weights_name.clone()),
    };
    match &model.weights_sha256 {
        Some(digest) => artifact.with_sha256(digest.clone()),
        None => artifact,
    }
}

/// Installs the configured weight artifact without loading a model
pub async fn fetch_weights(model: &ModelConfig) -> Result<PathBuf> {
    let store = WeightStore::new(&model.weights_dir)?;
    let path = store
        .ensure(&weight_artifact(model))
        .await
        .context("Failed to install weight artifact")?;
    Ok(path)
}

/// Loads the model as configured; any failure here is fatal for the caller
pub async fn load_upscaler(model: &ModelConfig) -> Result<TiledUpscaler> {
    let upscaler = TiledUpscaler::load(upscaler_options(model))
        .await
        .context("Failed to construct the upscaling model")?;
    Ok(upscaler)
}

/// The assembled HTTP service
pub struct UpscaleServer {
    /// Effective configuration
    config: ServiceConfig,

    /// Request handling state shared by all routes
    service: Arc<ImageJobService>,
}

impl UpscaleServer {
    /// Loads the model and opens the storage directories
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing upscaler service");
        debug!("Host: {}", HostSummary::collect());

        let upscaler = Arc::new(load_upscaler(&config.model).await?);

        let uploads = FileStore::open(&config.storage.upload_dir)
            .await
            .with_context(|| format!("Failed to open {}", config.storage.upload_dir.display()))?;
        let outputs = FileStore::open(&config.storage.output_dir)
            .await
            .with_context(|| format!("Failed to open {}", config.storage.output_dir.display()))?;

        let service = Arc::new(ImageJobService::new(upscaler, uploads, outputs));

        Ok(Self { config, service })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Builds the router for this server
    pub fn router(&self) -> Router {
        let router_config = RouterConfig {
            allowed_origins: self.config.server.allowed_origins.clone(),
            max_upload_bytes: usize::try_from(self.config.server.max_upload_bytes).unwrap_or(usize::MAX),
        };
        router(self.service.clone(), &router_config)
    }

    /// Serves requests until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let addr = self.bind_address().await?;
        let app = self.router();

        info!("Listening on http://{}", addr);
        axum::Server::try_bind(&addr)
            .with_context(|| format!("Failed to bind {}", addr))?
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        info!("Upscaler service stopped");
        Ok(())
    }

    async fn bind_address(&self) -> Result<SocketAddr> {
        let server = &self.config.server;
        tokio::net::lookup_host((server.host.as_str(), server.port))
            .await
            .with_context(|| format!("Failed to resolve {}", server.host))?
            .next()
            .ok_or_else(|| anyhow!("{} did not resolve to any address", server.host))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}
