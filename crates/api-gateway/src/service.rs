//! Upload, upscale and download flow

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::error::{Error, Result};
use inference_engine::TiledUpscaler;
use storage_adapter::{sanitize_filename, Entry, FileStore};

/// Prefix of every derived output name
pub const OUTPUT_PREFIX: &str = "upscaled_";

/// Response of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub device: String,
}

/// Response of `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub filename: String,
    pub path: String,
}

/// Response of `POST /upscale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpscaleOutcome {
    pub output: String,
    pub scale: u32,
}

/// Request-level state machine around the shared upscaler
pub struct ImageJobService {
    upscaler: Arc<TiledUpscaler>,
    uploads: FileStore,
    outputs: FileStore,
}

impl ImageJobService {
    pub fn new(upscaler: Arc<TiledUpscaler>, uploads: FileStore, outputs: FileStore) -> Self {
        Self {
            upscaler,
            uploads,
            outputs,
        }
    }

    pub fn scale(&self) -> u32 {
        self.upscaler.scale()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            device: self.upscaler.device().to_string(),
        }
    }

    /// Stores an uploaded image under its sanitised name
    pub async fn upload(
        &self,
        name: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<UploadReceipt> {
        let content_type = content_type.unwrap_or("");
        if !content_type.starts_with("image/") {
            warn!("Rejected upload {:?} with content type {:?}", name, content_type);
            return Err(Error::UnsupportedContent(format!(
                "File must be an image, got {:?}",
                content_type
            )));
        }

        let filename = sanitize_filename(name, content_type);
        let path = self.uploads.write(&filename, data).await?;
        info!("Stored upload {} ({} bytes)", filename, data.len());

        Ok(UploadReceipt {
            filename,
            path: path.display().to_string(),
        })
    }

    /// Upscales a previously uploaded file into the output area.
    ///
    /// The request waits for the whole image; inference runs on the
    /// blocking pool so the runtime keeps serving other requests.
    pub async fn process(&self, filename: &str) -> Result<UpscaleOutcome> {
        if filename.trim().is_empty() {
            return Err(Error::InvalidArgument("Filename cannot be empty".to_string()));
        }

        match self.uploads.inspect(filename).await? {
            Entry::File => {}
            Entry::Missing => return Err(Error::NotFound(filename.to_string())),
            Entry::Directory => {
                return Err(Error::InvalidArgument(format!(
                    "{} points to a directory",
                    filename
                )))
            }
        }

        let input = self.uploads.resolve(filename)?;
        let output_name = format!("{}{}", OUTPUT_PREFIX, filename);
        let output = self.outputs.resolve(&output_name)?;

        debug!("Upscaling {} -> {}", input.display(), output.display());
        let upscaler = Arc::clone(&self.upscaler);
        let saved = tokio::task::spawn_blocking(move || upscaler.upscale_and_save(&input, &output))
            .await
            .map_err(|e| Error::Inference(format!("Upscale task failed: {}", e)))??;

        info!("Upscaled {} -> {}", filename, saved.display());
        Ok(UpscaleOutcome {
            output: saved.display().to_string(),
            scale: self.upscaler.scale(),
        })
    }

    /// Bytes of a finished output
    pub async fn download(&self, filename: &str) -> Result<Bytes> {
        self.outputs.read(filename).await
    }

    /// Bytes of an uploaded original
    pub async fn serve_upload(&self, filename: &str) -> Result<Bytes> {
        self.uploads.read(filename).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{Rgb, RgbImage};
    use inference_engine::{
        InferenceBackend, ImageTensor, InterpolationBackend, InterpolationFilter, UpscalerOptions,
    };

    /// Nearest-neighbour backend that counts its calls
    pub(crate) struct CountingBackend {
        pub(crate) calls: Arc<AtomicUsize>,
        inner: InterpolationBackend,
    }

    impl CountingBackend {
        pub(crate) fn new(calls: Arc<AtomicUsize>) -> Self {
            Self {
                calls,
                inner: InterpolationBackend::new(InterpolationFilter::Nearest),
            }
        }
    }

    impl InferenceBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn enhance(&mut self, tile: &ImageTensor, scale: u32) -> Result<ImageTensor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.enhance(tile, scale)
        }
    }

    /// Backend that panics mid-inference
    struct PanickingBackend;

    impl InferenceBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn enhance(&mut self, _tile: &ImageTensor, _scale: u32) -> Result<ImageTensor> {
            panic!("backend exploded");
        }
    }

    async fn service_with(dir: &std::path::Path, backend: Box<dyn InferenceBackend>) -> ImageJobService {
        let options = UpscalerOptions {
            scale: 2,
            ..Default::default()
        };
        let upscaler = TiledUpscaler::with_backend(backend, &options).unwrap();
        let uploads = FileStore::open(dir.join("uploads")).await.unwrap();
        let outputs = FileStore::open(dir.join("outputs")).await.unwrap();
        ImageJobService::new(Arc::new(upscaler), uploads, outputs)
    }

    pub(crate) async fn service_in(dir: &std::path::Path) -> (ImageJobService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service_with(dir, Box::new(CountingBackend::new(calls.clone()))).await;
        (service, calls)
    }

    fn encoded(w: u32, h: u32, format: image::ImageOutputFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 99]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    pub(crate) fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        encoded(w, h, image::ImageOutputFormat::Png)
    }

    fn entries(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path()).await;

        let err = service
            .upload(Some("notes.txt"), Some("text/plain"), b"hello")
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(entries(&dir.path().join("uploads")), 0);

        assert!(service.upload(Some("a.png"), None, b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_upload_sanitises_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path()).await;

        let receipt = service
            .upload(Some("../../etc/passwd"), Some("image/png"), &png_bytes(2, 2))
            .await
            .unwrap();
        assert_eq!(receipt.filename, "passwd");
        assert!(dir.path().join("uploads").join("passwd").is_file());
        assert!(!dir.path().join("etc").exists());
    }

    #[tokio::test]
    async fn test_process_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service_in(dir.path()).await;

        service
            .upload(Some("cat.png"), Some("image/png"), &png_bytes(5, 3))
            .await
            .unwrap();
        let outcome = service.process("cat.png").await.unwrap();
        assert_eq!(outcome.scale, 2);
        assert!(outcome.output.ends_with("upscaled_cat.png"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let bytes = service.download("upscaled_cat.png").await.unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 6));
    }

    #[tokio::test]
    async fn test_process_missing_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service_in(dir.path()).await;

        let err = service.process("ghost.png").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(entries(&dir.path().join("outputs")), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_rejects_directory_without_inference() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service_in(dir.path()).await;
        std::fs::create_dir(dir.path().join("uploads").join("folder.png")).unwrap();

        let err = service.process("folder.png").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_rejects_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path()).await;
        assert!(service.process("   ").await.unwrap_err().is_validation());
        assert!(service.process("../outputs").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_corrupt_upload_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path()).await;
        service
            .upload(Some("broken.png"), Some("image/png"), b"definitely not a png")
            .await
            .unwrap();

        let err = service.process("broken.png").await.unwrap_err();
        assert_eq!(err.kind(), common::ErrorKind::Io);
        assert!(service.download("upscaled_broken.png").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_upload_format_follows_content_not_name() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path()).await;

        service
            .upload(Some("photo.png"), Some("image/png"), &encoded(6, 4, image::ImageOutputFormat::Jpeg(90)))
            .await
            .unwrap();
        service.process("photo.png").await.unwrap();
        let bytes = service.download("upscaled_photo.png").await.unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 8));

        let receipt = service
            .upload(None, Some("image/gif"), &encoded(3, 5, image::ImageOutputFormat::Gif))
            .await
            .unwrap();
        assert!(receipt.filename.ends_with(".jpg"));
        service.process(&receipt.filename).await.unwrap();
        let bytes = service
            .download(&format!("{}{}", OUTPUT_PREFIX, receipt.filename))
            .await
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 10));
    }

    #[tokio::test]
    async fn test_backend_panic_is_inference_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with(dir.path(), Box::new(PanickingBackend)).await;
        service
            .upload(Some("cat.png"), Some("image/png"), &png_bytes(4, 4))
            .await
            .unwrap();

        let err = service.process("cat.png").await.unwrap_err();
        assert_eq!(err.kind(), common::ErrorKind::Inference);
        assert_eq!(entries(&dir.path().join("outputs")), 0);

        // The runtime and the service survive the panic
        assert_eq!(service.health().status, "ok");
        assert!(service.process("ghost.png").await.unwrap_err().is_not_found());
        assert!(service.serve_upload("cat.png").await.is_ok());
    }
}
