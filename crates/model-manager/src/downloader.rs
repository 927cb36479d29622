//! Weight store implementation
//!
//! This module provides functionality for installing a weight artifact into
//! a local directory exactly once. The artifact is streamed to a temporary
//! file next to its final location and renamed into place only after the
//! transfer (and the optional checksum) succeeded, so a partial file never
//! appears under the final name.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use common::error::{Error, Result};
use common::utils::{format_bytes, format_duration};
use crate::artifact::WeightArtifact;

/// Interval between progress log lines
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Local cache of weight artifacts
pub struct WeightStore {
    /// HTTP client
    client: Client,

    /// Directory holding cached artifacts
    root: PathBuf,
}

impl WeightStore {
    /// Creates a weight store rooted at `root`.
    ///
    /// The directory is created lazily by the first download.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("upscaler/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Download(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            root: root.into(),
        })
    }

    /// Returns the cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns where `artifact` lives once installed
    pub fn local_path(&self, artifact: &WeightArtifact) -> PathBuf {
        self.root.join(&artifact.name)
    }

    /// Returns true if `artifact` is already installed
    pub fn is_present(&self, artifact: &WeightArtifact) -> bool {
        self.local_path(artifact).is_file()
    }

    /// Ensures `artifact` exists locally and returns its path.
    ///
    /// A cached artifact is returned without touching the network.
    pub async fn ensure(&self, artifact: &WeightArtifact) -> Result<PathBuf> {
        artifact.validate()?;

        let final_path = self.local_path(artifact);
        if final_path.is_file() {
            debug!("Weight artifact {} already present at {}", artifact.name, final_path.display());
            return Ok(final_path);
        }

        let url = artifact.url.as_deref().ok_or_else(|| {
            Error::Download(format!(
                "Weight artifact {} is missing from {} and no download URL is configured",
                artifact.name,
                self.root.display()
            ))
        })?;

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::Download(format!("Failed to create {}: {}", self.root.display(), e))
        })?;

        let partial_path = self
            .root
            .join(format!(".{}.{}.download", artifact.name, uuid::Uuid::new_v4().simple()));

        info!("Downloading weight artifact {} from {}", artifact.name, url);
        let started = Instant::now();

        let result = self
            .download_file(url, &partial_path, artifact.sha256.as_deref())
            .await;

        match result {
            Ok(total) => {
                tokio::fs::rename(&partial_path, &final_path).await.map_err(|e| {
                    Error::Download(format!(
                        "Failed to move {} into place: {}",
                        artifact.name, e
                    ))
                })?;

                info!(
                    "Weight artifact {} installed ({} in {})",
                    artifact.name,
                    format_bytes(total),
                    format_duration(started.elapsed())
                );

                Ok(final_path)
            }
            Err(e) => {
                error!("Download of weight artifact {} failed: {}", artifact.name, e);

                // Clean up download file
                let _ = tokio::fs::remove_file(&partial_path).await;

                Err(e)
            }
        }
    }

    /// Streams `url` into `path`, returning the number of bytes written
    async fn download_file(
        &self,
        url: &str,
        path: &Path,
        expected_checksum: Option<&str>,
    ) -> Result<u64> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Download(format!("Request to {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::Download(format!(
                "Failed to download {}: HTTP {}",
                url,
                resp.status()
            )));
        }

        let total_size = resp.content_length().unwrap_or(0);

        let mut file = File::create(path)
            .await
            .map_err(|e| Error::Download(format!("Failed to create {}: {}", path.display(), e)))?;

        let mut hasher = expected_checksum.map(|_| Sha256::new());

        let mut stream = resp.bytes_stream();
        let mut downloaded = 0u64;
        let mut last_update = Instant::now();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result
                .map_err(|e| Error::Download(format!("Transfer from {} failed: {}", url, e)))?;

            file.write_all(&chunk)
                .await
                .map_err(|e| Error::Download(format!("Failed to write {}: {}", path.display(), e)))?;

            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }

            downloaded += chunk.len() as u64;

            if last_update.elapsed() >= PROGRESS_INTERVAL {
                debug!(
                    "Downloading {}: {} / {}",
                    url,
                    format_bytes(downloaded),
                    format_bytes(total_size)
                );
                last_update = Instant::now();
            }
        }

        // Flush and close file
        file.flush()
            .await
            .map_err(|e| Error::Download(format!("Failed to flush {}: {}", path.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Download(format!("Failed to sync {}: {}", path.display(), e)))?;
        drop(file);

        if let (Some(hasher), Some(expected)) = (hasher, expected_checksum) {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Error::Download(format!(
                    "Checksum verification failed: expected {}, got {}",
                    expected, actual
                )));
            }
            debug!("Checksum verification passed for {}", url);
        }

        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    static PAYLOAD: [u8; 65536] = [7; 65536];

    /// Serves PAYLOAD at /weights.onnx and counts requests to it
    async fn spawn_server() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = Router::new()
            .route(
                "/weights.onnx",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        &PAYLOAD[..]
                    }
                }),
            )
            .route("/missing.onnx", get(|| async { StatusCode::NOT_FOUND }));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::Server::from_tcp(listener)
                .unwrap()
                .serve(app.into_make_service())
                .await
                .unwrap();
        });

        (format!("http://{}", addr), hits)
    }

    fn leftover_partials(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".download"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_second_ensure_skips_network() {
        let (base, hits) = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path().join("weights")).unwrap();
        let artifact = WeightArtifact::new("w.onnx", format!("{}/weights.onnx", base));

        let first = store.ensure(&artifact).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&first).unwrap().len(), PAYLOAD.len());

        let second = store.ensure(&artifact).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(leftover_partials(store.root()), 0);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_installs_once_intact() {
        let (base, hits) = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path()).unwrap();
        let artifact = WeightArtifact::new("w.onnx", format!("{}/weights.onnx", base));

        let (first, second) = tokio::join!(store.ensure(&artifact), store.ensure(&artifact));
        let first = first.unwrap();
        assert_eq!(first, second.unwrap());
        assert!(hits.load(Ordering::SeqCst) >= 1);
        assert_eq!(std::fs::read(&first).unwrap(), &PAYLOAD[..]);
        assert_eq!(leftover_partials(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_present_artifact_needs_no_server() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("w.onnx"), b"cached").unwrap();

        let store = WeightStore::new(dir.path()).unwrap();
        let artifact = WeightArtifact::new("w.onnx", "http://127.0.0.1:9/unreachable");

        let path = store.ensure(&artifact).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let (base, _) = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path()).unwrap();
        let artifact = WeightArtifact::new("w.onnx", format!("{}/missing.onnx", base));

        let err = store.ensure(&artifact).await.unwrap_err();
        assert!(matches!(err, Error::Download(_)));
        assert!(!store.is_present(&artifact));
        assert_eq!(leftover_partials(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_rejected() {
        let (base, _) = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path()).unwrap();
        let artifact = WeightArtifact::new("w.onnx", format!("{}/weights.onnx", base))
            .with_sha256("0".repeat(64));

        assert!(store.ensure(&artifact).await.is_err());
        assert!(!store.is_present(&artifact));
        assert_eq!(leftover_partials(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_checksum_match_installs() {
        let (base, _) = spawn_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path()).unwrap();
        let digest = hex::encode(Sha256::digest(&PAYLOAD[..]));
        let artifact =
            WeightArtifact::new("w.onnx", format!("{}/weights.onnx", base)).with_sha256(digest);

        assert!(store.ensure(&artifact).await.is_ok());
        assert!(store.is_present(&artifact));
    }

    #[tokio::test]
    async fn test_missing_url_is_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path()).unwrap();

        let err = store.ensure(&WeightArtifact::local("absent.onnx")).await.unwrap_err();
        assert!(matches!(err, Error::Download(_)));
    }
}
