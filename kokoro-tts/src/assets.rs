//! Asset provisioner with auto-download
//!
//! Makes sure the model weights and the voice table exist in the asset
//! directory. Presence of the file is the only cache signal: an existing file
//! is never re-downloaded, re-validated or versioned.

use crate::error::TtsError;
use futures_util::StreamExt;
use kokoro_core::{AssetSpec, KokoroConfig, ModelSpec};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Progress of a streamed download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// From `Content-Length`, when the server sends it
    pub total: Option<u64>,
}

/// Local paths of a fully provisioned model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub model: PathBuf,
    pub voices: PathBuf,
}

/// Downloads and caches the files a model version needs
pub struct AssetProvisioner {
    config: Arc<KokoroConfig>,
    model: ModelSpec,
}

impl AssetProvisioner {
    /// Provisioner for the model named in the configuration
    pub fn new(config: Arc<KokoroConfig>) -> Result<Self, TtsError> {
        let model = config.model_spec()?;
        Ok(Self { config, model })
    }

    /// Provisioner for an explicit catalog entry
    pub fn with_model(config: Arc<KokoroConfig>, model: ModelSpec) -> Self {
        Self { config, model }
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn asset_dir(&self) -> &Path {
        &self.config.asset_dir
    }

    /// Ensure the asset directory exists
    pub fn ensure_dir(&self) -> Result<PathBuf, TtsError> {
        let dir = &self.config.asset_dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                TtsError::Asset(format!("Failed to create asset directory {:?}: {}", dir, e))
            })?;
            info!("Created asset directory: {:?}", dir);
        }
        Ok(dir.clone())
    }

    /// Where an asset lives once provisioned
    pub fn asset_path(&self, asset: &AssetSpec) -> Result<PathBuf, TtsError> {
        validate_filename(&asset.filename)?;
        Ok(self.config.asset_dir.join(&asset.filename))
    }

    pub fn model_path(&self) -> Result<PathBuf, TtsError> {
        self.asset_path(&self.model.model_file)
    }

    pub fn voices_path(&self) -> Result<PathBuf, TtsError> {
        self.asset_path(&self.model.voices_file)
    }

    /// True when both files of the model are on disk
    pub fn assets_present(&self) -> bool {
        match (self.model_path(), self.voices_path()) {
            (Ok(model), Ok(voices)) => model.exists() && voices.exists(),
            _ => false,
        }
    }

    /// Download the asset if it is not present yet
    pub async fn ensure_asset(&self, asset: &AssetSpec) -> Result<PathBuf, TtsError> {
        let name = asset.filename.clone();
        let mut last_decile = None;
        self.ensure_asset_with_progress(asset, move |p: DownloadProgress| {
            if let Some(total) = p.total.filter(|t| *t > 0) {
                let decile = p.downloaded.saturating_mul(10) / total;
                if last_decile != Some(decile) {
                    last_decile = Some(decile);
                    debug!("{}: {}% ({} / {} bytes)", name, decile * 10, p.downloaded, total);
                }
            }
        })
        .await
    }

    /// Download the asset if it is not present yet, reporting progress
    pub async fn ensure_asset_with_progress<F>(
        &self,
        asset: &AssetSpec,
        mut on_progress: F,
    ) -> Result<PathBuf, TtsError>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let target = self.asset_path(asset)?;
        validate_url(&asset.url, self.config.require_https)?;

        if target.exists() {
            debug!("Asset {} already present at {:?}", asset.filename, target);
            return Ok(target);
        }

        info!("Downloading {} from {}", asset.filename, asset.url);

        let max_size = self.config.max_asset_size_bytes();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .build()?;

        let response = client.get(&asset.url).send().await?;
        if !response.status().is_success() {
            return Err(TtsError::Download(format!(
                "Failed to download {}: HTTP {}",
                asset.filename,
                response.status()
            )));
        }

        let total = response.content_length();
        if let Some(len) = total {
            if len > max_size {
                return Err(TtsError::Download(format!(
                    "{} too large: {} bytes (max {} bytes)",
                    asset.filename, len, max_size
                )));
            }
        }

        // each transfer gets its own temp file; only a complete one gets the real name
        let dir = self.ensure_dir()?;
        let partial = tempfile::Builder::new()
            .prefix(&format!(".{}.", asset.filename))
            .suffix(".part")
            .tempfile_in(&dir)
            .map_err(|e| TtsError::Asset(format!("Failed to create temp file in {:?}: {}", dir, e)))?;
        let (file, partial) = partial.into_parts();

        // the temp path is removed on drop, so every early return cleans up
        let file = tokio::fs::File::from_std(file);
        let (written, digest) = stream_to_file(response, file, max_size, total, &mut on_progress).await?;

        if written == 0 {
            return Err(TtsError::Download(format!("{} downloaded empty", asset.filename)));
        }

        match asset.sha256.as_deref().filter(|s| !s.is_empty()) {
            Some(expected) if self.config.verify_checksums => {
                if !digest.eq_ignore_ascii_case(expected) {
                    return Err(TtsError::Checksum {
                        file: asset.filename.clone(),
                        expected: expected.to_string(),
                        actual: digest,
                    });
                }
                info!("Verified checksum for {}", asset.filename);
            }
            Some(_) => warn!("Checksum verification disabled, skipping {}", asset.filename),
            None => debug!("No checksum known for {}", asset.filename),
        }

        match partial.persist_noclobber(&target) {
            Ok(()) => {}
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                // another provisioner installed it first; its copy is complete
                debug!("{} installed concurrently, discarding our copy", asset.filename);
                return Ok(target);
            }
            Err(e) => {
                return Err(TtsError::Asset(format!(
                    "Failed to move {} into place: {}",
                    asset.filename, e.error
                )));
            }
        }

        info!("Saved {} ({} bytes) to {:?}", asset.filename, written, target);
        Ok(target)
    }

    /// Model weights path, downloading if needed
    pub async fn ensure_model(&self) -> Result<PathBuf, TtsError> {
        let asset = self.model.model_file.clone();
        self.ensure_asset(&asset).await
    }

    /// Voice table path, downloading if needed
    pub async fn ensure_voices(&self) -> Result<PathBuf, TtsError> {
        let asset = self.model.voices_file.clone();
        self.ensure_asset(&asset).await
    }

    /// Both files of the configured model
    pub async fn ensure_all(&self) -> Result<AssetPaths, TtsError> {
        let model = self.ensure_model().await?;
        let voices = self.ensure_voices().await?;
        Ok(AssetPaths { model, voices })
    }
}

async fn stream_to_file<F>(
    response: reqwest::Response,
    mut file: tokio::fs::File,
    max_size: u64,
    total: Option<u64>,
    on_progress: &mut F,
) -> Result<(u64, String), TtsError>
where
    F: FnMut(DownloadProgress) + Send,
{
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded = downloaded.saturating_add(chunk.len() as u64);
        if downloaded > max_size {
            return Err(TtsError::Download(format!(
                "Download exceeded {} bytes",
                max_size
            )));
        }

        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        on_progress(DownloadProgress { downloaded, total });
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok((downloaded, hex::encode(hasher.finalize())))
}

fn validate_filename(filename: &str) -> Result<(), TtsError> {
    if filename.is_empty() || filename.len() > 255 {
        return Err(TtsError::Asset("Invalid asset filename".to_string()));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(TtsError::Asset(
            "Asset filename contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_url(url: &str, require_https: bool) -> Result<(), TtsError> {
    if url.is_empty() || url.len() > 2048 {
        return Err(TtsError::Asset("Invalid asset URL".to_string()));
    }

    if url.chars().any(|c| c == '\0' || c.is_control()) {
        return Err(TtsError::Asset("Asset URL contains invalid characters".to_string()));
    }

    let https = url.starts_with("https://");
    if require_https && !https {
        return Err(TtsError::Asset(
            "Only HTTPS URLs are allowed for asset downloads".to_string(),
        ));
    }

    if !https && !url.starts_with("http://") {
        return Err(TtsError::Asset(format!("Unsupported URL scheme: {}", url)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn provisioner(dir: &Path) -> AssetProvisioner {
        let config = KokoroConfig::with_asset_dir(dir);
        AssetProvisioner::new(Arc::new(config)).unwrap()
    }

    fn asset(filename: &str, url: &str) -> AssetSpec {
        AssetSpec {
            filename: filename.to_string(),
            url: url.to_string(),
            sha256: None,
        }
    }

    #[test]
    fn test_ensure_dir_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let manager = provisioner(&nested);

        assert!(manager.ensure_dir().is_ok());
        assert!(nested.exists());
        assert!(manager.ensure_dir().is_ok());
    }

    #[test]
    fn test_paths_follow_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let manager = provisioner(temp_dir.path());

        assert_eq!(
            manager.model_path().unwrap(),
            temp_dir.path().join("kokoro-v1.0.onnx")
        );
        assert_eq!(
            manager.voices_path().unwrap(),
            temp_dir.path().join("voices-v1.0.bin")
        );
        assert!(!manager.assets_present());
    }

    #[tokio::test]
    async fn test_invalid_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let manager = provisioner(temp_dir.path());

        for name in ["", "../evil", "dir/file.onnx", "dir\\file.onnx"] {
            let result = manager.ensure_asset(&asset(name, "https://example.com/x")).await;
            assert!(matches!(result, Err(TtsError::Asset(_))), "accepted {:?}", name);
        }
    }

    #[tokio::test]
    async fn test_invalid_urls() {
        let temp_dir = TempDir::new().unwrap();
        let manager = provisioner(temp_dir.path());

        for url in ["", "http://example.com/x", "ftp://example.com/x"] {
            let result = manager.ensure_asset(&asset("model.onnx", url)).await;
            assert!(matches!(result, Err(TtsError::Asset(_))), "accepted {:?}", url);
        }
    }

    #[tokio::test]
    async fn test_present_file_skips_network() {
        let temp_dir = TempDir::new().unwrap();
        let manager = provisioner(temp_dir.path());
        std::fs::write(temp_dir.path().join("model.onnx"), b"cached").unwrap();

        // nothing listens on port 9; any transfer attempt would fail
        let spec = asset("model.onnx", "https://127.0.0.1:9/model.onnx");
        let first = manager.ensure_asset(&spec).await.unwrap();
        let second = manager.ensure_asset(&spec).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_partial_file_is_not_a_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        let manager = provisioner(temp_dir.path());
        std::fs::write(temp_dir.path().join(".model.onnx.abc123.part"), b"half").unwrap();

        let spec = asset("model.onnx", "https://127.0.0.1:9/model.onnx");
        assert!(manager.ensure_asset(&spec).await.is_err());
        assert!(!temp_dir.path().join("model.onnx").exists());
    }

    #[test]
    fn test_validate_url_allows_http_when_configured() {
        assert!(validate_url("http://127.0.0.1:8080/x", false).is_ok());
        assert!(validate_url("http://127.0.0.1:8080/x", true).is_err());
        assert!(validate_url("https://example.com/x\n", false).is_err());
    }
}
