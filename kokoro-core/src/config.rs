//! Configuration for the Kokoro nodes

use crate::catalog::{Catalog, ModelSpec};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration shared by the provisioner, synthesizer and nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KokoroConfig {
    /// Model identifier from the catalog
    pub model: String,

    /// Directory holding the model weights and the voice table
    pub asset_dir: PathBuf,

    /// Reject asset URLs that are not HTTPS
    pub require_https: bool,

    /// Verify SHA-256 of downloaded assets when the catalog knows it
    pub verify_checksums: bool,

    /// HTTP timeout for a single asset download, in seconds
    pub download_timeout_secs: u64,

    /// Upper bound for a single downloaded asset, in MB
    pub max_asset_size_mb: u64,

    /// Keep the inference session loaded between synthesis calls
    pub reuse_session: bool,

    /// Intra-op thread count for the inference session (runtime default if unset)
    pub intra_threads: Option<usize>,

    /// espeak-ng executable (looked up on PATH if unset)
    pub espeak_path: Option<PathBuf>,

    /// Replacement for the built-in model catalog
    pub catalog_path: Option<PathBuf>,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        let asset_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("kokoro");

        Self {
            model: "kokoro-v1.0".to_string(),
            asset_dir,
            require_https: true,
            verify_checksums: true,
            download_timeout_secs: 3600,
            max_asset_size_mb: 2048,
            reuse_session: false,
            intra_threads: None,
            espeak_path: None,
            catalog_path: None,
        }
    }
}

impl KokoroConfig {
    /// Configuration rooted at a specific asset directory
    pub fn with_asset_dir(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON, TOML or YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<KokoroConfig>(&content)
                .map_err(|e| Error::Configuration(format!("Invalid JSON config: {}", e))),
            Some("toml") => toml::from_str::<KokoroConfig>(&content)
                .map_err(|e| Error::Configuration(format!("Invalid TOML config: {}", e))),
            Some("yaml") | Some("yml") => serde_yaml::from_str::<KokoroConfig>(&content)
                .map_err(|e| Error::Configuration(format!("Invalid YAML config: {}", e))),
            _ => Self::from_str(&content),
        }?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Load configuration from a string, trying JSON, TOML then YAML
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<KokoroConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<KokoroConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = serde_yaml::from_str::<KokoroConfig>(content) {
            return Ok(config);
        }

        Err(Error::Configuration("Unknown config format".to_string()))
    }

    /// Defaults overlaid with `KOKORO_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `KOKORO_*` environment variables onto this configuration
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("KOKORO_MODEL") {
            self.model = model;
        }

        if let Ok(dir) = std::env::var("KOKORO_ASSET_DIR") {
            self.asset_dir = PathBuf::from(dir);
        }

        if let Ok(espeak) = std::env::var("KOKORO_ESPEAK_PATH") {
            self.espeak_path = Some(PathBuf::from(espeak));
        }

        if let Ok(catalog) = std::env::var("KOKORO_CATALOG") {
            self.catalog_path = Some(PathBuf::from(catalog));
        }

        if let Ok(reuse) = std::env::var("KOKORO_REUSE_SESSION") {
            self.reuse_session = matches!(reuse.as_str(), "1" | "true" | "yes");
        }

        if let Ok(threads) = std::env::var("KOKORO_INTRA_THREADS") {
            if let Ok(n) = threads.parse::<usize>() {
                self.intra_threads = Some(n);
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(Error::Configuration("Model identifier cannot be empty".to_string()));
        }

        if self.asset_dir.as_os_str().is_empty() {
            return Err(Error::Configuration("Asset directory cannot be empty".to_string()));
        }

        if self.asset_dir.to_string_lossy().contains("..") {
            return Err(Error::Configuration(
                "Asset directory path cannot contain '..'".to_string(),
            ));
        }

        if self.download_timeout_secs == 0 {
            return Err(Error::Configuration("Download timeout must be greater than 0".to_string()));
        }

        const MAX_ASSET_SIZE_MB: u64 = 10_000;
        if self.max_asset_size_mb == 0 || self.max_asset_size_mb > MAX_ASSET_SIZE_MB {
            return Err(Error::Configuration(format!(
                "Asset size limit must be between 1 and {} MB",
                MAX_ASSET_SIZE_MB
            )));
        }

        if let Some(threads) = self.intra_threads {
            if threads == 0 || threads > 256 {
                return Err(Error::Configuration("Intra-op threads must be between 1 and 256".to_string()));
            }
        }

        Ok(())
    }

    /// Catalog selected by this configuration
    pub fn catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::from_file(path),
            None => Catalog::builtin().cloned(),
        }
    }

    /// Catalog entry for the configured model
    pub fn model_spec(&self) -> Result<ModelSpec> {
        let catalog = self.catalog()?;
        catalog.model(&self.model).cloned()
    }

    pub fn max_asset_size_bytes(&self) -> u64 {
        self.max_asset_size_mb.saturating_mul(1024 * 1024)
    }
}
