//! Voice embeddings, handles and blending

use crate::assets::AssetProvisioner;
use crate::error::TtsError;
use kokoro_core::{Error as CoreError, ModelSpec, VoiceResolution};
use ndarray::ArrayD;
use ndarray_npy::NpzReader;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Style table of one voice, one row per token count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEmbedding {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl VoiceEmbedding {
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self, TtsError> {
        if rows == 0 || dim == 0 {
            return Err(TtsError::Voice("Embedding must have at least one row and column".to_string()));
        }

        if data.len() != rows * dim {
            return Err(TtsError::Voice(format!(
                "Embedding data has {} values, expected {} x {}",
                data.len(),
                rows,
                dim
            )));
        }

        Ok(Self { rows, dim, data })
    }

    /// (rows, style_dim)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.dim)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Style vector for an utterance of `token_count` tokens.
    ///
    /// Counts past the end of the table use the last row.
    pub fn style_row(&self, token_count: usize) -> &[f32] {
        let row = token_count.min(self.rows - 1);
        &self.data[row * self.dim..(row + 1) * self.dim]
    }
}

/// What a speaker node hands to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceHandle {
    /// Catalog voice, looked up when synthesis runs
    Named(String),
    /// Already loaded (or blended) style table
    Embedding(VoiceEmbedding),
}

impl VoiceHandle {
    pub fn name(&self) -> Option<&str> {
        match self {
            VoiceHandle::Named(name) => Some(name),
            VoiceHandle::Embedding(_) => None,
        }
    }
}

/// Weighted average `weight * a + (1 - weight) * b`
pub fn blend(a: &VoiceEmbedding, b: &VoiceEmbedding, weight: f32) -> Result<VoiceEmbedding, TtsError> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return Err(TtsError::InvalidWeight(weight));
    }

    if a.shape() != b.shape() {
        return Err(TtsError::DimensionMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }

    let rest = 1.0 - weight;
    let data = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(x, y)| weight * x + rest * y)
        .collect();

    Ok(VoiceEmbedding {
        rows: a.rows,
        dim: a.dim,
        data,
    })
}

/// Loader settings passed explicitly to every voice table read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceLoadOptions {
    /// Required length of the last axis
    pub style_dim: usize,
    /// Reject tables with more rows than this
    pub max_rows: Option<usize>,
}

impl VoiceLoadOptions {
    pub fn for_model(model: &ModelSpec) -> Self {
        Self {
            style_dim: model.style_dim,
            max_rows: Some(model.max_tokens + 1),
        }
    }
}

impl Default for VoiceLoadOptions {
    fn default() -> Self {
        Self {
            style_dim: 256,
            max_rows: None,
        }
    }
}

/// NPZ voice archive, one array per voice
pub struct VoiceTable {
    path: PathBuf,
    reader: NpzReader<File>,
    entries: Vec<String>,
    options: VoiceLoadOptions,
}

impl VoiceTable {
    pub fn open(path: impl AsRef<Path>, options: VoiceLoadOptions) -> Result<Self, TtsError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| TtsError::Voice(format!("Failed to open voice table {:?}: {}", path, e)))?;

        let mut reader = NpzReader::new(file)
            .map_err(|e| TtsError::Voice(format!("Invalid voice table {:?}: {}", path, e)))?;
        let entries = reader
            .names()
            .map_err(|e| TtsError::Voice(format!("Invalid voice table {:?}: {}", path, e)))?;

        debug!("Opened voice table {:?} with {} voices", path, entries.len());

        Ok(Self {
            path,
            reader,
            entries,
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Voice names, without the `.npy` suffix
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.strip_suffix(".npy").unwrap_or(e).to_string())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry_for(name).is_some()
    }

    fn entry_for(&self, name: &str) -> Option<String> {
        let suffixed = format!("{}.npy", name);
        self.entries
            .iter()
            .find(|e| e.as_str() == name || **e == suffixed)
            .cloned()
    }

    /// Read one voice into a `(rows, style_dim)` table
    pub fn load(&mut self, name: &str) -> Result<VoiceEmbedding, TtsError> {
        let entry = self
            .entry_for(name)
            .ok_or_else(|| TtsError::Voice(format!("Voice '{}' not found in {:?}", name, self.path)))?;

        let array: ArrayD<f32> = self
            .reader
            .by_name(&entry)
            .map_err(|e| TtsError::Voice(format!("Failed to read voice '{}': {}", name, e)))?;

        let shape = array.shape().to_vec();
        let (rows, dim) = match shape.as_slice() {
            [rows, middle @ .., dim] if middle.iter().all(|d| *d == 1) => (*rows, *dim),
            _ => {
                return Err(TtsError::Voice(format!(
                    "Voice '{}' has unsupported shape {:?}",
                    name, shape
                )))
            }
        };

        if dim != self.options.style_dim {
            return Err(TtsError::Voice(format!(
                "Voice '{}' has style dimension {}, expected {}",
                name, dim, self.options.style_dim
            )));
        }

        if let Some(max_rows) = self.options.max_rows {
            if rows > max_rows {
                return Err(TtsError::Voice(format!(
                    "Voice '{}' has {} rows, at most {} allowed",
                    name, rows, max_rows
                )));
            }
        }

        VoiceEmbedding::new(rows, dim, array.iter().copied().collect())
    }
}

/// Turns speaker selections into embeddings, provisioning the voice table on demand
pub struct VoiceStore {
    provisioner: AssetProvisioner,
    options: VoiceLoadOptions,
}

impl VoiceStore {
    pub fn new(provisioner: AssetProvisioner) -> Self {
        let options = VoiceLoadOptions::for_model(provisioner.model());
        Self {
            provisioner,
            options,
        }
    }

    pub fn model(&self) -> &ModelSpec {
        self.provisioner.model()
    }

    pub fn provisioner(&self) -> &AssetProvisioner {
        &self.provisioner
    }

    fn check_voice(&self, name: &str) -> Result<(), TtsError> {
        let model = self.provisioner.model();
        if !model.has_voice(name) {
            return Err(CoreError::UnknownVoice {
                model: model.id.clone(),
                voice: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Handle for a catalog voice, following the model's resolution mode
    pub async fn select(&self, name: &str) -> Result<VoiceHandle, TtsError> {
        self.check_voice(name)?;

        match self.provisioner.model().voice_resolution {
            VoiceResolution::Deferred => Ok(VoiceHandle::Named(name.to_string())),
            VoiceResolution::Eager => {
                let embedding = self.load(name).await?;
                Ok(VoiceHandle::Embedding(embedding))
            }
        }
    }

    /// Load a catalog voice from the (provisioned) voice table
    pub async fn load(&self, name: &str) -> Result<VoiceEmbedding, TtsError> {
        self.check_voice(name)?;
        let path = self.provisioner.ensure_voices().await?;
        let mut table = VoiceTable::open(&path, self.options)?;
        let embedding = table.load(name)?;
        info!("Loaded voice '{}' {:?}", name, embedding.shape());
        Ok(embedding)
    }

    /// Embedding behind a handle
    pub async fn resolve(&self, handle: &VoiceHandle) -> Result<VoiceEmbedding, TtsError> {
        match handle {
            VoiceHandle::Named(name) => self.load(name).await,
            VoiceHandle::Embedding(embedding) => Ok(embedding.clone()),
        }
    }

    /// Blend two handles; named handles are loaded first
    pub async fn combine(
        &self,
        first: &VoiceHandle,
        second: &VoiceHandle,
        weight: f32,
    ) -> Result<VoiceHandle, TtsError> {
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(TtsError::InvalidWeight(weight));
        }

        let a = self.resolve(first).await?;
        let b = self.resolve(second).await?;
        Ok(VoiceHandle::Embedding(blend(&a, &b, weight)?))
    }
}
