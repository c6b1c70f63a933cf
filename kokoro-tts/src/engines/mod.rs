//! Inference engine implementations

pub mod custom;
pub mod onnx;

use crate::error::TtsError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for Kokoro inference backends
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Run one padded token chunk with its style vector
    async fn synthesize(&self, tokens: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, TtsError>;

    /// Check if engine is available
    fn is_available(&self) -> bool;

    /// Get engine name
    fn name(&self) -> &str;
}

/// Builds an engine from a model weights file
pub trait EngineLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn SynthesisEngine>, TtsError>;
}

impl<F> EngineLoader for F
where
    F: Fn(&Path) -> Result<Arc<dyn SynthesisEngine>, TtsError> + Send + Sync,
{
    fn load(&self, model_path: &Path) -> Result<Arc<dyn SynthesisEngine>, TtsError> {
        self(model_path)
    }
}

pub use custom::CustomEngine;
pub use onnx::{OnnxEngine, OnnxEngineLoader};
