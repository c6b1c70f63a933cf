//! Custom synthesis engine implementation
//! Allows callers to plug their own inference backend into the synthesizer

use crate::engines::SynthesisEngine;
use crate::error::TtsError;
use async_trait::async_trait;
use std::sync::Arc;

type SynthesizeFn = dyn Fn(&[i64], &[f32], f32) -> Result<Vec<f32>, TtsError> + Send + Sync;

/// Closure-backed engine
pub struct CustomEngine {
    name: String,
    synthesize_fn: Arc<SynthesizeFn>,
    is_available_fn: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl CustomEngine {
    /// Create a new custom engine
    pub fn new<F1, F2>(name: impl Into<String>, synthesize_fn: F1, is_available_fn: F2) -> Self
    where
        F1: Fn(&[i64], &[f32], f32) -> Result<Vec<f32>, TtsError> + Send + Sync + 'static,
        F2: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            synthesize_fn: Arc::new(synthesize_fn),
            is_available_fn: Arc::new(is_available_fn),
        }
    }

    /// Engine that is always available
    pub fn from_fn<F>(name: impl Into<String>, synthesize_fn: F) -> Self
    where
        F: Fn(&[i64], &[f32], f32) -> Result<Vec<f32>, TtsError> + Send + Sync + 'static,
    {
        Self::new(name, synthesize_fn, || true)
    }
}

#[async_trait]
impl SynthesisEngine for CustomEngine {
    async fn synthesize(&self, tokens: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, TtsError> {
        if tokens.is_empty() {
            return Err(TtsError::Engine("Token sequence cannot be empty".to_string()));
        }

        (self.synthesize_fn)(tokens, style, speed)
    }

    fn is_available(&self) -> bool {
        (self.is_available_fn)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
