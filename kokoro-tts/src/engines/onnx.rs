//! Kokoro ONNX model via ONNX Runtime

use crate::engines::{EngineLoader, SynthesisEngine};
use crate::error::TtsError;
use async_trait::async_trait;
use ndarray::{Array1, Array2};
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Input layout of the exported graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputLayout {
    /// `tokens`, `style`, `speed: f32[1]`
    Tokens,
    /// `input_ids`, `style`, `speed: i32[1]` (newer exports)
    InputIds,
}

pub struct OnnxEngine {
    session: Mutex<Session>,
    layout: InputLayout,
}

impl OnnxEngine {
    pub fn load(model_path: &Path, intra_threads: Option<usize>) -> Result<Self, TtsError> {
        if !model_path.exists() {
            return Err(TtsError::Engine(format!("Model file not found: {:?}", model_path)));
        }

        let mut builder = Session::builder()
            .map_err(|e| TtsError::Ort(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| TtsError::Ort(format!("Failed to set optimization level: {}", e)))?;

        if let Some(threads) = intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| TtsError::Ort(format!("Failed to set intra-op threads: {}", e)))?;
        }

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| TtsError::Ort(format!("Failed to load Kokoro model: {}", e)))?;

        let layout = if session.inputs.iter().any(|i| i.name == "input_ids") {
            InputLayout::InputIds
        } else {
            InputLayout::Tokens
        };

        info!("Loaded Kokoro model {:?} ({:?} inputs)", model_path, layout);

        Ok(Self {
            session: Mutex::new(session),
            layout,
        })
    }

    fn run(&self, tokens: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, TtsError> {
        let token_array = Array2::from_shape_vec((1, tokens.len()), tokens.to_vec())
            .map_err(|e| TtsError::Engine(format!("Failed to build token tensor: {}", e)))?;
        let style_array = Array2::from_shape_vec((1, style.len()), style.to_vec())
            .map_err(|e| TtsError::Engine(format!("Failed to build style tensor: {}", e)))?;

        let token_value = Tensor::from_array(token_array)
            .map_err(|e| TtsError::Ort(format!("Failed to create token value: {}", e)))?;
        let style_value = Tensor::from_array(style_array)
            .map_err(|e| TtsError::Ort(format!("Failed to create style value: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = match self.layout {
            InputLayout::Tokens => {
                let speed_value = Tensor::from_array(Array1::from_vec(vec![speed]))
                    .map_err(|e| TtsError::Ort(format!("Failed to create speed value: {}", e)))?;
                session.run(inputs![
                    "tokens" => token_value,
                    "style" => style_value,
                    "speed" => speed_value
                ])
            }
            InputLayout::InputIds => {
                let speed_value = Tensor::from_array(Array1::from_vec(vec![integer_speed(speed)]))
                    .map_err(|e| TtsError::Ort(format!("Failed to create speed value: {}", e)))?;
                session.run(inputs![
                    "input_ids" => token_value,
                    "style" => style_value,
                    "speed" => speed_value
                ])
            }
        }
        .map_err(|e| TtsError::Ort(format!("Kokoro inference failed: {}", e)))?;

        if outputs.len() == 0 {
            return Err(TtsError::Engine("Model returned no output tensors".to_string()));
        }

        let (_, samples) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| TtsError::Ort(format!("Failed to extract audio tensor: {}", e)))?;

        debug!("Chunk of {} tokens produced {} samples", tokens.len(), samples.len());
        Ok(samples.to_vec())
    }
}

/// Integer speed for `input_ids` exports; never below 1
fn integer_speed(speed: f32) -> i32 {
    (speed.round() as i32).max(1)
}

#[async_trait]
impl SynthesisEngine for OnnxEngine {
    async fn synthesize(&self, tokens: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, TtsError> {
        if tokens.is_empty() {
            return Err(TtsError::Engine("Token sequence cannot be empty".to_string()));
        }

        if !speed.is_finite() || speed <= 0.0 {
            return Err(TtsError::Engine(format!("Invalid speed: {}", speed)));
        }

        self.run(tokens, style, speed)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Loads [`OnnxEngine`] sessions
#[derive(Debug, Clone, Default)]
pub struct OnnxEngineLoader {
    pub intra_threads: Option<usize>,
}

impl OnnxEngineLoader {
    pub fn new(intra_threads: Option<usize>) -> Self {
        Self { intra_threads }
    }
}

impl EngineLoader for OnnxEngineLoader {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn SynthesisEngine>, TtsError> {
        let engine = OnnxEngine::load(model_path, self.intra_threads)?;
        Ok(Arc::new(engine))
    }
}
