//! Error types for kokoro-tts

use kokoro_core::Error as CoreError;
use thiserror::Error;

/// Errors raised by provisioning, voice handling and inference
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Asset error: {0}")]
    Asset(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Embedding shape mismatch: {left:?} vs {right:?}")]
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("Blend weight must be within [0, 1], got {0}")]
    InvalidWeight(f32),

    #[error("Phonemizer error: {0}")]
    Phonemizer(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<ort::Error> for TtsError {
    fn from(err: ort::Error) -> Self {
        TtsError::Ort(err.to_string())
    }
}

impl From<TtsError> for CoreError {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::Core(inner) => inner,
            other => CoreError::Speech(other.to_string()),
        }
    }
}

/// Why a synthesis call produced no audio
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Asset fetch failed: {0}")]
    AssetFetch(#[source] TtsError),

    #[error("Could not load synthesis engine: {0}")]
    EngineLoad(#[source] TtsError),

    #[error("Synthesis failed: {0}")]
    Synthesis(#[source] TtsError),

    #[error("No audio was generated")]
    EmptyAudio,
}

impl From<SynthesisError> for CoreError {
    fn from(err: SynthesisError) -> Self {
        CoreError::Speech(err.to_string())
    }
}
