//! Error types for kokoro-nodes

use kokoro_core::Error as CoreError;
use kokoro_tts::{SynthesisError, TtsError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{node}: missing required input '{input}'")]
    MissingInput { node: String, input: String },

    #[error("Input '{input}' expects {expected}, got {found}")]
    TypeMismatch {
        input: String,
        expected: String,
        found: String,
    },

    #[error("Input '{input}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        input: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Input '{input}' has invalid choice '{value}'")]
    InvalidChoice { input: String, value: String },

    #[error("Unknown node class: {0}")]
    UnknownNode(String),

    #[error("TTS error: {0}")]
    Tts(#[from] TtsError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<NodeError> for CoreError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Core(inner) => inner,
            other => CoreError::Node(other.to_string()),
        }
    }
}
