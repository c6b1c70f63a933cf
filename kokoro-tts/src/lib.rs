//! kokoro-tts: Kokoro speech synthesis
//!
//! Provides:
//! - Asset provisioning (model weights and voice table, downloaded on first use)
//! - Voice tables, speaker handles and weighted voice blending
//! - espeak-ng phonemization and per-model tokenization
//! - ONNX Runtime inference with pluggable engines

pub mod assets;
pub mod audio;
pub mod engines;
pub mod error;
pub mod phonemizer;
pub mod synthesizer;
pub mod tokenizer;
pub mod voice;

pub use assets::{AssetPaths, AssetProvisioner, DownloadProgress};
pub use audio::{AudioResult, AudioTensor};
pub use engines::{CustomEngine, EngineLoader, OnnxEngine, OnnxEngineLoader, SynthesisEngine};
pub use error::{SynthesisError, TtsError};
pub use phonemizer::{EspeakPhonemizer, Phonemizer};
pub use synthesizer::KokoroSynthesizer;
pub use tokenizer::Tokenizer;
pub use voice::{blend, VoiceEmbedding, VoiceHandle, VoiceLoadOptions, VoiceStore, VoiceTable};
