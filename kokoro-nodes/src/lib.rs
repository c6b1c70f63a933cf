//! kokoro-nodes: Kokoro TTS as node-graph nodes
//!
//! Three nodes share one synthesizer:
//! - `KokoroSpeaker` picks a catalog voice
//! - `KokoroSpeakerCombiner` blends two speakers
//! - `KokoroGenerator` turns text into a `(1, 1, N)` waveform

pub mod combiner;
pub mod error;
pub mod fingerprint;
pub mod generator;
pub mod node;
pub mod registry;
pub mod speaker;

pub use combiner::KokoroSpeakerCombiner;
pub use error::NodeError;
pub use generator::KokoroGenerator;
pub use node::{
    InputKind, InputSpec, Node, NodeInputs, NodeOutputs, NodeSchema, NodeValue, OutputSpec,
    AUDIO_TYPE, CATEGORY, SPEAKER_TYPE,
};
pub use registry::NodeRegistry;
pub use speaker::KokoroSpeaker;
