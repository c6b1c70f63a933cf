//! kokoro-core: shared building blocks for the Kokoro graph nodes
//!
//! - error types used across the workspace
//! - runtime configuration
//! - the versioned model catalog (voices, languages, vocabularies, asset URLs)

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{AssetSpec, Catalog, Language, ModelSpec, VoiceResolution};
pub use config::KokoroConfig;
pub use error::{Error, Result};
