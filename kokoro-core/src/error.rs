use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown voice '{voice}' for model {model}")]
    UnknownVoice { model: String, voice: String },

    #[error("Unknown language '{language}' for model {model}")]
    UnknownLanguage { model: String, language: String },

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Node error: {0}")]
    Node(String),
}

pub type Result<T> = std::result::Result<T, Error>;
