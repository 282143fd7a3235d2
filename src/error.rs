use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Callweave operations
#[derive(Error, Debug)]
pub enum CallweaveError {
    #[error("Source '{source_name}' already belongs to alias '{alias_name}'")]
    AliasConflict {
        source_name: String,
        alias_name: String,
    },

    #[error("Invalid bit id: {0}")]
    InvalidBitId(String),

    #[error("Invalid ignore rule: {0}")]
    InvalidIgnoreRule(String),

    #[error("Invalid method context: {0}")]
    InvalidContext(String),

    #[error("Malformed definition record: {0}")]
    MalformedRecord(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Binary record error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, CallweaveError>;
