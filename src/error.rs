use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or resolving knowledgebase records.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("failed to read knowledgebase dump {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid knowledgebase JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid knowledgebase dump: {0}")]
    InvalidDump(String),
}

/// Errors raised by the key-value store behind options and sessions.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize stored document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no platform configuration directory available")]
    NoConfigDir,
}
