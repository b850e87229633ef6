//! Error types for cipherlane-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Malformed plaintext bundle: {0}")]
    MalformedBundle(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
